use anyhow::{Context, Result};
use clap::Args;
use std::time::Instant;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, QueryResults};
use crate::services::{EmbeddingClient, Tokenizer, create_backend};

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(required = true, help = "Query text")]
    pub query: String,

    #[arg(long, short = 'k', help = "Maximum number of matches to return")]
    pub limit: Option<u32>,

    #[arg(long, short = 'n', help = "Namespace to query (overrides config)")]
    pub namespace: Option<String>,
}

pub async fn handle_query(args: QueryArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("query text cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let limit = args.limit.unwrap_or(config.query.default_limit);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    let namespace = args
        .namespace
        .or_else(|| config.vector_store.namespace.clone());

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Limit: {limit}");
        if let Some(ref ns) = namespace {
            eprintln!("  Namespace: {ns}");
        }
    }

    let tokenizer = Tokenizer::new(config.pipeline.max_tokens as usize)?;
    let embedding_client = EmbeddingClient::new(&config.embedding)?;

    let embed_start = Instant::now();
    let query_vector = embedding_client
        .embed_query(tokenizer.encode_truncated(query))
        .await
        .context("failed to embed query")?;
    let embed_ms = embed_start.elapsed().as_millis();

    let store = create_backend(&config.vector_store, u64::from(config.embedding.dimension))
        .await
        .context("failed to connect to vector store")?;

    let query_start = Instant::now();
    let matches = store
        .query(query_vector, u64::from(limit), namespace.as_deref())
        .await
        .context("query failed")?;
    let query_ms = query_start.elapsed().as_millis();

    if verbose {
        eprintln!("Timing:");
        eprintln!("  Embedding: {embed_ms}ms");
        eprintln!("  Query: {query_ms}ms");
    }

    let results = QueryResults {
        query: query.to_string(),
        total: matches.len(),
        matches,
        duration_ms: start_time.elapsed().as_millis() as u64,
    };

    print!("{}", formatter.format_query_results(&results));

    Ok(())
}
