//! Load command: embed a corpus file and upsert it into the vector store.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cli::output::{LoadStats, get_formatter};
use crate::error::CorpusError;
use crate::models::{Config, Document, OutputFormat, VectorRecord};
use crate::services::batch::split_by_size;
use crate::services::{EmbeddingClient, EmbeddingPipeline, Tokenizer, create_backend};

/// Arguments for the load command.
#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Path to JSON or JSONL corpus file (use - for stdin)
    #[arg()]
    pub file: Option<PathBuf>,

    /// Namespace to upsert into (overrides config)
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Only validate the corpus file without embedding
    #[arg(long)]
    pub validate_only: bool,

    /// Print the cost estimate and exit without embedding
    #[arg(long)]
    pub estimate_only: bool,
}

pub async fn handle_load(args: LoadArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let input = read_input(args.file.as_deref())?;
    let (documents, skipped) = parse_corpus(&input)?;

    if documents.is_empty() {
        println!("{}", formatter.format_message("No documents found in input."));
        return Ok(());
    }

    if verbose || args.validate_only {
        println!("Found {} documents to load", documents.len());
    }

    if args.validate_only {
        println!(
            "{}",
            formatter.format_message(&format!(
                "Validation successful: {} documents ready to load",
                documents.len()
            ))
        );
        return Ok(());
    }

    let tokenizer = Tokenizer::new(config.pipeline.max_tokens as usize)?;
    let embedding_client = EmbeddingClient::new(&config.embedding)?;
    let pipeline = EmbeddingPipeline::new(&embedding_client, tokenizer, &config.pipeline);

    // Tokenize up front so the cost estimate is printed before any network
    // call; the estimate is advisory and never blocks the run.
    let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
    let corpus = pipeline.tokenize(&texts);
    let estimate = pipeline.estimate(&corpus);

    eprintln!(
        "{}",
        console::style(format!(
            "Embedding {} documents, {} tokens (~${:.4} with {})",
            estimate.documents, estimate.total_tokens, estimate.cost_usd, config.embedding.model
        ))
        .dim()
    );

    if args.estimate_only {
        return Ok(());
    }

    let pb = ProgressBar::new(pipeline.batch_count(&corpus) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );

    let report = |done: usize, _total: usize| {
        pb.set_position(done as u64);
    };
    let vectors = pipeline
        .embed_tokenized(&corpus, Some(&report))
        .await
        .context("embedding run failed")?;
    pb.finish_and_clear();

    let embedded = vectors.len() as u64;
    let total_tokens = corpus.total_tokens as u64;

    let records: Vec<VectorRecord> = documents
        .into_iter()
        .zip(vectors)
        .map(|(document, vector)| VectorRecord::new(document, vector))
        .collect();

    let store = create_backend(&config.vector_store, u64::from(config.embedding.dimension))
        .await
        .context("failed to connect to vector store")?;
    store.ensure_ready().await?;

    let namespace = args.namespace.or_else(|| config.vector_store.namespace.clone());

    let upload_batch_size = config.pipeline.upload_batch_size as usize;
    let mut uploaded = 0u64;
    for (_, chunk) in split_by_size(&records, upload_batch_size) {
        store
            .upsert(chunk.to_vec(), namespace.as_deref())
            .await
            .context("failed to upsert vectors")?;
        uploaded += chunk.len() as u64;
        if verbose {
            eprintln!("Uploaded {}/{} records", uploaded, records.len());
        }
    }

    let stats = LoadStats {
        documents: records.len() as u64,
        skipped,
        embedded,
        uploaded,
        total_tokens,
        estimated_cost_usd: estimate.cost_usd,
        duration_ms: start_time.elapsed().as_millis() as u64,
    };

    print!("{}", formatter.format_load_stats(&stats));

    Ok(())
}

/// Read input from file or stdin.
fn read_input(file: Option<&Path>) -> Result<String, CorpusError> {
    match file {
        Some(path) if path.to_string_lossy() != "-" => Ok(std::fs::read_to_string(path)?),
        _ => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

/// Parse documents from JSON array or JSONL, skipping empty bodies.
fn parse_corpus(input: &str) -> Result<(Vec<Document>, u64), CorpusError> {
    let input = input.trim();

    if input.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let mut documents: Vec<Document> = if input.starts_with('[') {
        serde_json::from_str(input)?
    } else {
        let mut documents = Vec::new();
        for (i, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let doc: Document = serde_json::from_str(line).map_err(|e| {
                CorpusError::ValidationError(format!("line {}: {}", i + 1, e))
            })?;
            documents.push(doc);
        }
        documents
    };

    let before = documents.len() as u64;
    documents.retain(|d| !d.text.trim().is_empty());
    let skipped = before - documents.len() as u64;

    for doc in &mut documents {
        doc.ensure_id();
    }

    Ok((documents, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let input = r#"[{"id": "a", "title": "A", "text": "alpha"},
                        {"title": "B", "text": "beta"}]"#;
        let (docs, skipped) = parse_corpus(input).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(skipped, 0);
        assert_eq!(docs[0].id, "a");
        // Generated id for the document that carried none
        assert!(!docs[1].id.is_empty());
    }

    #[test]
    fn test_parse_jsonl() {
        let input = "{\"title\": \"A\", \"text\": \"alpha\"}\n\n{\"title\": \"B\", \"text\": \"beta\"}\n";
        let (docs, _) = parse_corpus(input).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].title, "B");
    }

    #[test]
    fn test_parse_skips_empty_bodies() {
        let input = r#"[{"title": "A", "text": "alpha"}, {"title": "B", "text": "  "}]"#;
        let (docs, skipped) = parse_corpus(input).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_parse_empty_input() {
        let (docs, skipped) = parse_corpus("  \n ").unwrap();
        assert!(docs.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_parse_rejects_malformed_line() {
        let input = "{\"title\": \"A\", \"text\": \"alpha\"}\nnot json\n";
        assert!(parse_corpus(input).is_err());
    }
}
