use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::create_backend;

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let namespace = config.vector_store.namespace.clone();

    let (connected, vector_count) =
        match create_backend(&config.vector_store, u64::from(config.embedding.dimension)).await {
            Ok(store) => {
                let connected = store.health_check().await.unwrap_or(false);
                let count = if connected {
                    store.count(namespace.as_deref()).await.unwrap_or(0)
                } else {
                    0
                };
                (connected, count)
            }
            Err(_) => (false, 0),
        };

    let status = StatusInfo {
        driver: config.vector_store.driver.to_string(),
        url: config.vector_store.url.clone(),
        connected,
        collection: config.vector_store.collection.clone(),
        vector_count,
        namespace,
    };

    print!("{}", formatter.format_status(&status));

    if !connected {
        eprintln!();
        let warning = match config.vector_store.driver {
            VectorDriver::Qdrant => {
                "Warning: Qdrant not reachable. Start with: docker compose up -d qdrant"
            }
            VectorDriver::PgVector => {
                "Warning: PostgreSQL not accessible. Check connection settings."
            }
        };
        eprintln!("{}", console::style(warning).yellow());
    }

    Ok(())
}
