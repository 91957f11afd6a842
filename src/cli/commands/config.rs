use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, VectorDriver};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file with defaults")]
    Init {
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Set a configuration value (e.g. pipeline.batch_size 300)")]
    Set {
        #[arg(help = "Dotted key, e.g. vector_store.driver")]
        key: String,
        #[arg(help = "New value")]
        value: String,
    },
    #[command(about = "Show configuration file path")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(force, format),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Set { key, value } => handle_set(&key, &value, format),
        ConfigCommand::Path => handle_path(),
    }
}

fn handle_init(force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let config_path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    let path = Config::default()
        .save()
        .context("failed to create config")?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );

    Ok(())
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Some(path) = Config::config_path()
        && path.exists()
    {
        println!("# Config: {}", path.display());
        println!();
    }

    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn handle_set(key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let mut config = Config::load()?;
    apply_setting(&mut config, key, value)?;
    let path = config.save().context("failed to save config")?;

    println!(
        "{}",
        formatter.format_message(&format!("Set {key} = {value} in {}", path.display()))
    );
    Ok(())
}

fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
        value
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid value {value:?} for {key}"))
    }

    match key {
        "embedding.api_base" => config.embedding.api_base = value.to_string(),
        "embedding.model" => config.embedding.model = value.to_string(),
        "embedding.dimension" => config.embedding.dimension = parse(key, value)?,
        "embedding.api_key_env" => config.embedding.api_key_env = value.to_string(),
        "embedding.timeout_secs" => config.embedding.timeout_secs = parse(key, value)?,
        "pipeline.batch_size" => config.pipeline.batch_size = parse(key, value)?,
        "pipeline.workers" => config.pipeline.workers = parse(key, value)?,
        "pipeline.max_tokens" => config.pipeline.max_tokens = parse(key, value)?,
        "pipeline.max_attempts" => config.pipeline.max_attempts = parse(key, value)?,
        "pipeline.cost_per_1k_tokens" => config.pipeline.cost_per_1k_tokens = parse(key, value)?,
        "pipeline.upload_batch_size" => config.pipeline.upload_batch_size = parse(key, value)?,
        "vector_store.driver" => config.vector_store.driver = parse::<VectorDriver>(key, value)?,
        "vector_store.url" => config.vector_store.url = value.to_string(),
        "vector_store.collection" => config.vector_store.collection = value.to_string(),
        "vector_store.namespace" => config.vector_store.namespace = Some(value.to_string()),
        "vector_store.schema" => config.vector_store.schema = Some(value.to_string()),
        "vector_store.pool_max" => config.vector_store.pool_max = parse(key, value)?,
        "query.default_limit" => config.query.default_limit = parse(key, value)?,
        "query.default_format" => config.query.default_format = parse::<OutputFormat>(key, value)?,
        _ => anyhow::bail!("unknown config key: {key}"),
    }
    Ok(())
}

fn handle_path() -> Result<()> {
    let path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_setting_updates_fields() {
        let mut config = Config::default();

        apply_setting(&mut config, "pipeline.batch_size", "64").unwrap();
        apply_setting(&mut config, "vector_store.driver", "pgvector").unwrap();
        apply_setting(&mut config, "embedding.model", "text-embedding-3-small").unwrap();

        assert_eq!(config.pipeline.batch_size, 64);
        assert_eq!(config.vector_store.driver, VectorDriver::PgVector);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
    }

    #[test]
    fn test_apply_setting_rejects_unknown_key() {
        let mut config = Config::default();
        let err = apply_setting(&mut config, "pipeline.bath_size", "64").unwrap_err();
        assert!(err.to_string().contains("unknown config key"));
    }

    #[test]
    fn test_apply_setting_rejects_bad_value() {
        let mut config = Config::default();
        let err = apply_setting(&mut config, "pipeline.workers", "many").unwrap_err();
        assert!(err.to_string().contains("invalid value"));
        // original value untouched
        assert_eq!(config.pipeline.workers, Config::default().pipeline.workers);
    }
}
