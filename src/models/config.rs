use serde::{Deserialize, Serialize};

use super::query::OutputFormat;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "corpus";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

impl Config {
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join("embedpipe").join("config.toml"))
    }

    pub fn load() -> Result<Self, crate::error::ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, crate::error::ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<std::path::PathBuf, crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

/// Connection settings for the remote embedding endpoint.
///
/// The API key is never written to the config file; only the name of the
/// environment variable that holds it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout() -> u64 {
    120
}

impl EmbeddingConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, crate::error::ConfigError> {
        std::env::var(&self.api_key_env)
            .map_err(|_| crate::error::ConfigError::MissingCredential(self.api_key_env.clone()))
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            dimension: default_dimension(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Batching and concurrency settings for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Documents per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Maximum concurrent embedding requests.
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Token sequences are truncated to this many tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Total attempts per batch before the run is aborted.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Advisory price used for the pre-run cost estimate.
    #[serde(default = "default_cost_per_1k_tokens")]
    pub cost_per_1k_tokens: f64,

    /// Records per vector store upsert request.
    #[serde(default = "default_upload_batch_size")]
    pub upload_batch_size: u32,
}

fn default_batch_size() -> u32 {
    300
}

fn default_workers() -> u32 {
    8
}

fn default_max_tokens() -> u32 {
    8191
}

fn default_max_attempts() -> u32 {
    5
}

fn default_cost_per_1k_tokens() -> f64 {
    0.0001
}

fn default_upload_batch_size() -> u32 {
    100
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: default_workers(),
            max_tokens: default_max_tokens(),
            max_attempts: default_max_attempts(),
            cost_per_1k_tokens: default_cost_per_1k_tokens(),
            upload_batch_size: default_upload_batch_size(),
        }
    }
}

/// Which vector store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    #[serde(rename = "pgvector")]
    PgVector,
}

impl std::str::FromStr for VectorDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(VectorDriver::Qdrant),
            "pgvector" | "postgres" | "postgresql" => Ok(VectorDriver::PgVector),
            _ => Err(format!("unknown vector driver: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::PgVector => write!(f, "pgvector"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_store_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,

    /// Default namespace applied when the command line gives none.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub namespace: Option<String>,

    /// PostgreSQL schema for the pgvector driver.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,
}

fn default_store_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_acquire_timeout() -> u32 {
    30
}

impl VectorStoreConfig {
    /// Schema-qualified table name for the pgvector driver.
    pub fn qualified_table_name(&self) -> String {
        match self.schema {
            Some(ref schema) => format!("{}.{}", schema, self.collection),
            None => self.collection.clone(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_store_url(),
            collection: default_collection(),
            api_key: None,
            namespace: None,
            schema: None,
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_limit() -> u32 {
    10
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_format: OutputFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.api_base, DEFAULT_API_BASE);
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.vector_store.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 300);
        assert_eq!(config.workers, 8);
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_driver_parse() {
        assert_eq!("qdrant".parse::<VectorDriver>(), Ok(VectorDriver::Qdrant));
        assert_eq!(
            "postgres".parse::<VectorDriver>(),
            Ok(VectorDriver::PgVector)
        );
        assert!("redis".parse::<VectorDriver>().is_err());
    }

    #[test]
    fn test_qualified_table_name() {
        let config = VectorStoreConfig {
            schema: Some("search".to_string()),
            collection: "articles".to_string(),
            ..Default::default()
        };
        assert_eq!(config.qualified_table_name(), "search.articles");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.vector_store.driver = VectorDriver::PgVector;
        config.pipeline.batch_size = 64;

        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.vector_store.driver, VectorDriver::PgVector);
        assert_eq!(loaded.pipeline.batch_size, 64);
    }
}
