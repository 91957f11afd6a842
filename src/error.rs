//! Error types for the embedding pipeline CLI.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to loading the token encoder.
#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("failed to load token encoder: {0}")]
    Init(String),
}

/// Errors related to the embedding endpoint.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding endpoint: {0}")]
    ConnectionError(String),

    #[error("embedding endpoint error: {0}")]
    ServerError(String),

    #[error("embedding endpoint rate limited: {0}")]
    RateLimited(String),

    #[error("embedding request rejected: {0}")]
    AuthError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding request timed out")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection problems, timeouts and throttling are transient
            EmbeddingError::ConnectionError(_)
            | EmbeddingError::Timeout
            | EmbeddingError::RateLimited(_) => true,
            // Server errors might be transient (e.g., 503 Service Unavailable)
            EmbeddingError::ServerError(msg) => {
                msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503")
                    || msg.contains("504")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("overloaded")
            }
            // Request errors depend on the underlying cause
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            // Bad credentials and malformed payloads never recover on retry
            EmbeddingError::AuthError(_)
            | EmbeddingError::InvalidResponse(_)
            | EmbeddingError::DimensionMismatch { .. } => false,
        }
    }
}

/// Errors from a full pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    #[error("embedding batch at offset {offset} failed after {attempts} attempts: {source}")]
    BatchFailed {
        offset: usize,
        attempts: u32,
        source: EmbeddingError,
    },

    #[error("embedding response length mismatch: sent {sent} inputs, received {received} vectors")]
    LengthMismatch { sent: usize, received: usize },

    #[error("no embedding produced for input {0}")]
    MissingOutput(usize),
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("count error: {0}")]
    CountError(String),

    #[error("PostgreSQL error: {0}")]
    PostgresError(String),

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection errors are always retryable
            VectorStoreError::ConnectionError(_) => true,
            // Schema problems require operator intervention
            VectorStoreError::PgVectorExtensionError(_) => false,
            // Other errors might be transient
            VectorStoreError::CollectionError(msg)
            | VectorStoreError::UpsertError(msg)
            | VectorStoreError::QueryError(msg)
            | VectorStoreError::CountError(msg)
            | VectorStoreError::PostgresError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors related to reading and validating a corpus file.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),
}
