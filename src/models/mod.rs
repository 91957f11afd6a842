mod config;
mod document;
mod query;

pub use config::{
    Config, DEFAULT_API_BASE, DEFAULT_API_KEY_ENV, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_QDRANT_URL, EmbeddingConfig, PipelineConfig, QueryConfig,
    VectorDriver, VectorStoreConfig,
};
pub use document::{Document, VectorRecord};
pub use query::{OutputFormat, QueryMatch, QueryResults};
