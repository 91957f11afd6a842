//! Vector store abstraction layer.
//!
//! A trait-based abstraction over the two supported backends (Qdrant,
//! PostgreSQL/pgvector) so the pipeline and the CLI are not coupled to
//! either product's API shape.

mod pgvector;
mod qdrant;

pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{QueryMatch, VectorDriver, VectorRecord, VectorStoreConfig};

/// Abstract trait for vector store operations.
///
/// `namespace` scopes upserts, queries and counts to a named partition of the
/// collection; `None` means the unpartitioned default. Backends without
/// native partitions emulate them with a payload field or column.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Create the collection or declare the table schema if missing.
    /// Idempotent.
    async fn ensure_ready(&self) -> Result<(), VectorStoreError>;

    /// Insert or update records by id.
    async fn upsert(
        &self,
        records: Vec<VectorRecord>,
        namespace: Option<&str>,
    ) -> Result<(), VectorStoreError>;

    /// Nearest-neighbor query, ranked by similarity (highest first).
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, VectorStoreError>;

    /// Number of stored vectors, optionally per namespace. A missing
    /// collection counts as zero.
    async fn count(&self, namespace: Option<&str>) -> Result<u64, VectorStoreError>;

    /// Get the collection/table name.
    fn collection(&self) -> &str;
}

/// Create a vector store backend based on configuration.
pub async fn create_backend(
    config: &VectorStoreConfig,
    embedding_dim: u64,
) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config, embedding_dim)?;
            Ok(Box::new(backend))
        }
        VectorDriver::PgVector => {
            let backend = PgVectorBackend::new(config, embedding_dim).await?;
            Ok(Box::new(backend))
        }
    }
}
