//! PostgreSQL/pgvector backend.
//!
//! Schema-based object store: the table with its typed columns must be
//! declared before any insert, queries report `1 - cosine_distance` as the
//! certainty score.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;

use super::VectorStore;
use crate::error::VectorStoreError;
use crate::models::{QueryMatch, VectorRecord, VectorStoreConfig};

pub struct PgVectorBackend {
    pool: PgPool,
    table_name: String,
    collection: String,
    embedding_dim: u64,
}

impl PgVectorBackend {
    pub async fn new(
        config: &VectorStoreConfig,
        embedding_dim: u64,
    ) -> Result<Self, VectorStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(&config.url)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let backend = Self {
            pool,
            table_name: config.qualified_table_name(),
            collection: config.collection.clone(),
            embedding_dim,
        };

        backend.check_pgvector_extension().await?;

        if let Some(ref schema) = config.schema {
            backend.ensure_pg_schema(schema).await?;
        }

        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), VectorStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        if result.is_none() {
            return Err(VectorStoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_pg_schema(&self, schema: &str) -> Result<(), VectorStoreError> {
        let query = format!("CREATE SCHEMA IF NOT EXISTS {}", schema);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;
        Ok(())
    }

    async fn table_exists(&self) -> Result<bool, VectorStoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT table_name FROM information_schema.tables WHERE table_name = $1",
        )
        .bind(&self.collection)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl VectorStore for PgVectorBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_ready(&self) -> Result<(), VectorStoreError> {
        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                namespace TEXT,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                embedding vector({}) NOT NULL
            )
            "#,
            self.table_name, self.embedding_dim
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        let indices = [
            format!(
                "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {} USING hnsw (embedding vector_cosine_ops)",
                self.collection, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_namespace_idx ON {} (namespace)",
                self.collection, self.table_name
            ),
        ];

        for index_sql in &indices {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;
        }

        Ok(())
    }

    async fn upsert(
        &self,
        records: Vec<VectorRecord>,
        namespace: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let query = format!(
            r#"
            INSERT INTO {} (id, namespace, title, body, embedding)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                namespace = EXCLUDED.namespace,
                title = EXCLUDED.title,
                body = EXCLUDED.body,
                embedding = EXCLUDED.embedding
            "#,
            self.table_name
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        for record in records {
            let embedding = Vector::from(record.vector);

            sqlx::query(&query)
                .bind(&record.id)
                .bind(namespace)
                .bind(&record.title)
                .bind(&record.text)
                .bind(&embedding)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(())
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let embedding = Vector::from(vector);

        let where_clause = if namespace.is_some() {
            "WHERE namespace = $2"
        } else {
            ""
        };

        let query = format!(
            r#"
            SELECT
                id,
                1 - (embedding <=> $1) as certainty,
                title,
                body
            FROM {}
            {}
            ORDER BY embedding <=> $1
            LIMIT {}
            "#,
            self.table_name, where_clause, top_k
        );

        let mut query_builder = sqlx::query(&query).bind(&embedding);
        if let Some(ns) = namespace {
            query_builder = query_builder.bind(ns);
        }

        let rows = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::QueryError(e.to_string()))?;

        let matches = rows
            .into_iter()
            .map(|row: PgRow| {
                let id: String = row.get("id");
                let certainty: f64 = row.get("certainty");
                let title: String = row.get("title");
                let body: String = row.get("body");

                QueryMatch {
                    id,
                    score: certainty as f32,
                    title: Some(title),
                    text: Some(body),
                }
            })
            .collect();

        Ok(matches)
    }

    async fn count(&self, namespace: Option<&str>) -> Result<u64, VectorStoreError> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let row: (i64,) = match namespace {
            Some(ns) => {
                let query = format!(
                    "SELECT COUNT(*) FROM {} WHERE namespace = $1",
                    self.table_name
                );
                sqlx::query_as(&query)
                    .bind(ns)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| VectorStoreError::CountError(e.to_string()))?
            }
            None => {
                let query = format!("SELECT COUNT(*) FROM {}", self.table_name);
                sqlx::query_as(&query)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| VectorStoreError::CountError(e.to_string()))?
            }
        };

        Ok(row.0 as u64)
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
