//! Qdrant vector store backend.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use std::collections::HashMap;
use uuid::Uuid;

use super::VectorStore;
use crate::error::VectorStoreError;
use crate::models::{QueryMatch, VectorRecord, VectorStoreConfig};

/// Namespace-partitioned backend: the namespace lives in the point payload
/// and is applied as a filter on query and count.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embedding_dim: u64,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            embedding_dim,
        })
    }

    /// Qdrant point ids must be UUIDs or integers; record ids are arbitrary
    /// strings, so the point id is derived and the original kept in payload.
    fn point_id(record_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
    }

    fn namespace_filter(namespace: Option<&str>) -> Option<Filter> {
        namespace.map(|ns| Filter::must([Condition::matches("namespace", ns.to_string())]))
    }

    fn payload_str(
        payload: &HashMap<String, qdrant_client::qdrant::Value>,
        key: &str,
    ) -> Option<String> {
        payload.get(key).and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
    }

    async fn collection_exists(&self) -> Result<bool, VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(false)
                } else {
                    Err(VectorStoreError::CollectionError(msg))
                }
            }
        }
    }
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_ready(&self) -> Result<(), VectorStoreError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

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

        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("doc_id".to_string(), record.id.clone().into());
                payload.insert("title".to_string(), record.title.into());
                payload.insert("text".to_string(), record.text.into());
                if let Some(ns) = namespace {
                    payload.insert("namespace".to_string(), ns.to_string().into());
                }

                PointStruct::new(Self::point_id(&record.id), record.vector, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points);

        self.client
            .upsert_points(upsert)
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
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, vector, top_k).with_payload(true);

        if let Some(filter) = Self::namespace_filter(namespace) {
            search_builder = search_builder.filter(filter);
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorStoreError::QueryError(e.to_string()))?;

        let matches = results
            .result
            .into_iter()
            .map(|point| {
                let id = Self::payload_str(&point.payload, "doc_id").unwrap_or_default();
                QueryMatch {
                    id,
                    score: point.score,
                    title: Self::payload_str(&point.payload, "title"),
                    text: Self::payload_str(&point.payload, "text"),
                }
            })
            .collect();

        Ok(matches)
    }

    async fn count(&self, namespace: Option<&str>) -> Result<u64, VectorStoreError> {
        if !self.collection_exists().await? {
            return Ok(0);
        }

        let mut count_builder = CountPointsBuilder::new(&self.collection).exact(true);
        if let Some(filter) = Self::namespace_filter(namespace) {
            count_builder = count_builder.filter(filter);
        }

        let response = self
            .client
            .count(count_builder)
            .await
            .map_err(|e| VectorStoreError::CountError(e.to_string()))?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_deterministic() {
        let a = QdrantBackend::point_id("doc-42");
        let b = QdrantBackend::point_id("doc-42");
        assert_eq!(a, b);
        assert_eq!(a.len(), 36);

        let c = QdrantBackend::point_id("doc-43");
        assert_ne!(a, c);
    }

    #[test]
    fn test_namespace_filter_absent_without_namespace() {
        assert!(QdrantBackend::namespace_filter(None).is_none());
        assert!(QdrantBackend::namespace_filter(Some("wiki")).is_some());
    }
}
