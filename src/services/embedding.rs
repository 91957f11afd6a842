//! Client for a remote embedding endpoint.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

/// Anything that can turn token sequences into vectors.
///
/// The pipeline depends on this trait rather than the HTTP client so its
/// ordering and retry behavior can be exercised without a network.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one batch. The response has one vector per input sequence, in
    /// the same order as submitted.
    async fn embed_tokens(&self, batch: Vec<Vec<u32>>) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Request body for the /embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [Vec<u32>],
}

/// Response from the /embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// HTTP client for an OpenAI-compatible embeddings API.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    dimension: usize,
}

impl EmbeddingClient {
    /// Create a new client with the given configuration. The API key is
    /// resolved from the environment variable named in the config.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key()
            .map_err(|e| EmbeddingError::AuthError(e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            dimension: config.dimension as usize,
        })
    }

    /// Embed a single pre-tokenized query.
    pub async fn embed_query(&self, tokens: Vec<u32>) -> Result<Vec<f32>, EmbeddingError> {
        let vectors = self.embed_tokens(vec![tokens]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_tokens(&self, batch: Vec<Vec<u32>>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingsRequest {
            model: &self.model,
            input: &batch,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    EmbeddingError::AuthError(format!("status {}: {}", status, body))
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    EmbeddingError::RateLimited(format!("status {}: {}", status, body))
                }
                _ => EmbeddingError::ServerError(format!("status {}: {}", status, body)),
            });
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if parsed.data.len() != batch.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "sent {} inputs, received {} embeddings",
                batch.len(),
                parsed.data.len()
            )));
        }

        // The API tags each embedding with its request index; re-sort so the
        // batch order matches the submission order.
        let mut data = parsed.data;
        data.sort_by_key(|item| item.index);

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            if item.embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    got: item.embedding.len(),
                });
            }
            vectors.push(item.embedding);
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_api_key() {
        let config = EmbeddingConfig {
            api_key_env: "EMBEDPIPE_TEST_KEY_UNSET".to_string(),
            ..Default::default()
        };
        let result = EmbeddingClient::new(&config);
        assert!(matches!(result, Err(EmbeddingError::AuthError(_))));
    }

    #[test]
    fn test_base_url_trimming() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::set_var("EMBEDPIPE_TEST_KEY", "sk-test") };
        let config = EmbeddingConfig {
            api_base: "https://api.example.com/v1/".to_string(),
            api_key_env: "EMBEDPIPE_TEST_KEY".to_string(),
            ..Default::default()
        };
        let client = EmbeddingClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/v1");
    }
}
