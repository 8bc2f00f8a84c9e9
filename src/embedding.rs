//! Embedding provider abstraction.
//!
//! [`Embedder`] is the seam between the engine and whatever service turns
//! text into vectors; swapping providers means swapping one `Arc`, not
//! touching the engine. The shipped implementation targets OpenAI-compatible
//! `/v1/embeddings` endpoints.
//!
//! Retry strategy for the HTTP provider:
//! - HTTP 429 and 5xx → retry with exponential backoff (1s, 2s, 4s, ... capped)
//! - other 4xx → fail immediately
//! - network errors → retry
//!
//! Also provides the vector helpers used by the index backends:
//! [`vec_to_blob`] / [`blob_to_vec`] for BLOB storage and
//! [`cosine_similarity`], the fixed ranking metric.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Maps batches of texts to fixed-dimension vectors, order-preserving.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality for this configuration.
    fn dims(&self) -> usize;

    /// Embed a batch of texts. Returns one vector per input, in input order.
    ///
    /// Either every text is embedded or the call fails as a whole; a partial
    /// batch is never returned.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedding provider for OpenAI-compatible HTTP APIs.
///
/// Splits input into batches of `batch_size` texts per request and applies
/// bounded retry with backoff per request.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| Error::Config(format!("{} environment variable not set", config.api_key_env)))?;
        let base = config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com")
            .trim_end_matches('/');
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Embedding(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/embeddings", base),
            api_key,
            model: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: EmbeddingResponse = response
                            .json()
                            .await
                            .map_err(|e| Error::Embedding(format!("invalid response: {}", e)))?;
                        return self.check_batch(texts.len(), parsed);
                    }
                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(format!("embedding API {}: {}", status, text));
                        continue;
                    }
                    return Err(Error::Embedding(format!("embedding API {}: {}", status, text)));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(Error::Embedding(
            last_err.unwrap_or_else(|| "retries exhausted".to_string()),
        ))
    }

    fn check_batch(&self, expected: usize, parsed: EmbeddingResponse) -> Result<Vec<Vec<f32>>> {
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        if data.len() != expected {
            return Err(Error::Embedding(format!(
                "expected {} vectors, got {}",
                expected,
                data.len()
            )));
        }
        for d in &data {
            if d.embedding.len() != self.dims {
                return Err(Error::Embedding(format!(
                    "expected {}-dim vectors, got {}",
                    self.dims,
                    d.embedding.len()
                )));
            }
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}

/// Encode a float vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors, in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors or vectors of different lengths. This is
/// the index's fixed similarity metric.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_embedder(dims: usize) -> HttpEmbedder {
        HttpEmbedder {
            client: reqwest::Client::new(),
            endpoint: "http://localhost/v1/embeddings".to_string(),
            api_key: "test".to_string(),
            model: "test-model".to_string(),
            dims,
            batch_size: 16,
            max_retries: 0,
        }
    }

    fn datum(index: usize, embedding: Vec<f32>) -> EmbeddingDatum {
        EmbeddingDatum { index, embedding }
    }

    #[test]
    fn response_vectors_align_with_input_order() {
        let embedder = test_embedder(2);
        let parsed = EmbeddingResponse {
            data: vec![
                datum(1, vec![1.0, 1.0]),
                datum(0, vec![0.0, 0.0]),
                datum(2, vec![2.0, 2.0]),
            ],
        };
        let vectors = embedder.check_batch(3, parsed).unwrap();
        assert_eq!(vectors[0], vec![0.0, 0.0]);
        assert_eq!(vectors[1], vec![1.0, 1.0]);
        assert_eq!(vectors[2], vec![2.0, 2.0]);
    }

    #[test]
    fn short_response_batch_rejected() {
        let embedder = test_embedder(2);
        let parsed = EmbeddingResponse {
            data: vec![datum(0, vec![0.0, 0.0])],
        };
        assert!(matches!(
            embedder.check_batch(2, parsed),
            Err(Error::Embedding(_))
        ));
    }

    #[test]
    fn wrong_dimensionality_rejected() {
        let embedder = test_embedder(4);
        let parsed = EmbeddingResponse {
            data: vec![datum(0, vec![0.0, 0.0])],
        };
        assert!(matches!(
            embedder.check_batch(1, parsed),
            Err(Error::Embedding(_))
        ));
    }

    #[test]
    fn blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
