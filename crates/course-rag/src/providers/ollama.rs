//! Ollama-backed passage embedder

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;

/// Longest wait between attempts
const MAX_BACKOFF: Duration = Duration::from_secs(16);

/// Embeds passages through a local Ollama server
pub struct OllamaEmbedder {
    client: Client,
    /// Server root without trailing slash
    base_url: String,
    model: String,
    dimensions: usize,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsReply {
    embedding: Vec<f32>,
}

/// Failure of one attempt
enum AttemptError {
    /// Worth another attempt (transport errors, 5xx, 429)
    Transient(Error),
    /// Retrying cannot help
    Fatal(Error),
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(config.parallelism())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_retries: config.max_retries,
        })
    }

    fn backoff(attempt: u32) -> Duration {
        Duration::from_secs(2u64.saturating_pow(attempt)).min(MAX_BACKOFF)
    }

    async fn attempt(&self, text: &str) -> std::result::Result<Vec<f32>, AttemptError> {
        let body = EmbeddingsBody {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let message = format!("request to {} failed: {}", self.base_url, e);
                AttemptError::Transient(Error::embedding(message))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let err = Error::embedding(format!(
                "{} answered HTTP {}: {}",
                self.model,
                status,
                detail.trim()
            ));
            let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
            return Err(if retryable {
                AttemptError::Transient(err)
            } else {
                AttemptError::Fatal(err)
            });
        }

        let reply: EmbeddingsReply = response
            .json()
            .await
            .map_err(|e| {
                AttemptError::Fatal(Error::embedding(format!("unreadable embedding reply: {}", e)))
            })?;

        if reply.embedding.is_empty() {
            let message = format!("{} returned an empty vector", self.model);
            return Err(AttemptError::Fatal(Error::embedding(message)));
        }
        if reply.embedding.len() != self.dimensions {
            return Err(AttemptError::Fatal(Error::DimensionMismatch {
                expected: self.dimensions,
                found: reply.embedding.len(),
            }));
        }

        Ok(reply.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 0;
        loop {
            match self.attempt(text).await {
                Ok(vector) => return Ok(vector),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(e)) if attempt >= self.max_retries => return Err(e),
                Err(AttemptError::Transient(e)) => {
                    let delay = Self::backoff(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "Embedding attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }

    /// True when the server lists its models
    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        let reachable = match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama at {} unreachable: {}", self.base_url, e);
                false
            }
        };
        Ok(reachable)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
