//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: Local Ollama server (nomic-embed-text)
/// - `HashingEmbedder`: Deterministic feature hashing, no model server
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimensions (e.g., 768 for nomic-embed-text)
    fn dimensions(&self) -> usize;

    /// Model identifier recorded in every index this provider builds
    fn model(&self) -> &str;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Embed texts with up to `parallelism` requests in flight
///
/// Output order matches input order. The first failure aborts the batch
/// and names the failing item as `"{label} #{index}"`.
pub async fn embed_all(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    parallelism: usize,
    label: &str,
) -> Result<Vec<Vec<f32>>> {
    let expected = provider.dimensions();

    // Owned futures keep the caller's future `Send`
    let requests: Vec<BoxFuture<'_, Result<Vec<f32>>>> = texts
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let context = format!("{} #{}", label, index);
            async move {
                let embedding = provider
                    .embed(text)
                    .await
                    .map_err(|e| e.with_embedding_context(context))?;

                if embedding.len() != expected {
                    return Err(Error::DimensionMismatch {
                        expected,
                        found: embedding.len(),
                    });
                }
                Ok(embedding)
            }
            .boxed()
        })
        .collect();

    stream::iter(requests)
        .buffered(parallelism.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FailingEmbedder {
        fail_on: &'static str,
    }

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text == self.fail_on {
                Err(Error::embedding("model unavailable"))
            } else {
                Ok(vec![text.len() as f32, 1.0])
            }
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model(&self) -> &str {
            "failing"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_embed_all_preserves_order() {
        let provider = FailingEmbedder { fail_on: "" };
        let texts: Vec<String> = (1..=20).map(|n| "x".repeat(n)).collect();

        let embeddings = embed_all(&provider, &texts, 4, "passage").await.unwrap();
        let lengths: Vec<f32> = embeddings.iter().map(|e| e[0]).collect();
        assert_eq!(lengths, (1..=20).map(|n| n as f32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_embed_all_runs_on_spawned_task() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FailingEmbedder { fail_on: "" });
        let texts = vec!["segmentation".to_string(), "pricing".to_string()];

        let embeddings = tokio::spawn(async move {
            embed_all(provider.as_ref(), &texts, 2, "passage").await
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(embeddings, vec![vec![12.0, 1.0], vec![7.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_all_names_failing_item() {
        let provider = FailingEmbedder { fail_on: "bad" };
        let texts = vec!["ok".to_string(), "bad".to_string(), "fine".to_string()];

        let err = embed_all(&provider, &texts, 2, "passage").await.unwrap_err();
        match err {
            Error::Embedding { context, .. } => assert_eq!(context, "passage #1"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
