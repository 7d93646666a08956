//! Embedding providers
//!
//! The pipeline talks to embedding models only through `EmbeddingProvider`,
//! so the Ollama backend can be swapped for the local hashing backend.

pub mod embedding;
pub mod local;
pub mod ollama;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::Result;

pub use embedding::{embed_all, EmbeddingProvider};
pub use local::HashingEmbedder;
pub use ollama::OllamaEmbedder;

/// Build the configured embedding provider
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.dimensions)),
    };

    tracing::info!(
        "Using {} embeddings (model: {}, {} dimensions)",
        provider.name(),
        provider.model(),
        provider.dimensions()
    );

    Ok(provider)
}
