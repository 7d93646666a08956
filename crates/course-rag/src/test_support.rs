//! Deterministic embedder and fixtures shared by unit tests

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

/// One axis per stem; a text's vector counts stem occurrences
pub const AXES: &[&str] = &[
    "segment",
    "target",
    "position",
    "differentiat",
    "pric",
    "product",
    "promot",
    "distribut",
    "strateg",
    "planning",
    "customer",
];

/// Keyword-count embedder with predictable similarities
pub struct AxisEmbedder {
    model: String,
    fail_on: Option<String>,
    stall_on: Option<String>,
    stall_after: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl AxisEmbedder {
    pub fn new() -> Self {
        Self {
            model: "axis-test".to_string(),
            fail_on: None,
            stall_on: None,
            stall_after: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never answers for texts containing `word`
    pub fn stalling_on(word: &str) -> Self {
        Self {
            stall_on: Some(word.to_string()),
            ..Self::new()
        }
    }

    /// Answers the first `calls` requests, then never answers
    pub fn stalling_after(calls: usize) -> Self {
        Self {
            stall_after: Some(calls),
            ..Self::new()
        }
    }

    /// Fails every text containing `word`
    pub fn failing_on(word: &str) -> Self {
        Self {
            fail_on: Some(word.to_string()),
            ..Self::new()
        }
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Self::new()
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        AXES.iter()
            .map(|stem| lowered.matches(stem).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for AxisEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_after.is_some_and(|limit| previous >= limit) {
            std::future::pending::<()>().await;
        }
        if let Some(word) = &self.fail_on {
            if text.contains(word.as_str()) {
                return Err(Error::embedding("model unavailable"));
            }
        }
        if let Some(word) = &self.stall_on {
            if text.contains(word.as_str()) {
                std::future::pending::<()>().await;
            }
        }
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        AXES.len()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "axis"
    }
}

/// Config storing indices under `root`, one passage per short file
pub fn test_config(root: &Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 0;
    config.embeddings.parallel_requests = Some(2);
    config.storage.root = root.to_path_buf();
    config
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

pub const SEGMENTATION_TEXT: &str = "Segmentation splits a market into groups of buyers with shared needs. \
Demographic segmentation uses age and income while behavioral segmentation uses purchase habits.";

pub const PRICING_TEXT: &str =
    "Pricing decisions shape how customers perceive the product and support the overall strategy.";

pub const CASE_STUDY_TEXT: &str = "Case study: a regional bakery split its buyers into commuters and students, \
then priced each product line for the group that bought it most.";
