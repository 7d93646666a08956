//! Retrieval request and result types

use serde::{Deserialize, Serialize};

use crate::config::RetrievalConfig;

/// Topic-scoped similarity query against one tenant's knowledge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    /// Tenant whose index is searched
    pub tenant_id: String,
    /// Query text (e.g. a student answer)
    pub query: String,
    /// Category name from the taxonomy
    pub category: String,
    /// Passages returned
    pub k: usize,
    /// Candidates fetched before thresholding
    pub fetch_breadth: usize,
    /// Minimum cosine similarity
    pub score_threshold: f32,
}

impl RetrievalRequest {
    /// Build a request using configured defaults for k, breadth and threshold
    pub fn new(
        tenant_id: impl Into<String>,
        query: impl Into<String>,
        category: impl Into<String>,
        defaults: &RetrievalConfig,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            query: query.into(),
            category: category.into(),
            k: defaults.k,
            fetch_breadth: defaults.fetch_breadth,
            score_threshold: defaults.score_threshold,
        }
    }

    /// Override the number of returned passages
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self.fetch_breadth = self.fetch_breadth.max(k);
        self
    }

    /// Override the candidate breadth
    pub fn with_fetch_breadth(mut self, fetch_breadth: usize) -> Self {
        self.fetch_breadth = fetch_breadth;
        self
    }

    /// Override the similarity threshold
    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self
    }
}

/// A retrieved passage with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    /// Cosine similarity (higher is more similar)
    pub similarity: f32,
}
