//! Flat cosine-similarity index for one category

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RetrievedPassage;

/// Cosine similarity; zero-norm vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// A stored passage and its vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Exhaustive similarity index over one category's passages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    dimensions: usize,
    entries: Vec<IndexedPassage>,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedPassage] {
        &self.entries
    }

    /// Append a passage; the vector must match the index dimensions
    pub fn insert(&mut self, text: String, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                found: embedding.len(),
            });
        }
        self.entries.push(IndexedPassage { text, embedding });
        Ok(())
    }

    pub fn contains_text(&self, text: &str) -> bool {
        self.entries.iter().any(|e| e.text == text)
    }

    /// The `n` most similar passages, most similar first
    ///
    /// Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], n: usize) -> Vec<RetrievedPassage> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(n);

        scored
            .into_iter()
            .map(|(i, similarity)| RetrievedPassage {
                text: self.entries[i].text.clone(),
                similarity,
            })
            .collect()
    }

    /// Reject entries whose vectors disagree with the declared dimensions
    pub(crate) fn check_dimensions(&self) -> Result<()> {
        match self.entries.iter().find(|e| e.embedding.len() != self.dimensions) {
            Some(bad) => Err(Error::DimensionMismatch {
                expected: self.dimensions,
                found: bad.embedding.len(),
            }),
            None => Ok(()),
        }
    }
}
