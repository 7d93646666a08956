//! Post-retrieval re-ranking policies

use crate::types::RetrievedPassage;

/// Reorders or filters thresholded candidates (most similar first)
pub trait RerankPolicy: Send + Sync {
    fn rerank(&self, candidates: Vec<RetrievedPassage>) -> Vec<RetrievedPassage>;

    fn name(&self) -> &str;
}

/// Prefer passages that mention every keyword
///
/// When at least one candidate contains all keywords (ignoring case), only
/// those are returned; otherwise every candidate is. An empty keyword list
/// changes nothing.
#[derive(Debug, Clone)]
pub struct RequireAllKeywords {
    keywords: Vec<String>,
}

impl RequireAllKeywords {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.keywords.iter().all(|k| lowered.contains(k.as_str()))
    }
}

impl RerankPolicy for RequireAllKeywords {
    fn rerank(&self, candidates: Vec<RetrievedPassage>) -> Vec<RetrievedPassage> {
        if self.keywords.is_empty() {
            return candidates;
        }

        let preferred: Vec<RetrievedPassage> = candidates
            .iter()
            .filter(|c| self.matches(&c.text))
            .cloned()
            .collect();

        if preferred.is_empty() {
            candidates
        } else {
            tracing::debug!(
                "Re-ranking kept {} of {} candidates",
                preferred.len(),
                candidates.len()
            );
            preferred
        }
    }

    fn name(&self) -> &str {
        "require-all-keywords"
    }
}

/// Returns candidates unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl RerankPolicy for PassThrough {
    fn rerank(&self, candidates: Vec<RetrievedPassage>) -> Vec<RetrievedPassage> {
        candidates
    }

    fn name(&self) -> &str {
        "pass-through"
    }
}
