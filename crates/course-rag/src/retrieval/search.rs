//! Topic-scoped similarity search over a tenant's knowledge index

use std::collections::HashSet;
use std::sync::Arc;

use crate::classification::{CategoryId, Taxonomy};
use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::storage::TenantStore;
use crate::types::{RetrievalRequest, RetrievedPassage};

use super::rerank::{RequireAllKeywords, RerankPolicy};

/// Retrieves passages for a query within one category
pub struct RetrievalEngine {
    store: Arc<TenantStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    taxonomy: Arc<Taxonomy>,
    defaults: RetrievalConfig,
    rerank: Arc<dyn RerankPolicy>,
}

impl RetrievalEngine {
    /// Create an engine re-ranking with the taxonomy's keywords
    pub fn new(
        store: Arc<TenantStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        taxonomy: Arc<Taxonomy>,
        defaults: RetrievalConfig,
    ) -> Self {
        let rerank = Arc::new(RequireAllKeywords::new(&taxonomy.rerank_keywords));
        Self {
            store,
            embedder,
            taxonomy,
            defaults,
            rerank,
        }
    }

    pub fn with_rerank_policy(mut self, policy: Arc<dyn RerankPolicy>) -> Self {
        self.rerank = policy;
        self
    }

    /// Request for `category` using configured k, breadth and threshold
    pub fn request(&self, tenant_id: &str, query: &str, category: &str) -> RetrievalRequest {
        RetrievalRequest::new(tenant_id, query, category, &self.defaults)
    }

    /// Passage texts, most relevant first
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Vec<String>> {
        Ok(self
            .retrieve_scored(request)
            .await?
            .into_iter()
            .map(|p| p.text)
            .collect())
    }

    /// Passages with their similarity to the query
    ///
    /// Unknown categories are an input error. A tenant or category that was
    /// never indexed yields an empty result.
    pub async fn retrieve_scored(
        &self,
        request: &RetrievalRequest,
    ) -> Result<Vec<RetrievedPassage>> {
        let category = self.taxonomy.require(&request.category)?;
        let name = self.taxonomy.name(category);

        let Some(index) = self.store.snapshot(&request.tenant_id).await? else {
            tracing::info!("No index for tenant {}", request.tenant_id);
            return Ok(Vec::new());
        };

        let vectors = match index.category(name) {
            Some(vectors) if !vectors.is_empty() => vectors,
            _ => {
                tracing::info!(
                    "Tenant {} has no passages for '{}'",
                    request.tenant_id,
                    name
                );
                return Ok(Vec::new());
            }
        };

        if index.embedding_model != self.embedder.model() {
            return Err(Error::EmbeddingModelMismatch {
                expected: index.embedding_model.clone(),
                found: self.embedder.model().to_string(),
            });
        }

        let query_embedding = self
            .embedder
            .embed(&request.query)
            .await
            .map_err(|e| e.with_embedding_context("query"))?;

        if query_embedding.len() != vectors.dimensions() {
            return Err(Error::DimensionMismatch {
                expected: vectors.dimensions(),
                found: query_embedding.len(),
            });
        }

        let breadth = request.fetch_breadth.max(request.k);
        let candidates = vectors.search(&query_embedding, breadth);
        let fetched = candidates.len();

        let mut kept: Vec<RetrievedPassage> = candidates
            .into_iter()
            .filter(|c| c.similarity >= request.score_threshold)
            .collect();
        kept.truncate(request.k);

        let ranked = self.rerank.rerank(kept);

        tracing::debug!(
            "Retrieved {} of {} candidates from '{}' for tenant {} ({})",
            ranked.len(),
            fetched,
            name,
            request.tenant_id,
            self.rerank.name()
        );

        Ok(ranked)
    }

    /// Retrieve across several categories, dropping repeated passages
    ///
    /// Texts keep the order in which they were first seen.
    pub async fn retrieve_context(
        &self,
        tenant_id: &str,
        query: &str,
        categories: &[CategoryId],
    ) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut context = Vec::new();

        for &id in categories {
            let request = self.request(tenant_id, query, self.taxonomy.name(id));
            for text in self.retrieve(&request).await? {
                if seen.insert(text.clone()) {
                    context.push(text);
                }
            }
        }

        Ok(context)
    }
}
