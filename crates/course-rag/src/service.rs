//! Entry point tying ingestion and retrieval to one configuration

use std::future::Future;
use std::sync::Arc;

use crate::classification::{CategoryClassifier, Taxonomy};
use crate::config::RagConfig;
use crate::error::Result;
use crate::processing::IngestOrchestrator;
use crate::providers::{build_embedder, EmbeddingProvider};
use crate::retrieval::{RerankPolicy, RetrievalEngine};
use crate::storage::{IndexSummary, TenantStore};
use crate::types::{IngestRequest, PipelineOutcome, RetrievalRequest, RetrievedPassage};

/// Course knowledge service shared by every tenant
///
/// Holds the embedder, the cached category embeddings and the tenant
/// locks, so one instance should serve the whole process.
pub struct KnowledgeService {
    config: RagConfig,
    taxonomy: Arc<Taxonomy>,
    embedder: Arc<dyn EmbeddingProvider>,
    classifier: Arc<CategoryClassifier>,
    store: Arc<TenantStore>,
    orchestrator: IngestOrchestrator,
    retrieval: RetrievalEngine,
}

impl KnowledgeService {
    /// Create a service using the configured embedding backend
    pub fn new(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let embedder = build_embedder(&config.embeddings)?;
        Self::with_embedder(config, embedder)
    }

    /// Create a service with a caller-supplied embedder
    pub fn with_embedder(config: RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;

        if embedder.dimensions() != config.embeddings.dimensions {
            tracing::warn!(
                "Embedder {} produces {} dimensions, configuration says {}",
                embedder.name(),
                embedder.dimensions(),
                config.embeddings.dimensions
            );
        }

        let parallelism = config.embeddings.parallelism();
        let taxonomy = Arc::new(config.taxonomy.clone());

        let classifier = Arc::new(CategoryClassifier::new(
            Arc::clone(&taxonomy),
            Arc::clone(&embedder),
            config.classification.clone(),
            parallelism,
        ));
        let store = Arc::new(TenantStore::new(
            &config.storage,
            Arc::clone(&embedder),
            parallelism,
        ));
        let orchestrator =
            IngestOrchestrator::new(&config, Arc::clone(&classifier), Arc::clone(&store));
        let retrieval = RetrievalEngine::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            Arc::clone(&taxonomy),
            config.retrieval.clone(),
        );

        tracing::info!(
            "Knowledge service ready: {} categories, storage at {}",
            taxonomy.len(),
            config.storage.root.display()
        );

        Ok(Self {
            config,
            taxonomy,
            embedder,
            classifier,
            store,
            orchestrator,
            retrieval,
        })
    }

    /// Replace the re-ranking policy
    pub fn with_rerank_policy(mut self, policy: Arc<dyn RerankPolicy>) -> Self {
        self.retrieval = self.retrieval.with_rerank_policy(policy);
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Embed category descriptions ahead of the first ingestion
    pub async fn warm_up(&self) -> Result<()> {
        self.classifier.warm_up().await
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.embedder.health_check().await
    }

    /// The embedder in use, with its server address when it has one
    pub fn embedding_backend(&self) -> String {
        match self.embedder.name() {
            "ollama" => format!(
                "ollama at {} ({})",
                self.config.embeddings.base_url,
                self.embedder.model()
            ),
            name => format!("{} ({})", name, self.embedder.model()),
        }
    }

    /// Run an ingestion request; failures are reported in the outcome
    pub async fn ingest(&self, request: &IngestRequest) -> PipelineOutcome {
        self.orchestrator.ingest(request).await
    }

    /// Run an ingestion request until `cancel` resolves
    pub async fn ingest_until<C>(&self, request: &IngestRequest, cancel: C) -> PipelineOutcome
    where
        C: Future<Output = ()>,
    {
        self.orchestrator.ingest_until(request, cancel).await
    }

    /// Request with configured retrieval defaults
    pub fn request(&self, tenant_id: &str, query: &str, category: &str) -> RetrievalRequest {
        self.retrieval.request(tenant_id, query, category)
    }

    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Vec<String>> {
        self.retrieval.retrieve(request).await
    }

    pub async fn retrieve_scored(
        &self,
        request: &RetrievalRequest,
    ) -> Result<Vec<RetrievedPassage>> {
        self.retrieval.retrieve_scored(request).await
    }

    /// Retrieve from several categories and merge without repeats
    ///
    /// Without explicit categories, they are picked from the query's
    /// keywords with the taxonomy's default category as fallback.
    pub async fn retrieve_context(
        &self,
        tenant_id: &str,
        query: &str,
        categories: Option<&[String]>,
    ) -> Result<Vec<String>> {
        let ids = match categories {
            Some(names) => names
                .iter()
                .map(|name| self.taxonomy.require(name))
                .collect::<Result<Vec<_>>>()?,
            None => self.taxonomy.categories_for_text(query),
        };

        self.retrieval.retrieve_context(tenant_id, query, &ids).await
    }

    /// Describe a tenant's index, `None` when it was never built
    pub async fn index_summary(&self, tenant_id: &str) -> Result<Option<IndexSummary>> {
        Ok(self
            .store
            .snapshot(tenant_id)
            .await?
            .map(|index| index.summary()))
    }
}
