//! Configuration for the knowledge pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classification::Taxonomy;
use crate::error::{Error, Result};

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Passage classification configuration
    pub classification: ClassificationConfig,
    /// Topic categories and re-ranking keywords
    pub taxonomy: Taxonomy,
    /// Retrieval defaults
    pub retrieval: RetrievalConfig,
    /// Index storage configuration
    pub storage: StorageConfig,
    /// Ingestion run configuration
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: RagConfig = toml::from_str(&raw)?;
        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be positive".into()));
        }
        if self.retrieval.k == 0 {
            return Err(Error::Config("retrieval.k must be positive".into()));
        }
        if self.retrieval.fetch_breadth < self.retrieval.k {
            return Err(Error::Config(format!(
                "retrieval.fetch_breadth ({}) must be at least k ({})",
                self.retrieval.fetch_breadth, self.retrieval.k
            )));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.score_threshold) {
            return Err(Error::Config(
                "retrieval.score_threshold must lie in [-1, 1]".into(),
            ));
        }
        if self.storage.index_file_name.trim().is_empty() {
            return Err(Error::Config("storage.index_file_name must not be empty".into()));
        }
        self.taxonomy.validate()
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// Deterministic feature-hashing embedder, no model required
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which backend produces vectors
    pub provider: EmbeddingBackend,
    /// Model name (recorded in every index; must stay stable per tenant)
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Ollama base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Concurrent embedding requests per run (default: CPU count, max 4)
    pub parallel_requests: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Ollama,
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 60,
            max_retries: 2,
            parallel_requests: None,
        }
    }
}

impl EmbeddingConfig {
    /// Effective number of in-flight embedding requests
    pub fn parallelism(&self) -> usize {
        self.parallel_requests
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target passage length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive passages
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
        }
    }
}

/// Passage classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Phrase marking case-study narratives (matched case-insensitively)
    pub case_study_phrase: String,
    /// Passages with the phrase longer than this are dropped
    ///
    /// Defaults to 500. A cutoff at or above `chunking.chunk_size` (800)
    /// would never fire, since no passage is longer than the chunk size.
    pub case_study_min_chars: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            case_study_phrase: "case study".to_string(),
            case_study_min_chars: 500,
        }
    }
}

/// Retrieval defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages returned
    pub k: usize,
    /// Candidates fetched before thresholding
    pub fetch_breadth: usize,
    /// Minimum cosine similarity
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 5,
            fetch_breadth: 10,
            score_threshold: 0.7,
        }
    }
}

/// Index storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per tenant
    pub root: PathBuf,
    /// Artifact file name inside `<tenant>/indices/`
    pub index_file_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("course-rag")
            .join("tenants");

        Self {
            root,
            index_file_name: "knowledge_index.bin".to_string(),
        }
    }
}

/// Ingestion run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Abort an ingestion run after this many seconds (reported as cancelled)
    pub ingest_timeout_secs: Option<u64>,
}

impl ProcessingConfig {
    /// Run timeout, if configured
    pub fn ingest_timeout(&self) -> Option<Duration> {
        self.ingest_timeout_secs.map(Duration::from_secs)
    }
}
