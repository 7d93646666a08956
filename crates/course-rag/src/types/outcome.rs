//! Ingestion requests and structured outcomes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::ErrorKind;

/// How an ingestion run writes the tenant index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Replace the tenant index with one built from this run only
    #[default]
    Fresh,
    /// Merge this run's passages into the existing index
    Update,
}

/// Ingestion request for one tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub tenant_id: String,
    /// Files or directories of course material
    pub paths: Vec<PathBuf>,
    pub mode: IngestMode,
}

impl IngestRequest {
    pub fn new(tenant_id: impl Into<String>, paths: Vec<PathBuf>, mode: IngestMode) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            paths,
            mode,
        }
    }
}

/// Pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Start,
    Loading,
    Segmenting,
    Classifying,
    Indexing,
    Done,
    Failed,
    Cancelled,
}

impl PipelineStage {
    /// Next stage on success
    pub fn next(self) -> Self {
        match self {
            Self::Start => Self::Loading,
            Self::Loading => Self::Segmenting,
            Self::Segmenting => Self::Classifying,
            Self::Classifying => Self::Indexing,
            Self::Indexing => Self::Done,
            terminal => terminal,
        }
    }

    /// Done, Failed and Cancelled absorb
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Loading => "loading",
            Self::Segmenting => "segmenting",
            Self::Classifying => "classifying",
            Self::Indexing => "indexing",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// A file that could not be loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub error: String,
}

/// Counters reported by every run, complete or not
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Files successfully loaded
    pub file_count: usize,
    /// Total extracted characters across loaded files
    pub extracted_text_length: usize,
    /// Passages produced by segmentation
    pub passage_count: usize,
    /// Passages dropped as long case studies
    pub excluded_passages: usize,
    /// Passages per category, every category listed
    pub per_category_chunk_counts: BTreeMap<String, usize>,
}

/// What a store write changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreReport {
    /// Vectors appended per category
    pub added: BTreeMap<String, usize>,
    /// Texts already indexed in their category
    pub duplicates_skipped: usize,
    /// Categories with no passages in this run
    pub empty_categories: Vec<String>,
    /// Vectors in the artifact after the write
    pub total_vectors: usize,
}

/// Structured result of an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub tenant_id: String,
    pub mode: IngestMode,
    pub status: OutcomeStatus,
    pub success: bool,
    pub message: String,
    /// Terminal stage
    pub stage: PipelineStage,
    /// Stages finished before the terminal one
    pub steps_completed: Vec<PipelineStage>,
    pub stats: IngestStats,
    pub processed_files: Vec<PathBuf>,
    pub file_errors: Vec<FileError>,
    /// Present once indexing finished
    pub store_report: Option<StoreReport>,
    pub elapsed_ms: u64,
}
