//! course-rag: per-tenant course-material knowledge pipeline
//!
//! Course files (pdf, docx, txt) are split into overlapping passages, each
//! passage is assigned to the nearest category of a fixed topic taxonomy,
//! and every category gets its own vector index inside a per-tenant
//! artifact. Retrieval is scoped to one tenant and one category, with
//! similarity thresholding and keyword re-ranking.

pub mod classification;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod service;
pub mod storage;
pub mod types;

#[cfg(test)]
mod test_support;

pub use classification::{CategoryId, Taxonomy};
pub use config::RagConfig;
pub use error::{Error, ErrorKind, Result};
pub use service::KnowledgeService;
pub use types::{
    IngestMode, IngestRequest, OutcomeStatus, PipelineOutcome, PipelineStage, RetrievalRequest,
    RetrievedPassage,
};
