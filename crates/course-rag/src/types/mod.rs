//! Core types for course materials, passages, retrieval and pipeline outcomes

pub mod document;
pub mod outcome;
pub mod query;

pub use document::{CourseMaterial, FileType, Passage};
pub use outcome::{
    FileError, IngestMode, IngestRequest, IngestStats, OutcomeStatus, PipelineOutcome,
    PipelineStage, StoreReport,
};
pub use query::{RetrievalRequest, RetrievedPassage};
