//! Ingestion run orchestration

mod orchestrator;

pub use orchestrator::IngestOrchestrator;
