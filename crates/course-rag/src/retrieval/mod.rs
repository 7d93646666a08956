//! Retrieval over per-tenant category indices

mod rerank;
mod search;

pub use rerank::{PassThrough, RequireAllKeywords, RerankPolicy};
pub use search::RetrievalEngine;
