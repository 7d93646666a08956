//! Course material loading and passage segmentation

mod chunker;
mod parser;

pub use chunker::{PassageSpan, Passages, TextChunker};
pub use parser::{normalize_text, FileParser};
