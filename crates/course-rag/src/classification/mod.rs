//! Topic taxonomy and passage classification

mod classifier;
mod taxonomy;

pub use classifier::{nearest_category, CategoryBuckets, CategoryClassifier, ClassificationResult};
pub use taxonomy::{Category, CategoryId, Taxonomy};
