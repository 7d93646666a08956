//! Persistent per-tenant vector storage

mod tenant_store;
mod vector_index;

pub use tenant_store::{
    tenant_dir_name, IndexSummary, PendingWrite, TenantIndex, TenantLease, TenantStore,
    INDEX_MAGIC, SCHEMA_VERSION,
};
pub use vector_index::{cosine_similarity, IndexedPassage, VectorIndex};
