//! Per-tenant knowledge index persistence
//!
//! Each tenant owns one artifact at `{root}/{tenant_dir}/indices/{file}`.
//! All reads and writes go through a [`TenantLease`], which holds the
//! tenant's in-process lock until dropped. Writes are split into a
//! cancellable prepare step and a [`TenantStore::commit`] that keeps the
//! lock until the artifact is on disk.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::classification::CategoryBuckets;
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::providers::{embed_all, EmbeddingProvider};
use crate::types::StoreReport;

use super::vector_index::VectorIndex;

/// Artifact file magic
pub const INDEX_MAGIC: &[u8; 4] = b"CRIX";

/// Current artifact schema version
pub const SCHEMA_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;
const MAX_TENANT_DIR_PREFIX: usize = 64;

/// One tenant's persisted knowledge, one vector index per category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantIndex {
    pub tenant_id: String,
    /// Model that produced every vector in this index
    pub embedding_model: String,
    pub dimensions: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Keyed by category name
    pub categories: BTreeMap<String, VectorIndex>,
}

impl TenantIndex {
    pub fn new(tenant_id: &str, embedding_model: &str, dimensions: usize) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: tenant_id.to_string(),
            embedding_model: embedding_model.to_string(),
            dimensions,
            created_at: now,
            updated_at: now,
            categories: BTreeMap::new(),
        }
    }

    pub fn category(&self, name: &str) -> Option<&VectorIndex> {
        self.categories.get(name)
    }

    pub fn total_vectors(&self) -> usize {
        self.categories.values().map(VectorIndex::len).sum()
    }

    /// Metadata and per-category sizes without the vectors
    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            tenant_id: self.tenant_id.clone(),
            embedding_model: self.embedding_model.clone(),
            dimensions: self.dimensions,
            created_at: self.created_at,
            updated_at: self.updated_at,
            category_counts: self
                .categories
                .iter()
                .map(|(name, index)| (name.clone(), index.len()))
                .collect(),
            total_vectors: self.total_vectors(),
        }
    }

    /// Serialize with header
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::internal(format!("Failed to encode index: {}", e)))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Deserialize and verify an artifact read from `path`
    pub fn decode(path: &Path, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::corrupt_index(path, "truncated header"));
        }
        if &bytes[..4] != INDEX_MAGIC {
            return Err(Error::corrupt_index(path, "bad magic"));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != SCHEMA_VERSION {
            return Err(Error::corrupt_index(
                path,
                format!("unsupported schema version {}", version),
            ));
        }

        let (index, _): (TenantIndex, usize) =
            bincode::serde::decode_from_slice(&bytes[HEADER_LEN..], bincode::config::standard())
                .map_err(|e| Error::corrupt_index(path, e.to_string()))?;

        for (name, category) in &index.categories {
            if category.dimensions() != index.dimensions {
                return Err(Error::corrupt_index(
                    path,
                    format!("category '{}' has {} dimensions", name, category.dimensions()),
                ));
            }
            category
                .check_dimensions()
                .map_err(|e| Error::corrupt_index(path, format!("category '{}': {}", name, e)))?;
        }

        Ok(index)
    }
}

/// Lightweight description of a tenant index
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub tenant_id: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category_counts: BTreeMap<String, usize>,
    pub total_vectors: usize,
}

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// A held tenant lock, shared between a lease and its in-flight writes
struct LockHold {
    tenant_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl Drop for LockHold {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Nobody holds or waits on the mutex once only the map refers to it
        self.locks
            .remove_if(self.tenant_id.as_str(), |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Exclusive access to one tenant's artifact; released on drop
pub struct TenantLease {
    tenant_id: String,
    path: PathBuf,
    hold: Arc<LockHold>,
}

impl TenantLease {
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn index_path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for TenantLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantLease")
            .field("tenant_id", &self.tenant_id)
            .field("path", &self.path)
            .finish()
    }
}

/// Index contents computed under a lease and not yet written
#[derive(Debug)]
pub struct PendingWrite {
    index: TenantIndex,
    report: StoreReport,
}

impl PendingWrite {
    pub fn index(&self) -> &TenantIndex {
        &self.index
    }

    pub fn report(&self) -> &StoreReport {
        &self.report
    }
}

/// Directory name for a tenant id
///
/// Ids made of `[A-Za-z0-9_-]` map to themselves. Others are sanitized and
/// suffixed with part of their SHA-256 so distinct ids never share a directory.
pub fn tenant_dir_name(tenant_id: &str) -> Result<String> {
    if tenant_id.trim().is_empty() {
        return Err(Error::InvalidTenant(tenant_id.to_string()));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    if tenant_id.chars().all(allowed) {
        return Ok(tenant_id.to_string());
    }

    let sanitized: String = tenant_id
        .chars()
        .map(|c| if allowed(c) { c } else { '_' })
        .take(MAX_TENANT_DIR_PREFIX)
        .collect();
    let digest = Sha256::digest(tenant_id.as_bytes());
    Ok(format!("{}.{}", sanitized, hex::encode(&digest[..8])))
}

/// Owns every tenant's artifact under one storage root
pub struct TenantStore {
    root: PathBuf,
    file_name: String,
    embedder: Arc<dyn EmbeddingProvider>,
    parallelism: usize,
    locks: Arc<LockMap>,
}

impl TenantStore {
    pub fn new(
        config: &StorageConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        parallelism: usize,
    ) -> Self {
        Self {
            root: config.root.clone(),
            file_name: config.index_file_name.clone(),
            embedder,
            parallelism: parallelism.max(1),
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact location for a tenant
    pub fn index_path(&self, tenant_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(tenant_dir_name(tenant_id)?)
            .join("indices")
            .join(&self.file_name))
    }

    /// Wait for exclusive access to a tenant's artifact
    pub async fn lease(&self, tenant_id: &str) -> Result<TenantLease> {
        let path = self.index_path(tenant_id)?;
        let lock = self
            .locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock_owned().await;
        tracing::debug!("Acquired lease for tenant {}", tenant_id);

        Ok(TenantLease {
            tenant_id: tenant_id.to_string(),
            path,
            hold: Arc::new(LockHold {
                tenant_id: tenant_id.to_string(),
                guard: Some(guard),
                locks: Arc::clone(&self.locks),
            }),
        })
    }

    /// Tenants with a lock currently held or awaited
    pub fn active_tenants(&self) -> usize {
        self.locks.len()
    }

    /// Read the tenant's artifact; `None` when it was never built
    pub async fn load(&self, lease: &TenantLease) -> Result<Option<TenantIndex>> {
        let path = lease.path.clone();
        tokio::task::spawn_blocking(move || read_index(&path)).await?
    }

    /// Read the last committed artifact without waiting for a running writer
    pub async fn snapshot(&self, tenant_id: &str) -> Result<Option<TenantIndex>> {
        let path = self.index_path(tenant_id)?;
        tokio::task::spawn_blocking(move || read_index(&path)).await?
    }

    /// Replace the tenant's artifact with one built from `buckets` only
    pub async fn build(
        &self,
        lease: &TenantLease,
        buckets: &CategoryBuckets,
    ) -> Result<StoreReport> {
        let pending = self.prepare_build(lease, buckets).await?;
        self.commit(lease, pending).await
    }

    /// Append new passages to the tenant's artifact, keeping existing vectors
    ///
    /// Builds a fresh artifact when none exists.
    pub async fn update(
        &self,
        lease: &TenantLease,
        buckets: &CategoryBuckets,
    ) -> Result<StoreReport> {
        let pending = self.prepare_update(lease, buckets).await?;
        self.commit(lease, pending).await
    }

    /// Embed `buckets` into a new index without touching the artifact
    pub async fn prepare_build(
        &self,
        lease: &TenantLease,
        buckets: &CategoryBuckets,
    ) -> Result<PendingWrite> {
        let mut index = TenantIndex::new(
            &lease.tenant_id,
            self.embedder.model(),
            self.embedder.dimensions(),
        );
        let report = self.merge(&mut index, buckets).await?;
        Ok(PendingWrite { index, report })
    }

    /// Merge `buckets` into the current artifact in memory
    pub async fn prepare_update(
        &self,
        lease: &TenantLease,
        buckets: &CategoryBuckets,
    ) -> Result<PendingWrite> {
        let Some(mut index) = self.load(lease).await? else {
            tracing::info!(
                "No existing index for tenant {}, building a new one",
                lease.tenant_id
            );
            return self.prepare_build(lease, buckets).await;
        };

        if index.embedding_model != self.embedder.model() {
            return Err(Error::EmbeddingModelMismatch {
                expected: index.embedding_model,
                found: self.embedder.model().to_string(),
            });
        }
        if index.dimensions != self.embedder.dimensions() {
            return Err(Error::DimensionMismatch {
                expected: index.dimensions,
                found: self.embedder.dimensions(),
            });
        }

        let report = self.merge(&mut index, buckets).await?;
        index.updated_at = Utc::now();
        Ok(PendingWrite { index, report })
    }

    /// Write a prepared index
    ///
    /// The tenant stays locked until the file is in place, even if this
    /// future is dropped first.
    pub async fn commit(&self, lease: &TenantLease, pending: PendingWrite) -> Result<StoreReport> {
        if pending.index.tenant_id != lease.tenant_id {
            return Err(Error::internal(format!(
                "index for tenant {} cannot be written under the lease of {}",
                pending.index.tenant_id, lease.tenant_id
            )));
        }

        self.write(lease, &pending.index).await?;

        let report = pending.report;
        tracing::info!(
            "Wrote index for tenant {}: {} new vectors, {} duplicates skipped, {} total",
            lease.tenant_id,
            report.added.values().sum::<usize>(),
            report.duplicates_skipped,
            report.total_vectors
        );
        Ok(report)
    }

    /// Embed texts not yet in their category and append them
    async fn merge(
        &self,
        index: &mut TenantIndex,
        buckets: &CategoryBuckets,
    ) -> Result<StoreReport> {
        let mut report = StoreReport::default();

        for (_, name, texts) in buckets.iter() {
            if texts.is_empty() {
                tracing::warn!("No passages for category '{}', skipping", name);
                report.empty_categories.push(name.to_string());
                continue;
            }

            let new_texts: Vec<String> = {
                let mut seen: HashSet<&str> = index
                    .category(name)
                    .map(|c| c.entries().iter().map(|e| e.text.as_str()).collect())
                    .unwrap_or_default();
                texts
                    .iter()
                    .filter(|t| seen.insert(t.as_str()))
                    .cloned()
                    .collect()
            };
            report.duplicates_skipped += texts.len() - new_texts.len();

            if new_texts.is_empty() {
                report.added.insert(name.to_string(), 0);
                continue;
            }

            let label = format!("{} passage", name);
            let embeddings =
                embed_all(self.embedder.as_ref(), &new_texts, self.parallelism, &label).await?;

            let dimensions = index.dimensions;
            let category = index
                .categories
                .entry(name.to_string())
                .or_insert_with(|| VectorIndex::new(dimensions));

            let added = new_texts.len();
            for (text, embedding) in new_texts.into_iter().zip(embeddings) {
                category.insert(text, embedding)?;
            }

            tracing::debug!("Indexed {} passages for '{}'", added, name);
            report.added.insert(name.to_string(), added);
        }

        report.total_vectors = index.total_vectors();
        Ok(report)
    }

    async fn write(&self, lease: &TenantLease, index: &TenantIndex) -> Result<()> {
        let path = lease.path.clone();
        let bytes = index.encode()?;
        let hold = Arc::clone(&lease.hold);
        tokio::task::spawn_blocking(move || {
            let _hold = hold;
            write_atomic(&path, &bytes)
        })
        .await?
    }
}

fn read_index(path: &Path) -> Result<Option<TenantIndex>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    TenantIndex::decode(path, &bytes).map(Some)
}

/// Write through a temp file in the same directory, then rename
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::internal(format!("No parent directory for {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
