//! Ingestion pipeline: load, segment, classify, index
//!
//! A run moves through `Start -> Loading -> Segmenting -> Classifying ->
//! Indexing -> Done` and ends in `Failed` or `Cancelled` otherwise. Every run
//! returns a [`PipelineOutcome`], including the stages it finished.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::classification::CategoryClassifier;
use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::{FileParser, TextChunker};
use crate::storage::{PendingWrite, TenantLease, TenantStore};
use crate::types::{
    CourseMaterial, FileError, FileType, IngestMode, IngestRequest, IngestStats, OutcomeStatus,
    Passage, PipelineOutcome, PipelineStage, StoreReport,
};

/// Progress of one run, kept outside the run future so it survives cancellation
struct RunProgress {
    run_id: Uuid,
    tenant_id: String,
    mode: IngestMode,
    started: Instant,
    stage: PipelineStage,
    steps_completed: Vec<PipelineStage>,
    stats: IngestStats,
    processed_files: Vec<PathBuf>,
    file_errors: Vec<FileError>,
    store_report: Option<StoreReport>,
}

impl RunProgress {
    fn new(request: &IngestRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tenant_id: request.tenant_id.clone(),
            mode: request.mode,
            started: Instant::now(),
            stage: PipelineStage::Start,
            steps_completed: Vec::new(),
            stats: IngestStats::default(),
            processed_files: Vec::new(),
            file_errors: Vec::new(),
            store_report: None,
        }
    }

    /// Finish the current stage and enter the next
    fn complete_stage(&mut self) {
        if self.stage != PipelineStage::Start {
            self.steps_completed.push(self.stage);
        }
        self.stage = self.stage.next();
        tracing::info!("Run {} [{}]: {}", self.run_id, self.tenant_id, self.stage);
    }

    fn finish(self, status: OutcomeStatus, message: String) -> PipelineOutcome {
        let stage = match status {
            OutcomeStatus::Succeeded => PipelineStage::Done,
            OutcomeStatus::Failed => PipelineStage::Failed,
            OutcomeStatus::Cancelled => PipelineStage::Cancelled,
        };

        PipelineOutcome {
            run_id: self.run_id,
            tenant_id: self.tenant_id,
            mode: self.mode,
            status,
            success: status == OutcomeStatus::Succeeded,
            message,
            stage,
            steps_completed: self.steps_completed,
            stats: self.stats,
            processed_files: self.processed_files,
            file_errors: self.file_errors,
            store_report: self.store_report,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

/// Runs ingestion requests for any tenant
pub struct IngestOrchestrator {
    chunker: TextChunker,
    classifier: Arc<CategoryClassifier>,
    store: Arc<TenantStore>,
    parallel_files: usize,
    timeout: Option<Duration>,
}

impl IngestOrchestrator {
    pub fn new(
        config: &RagConfig,
        classifier: Arc<CategoryClassifier>,
        store: Arc<TenantStore>,
    ) -> Self {
        Self {
            chunker: TextChunker::from_config(&config.chunking),
            classifier,
            store,
            parallel_files: num_cpus::get().min(8),
            timeout: config.processing.ingest_timeout(),
        }
    }

    /// Run one request, cancelled after the configured timeout if any
    pub async fn ingest(&self, request: &IngestRequest) -> PipelineOutcome {
        match self.timeout {
            Some(limit) => self.ingest_until(request, tokio::time::sleep(limit)).await,
            None => self.ingest_until(request, std::future::pending::<()>()).await,
        }
    }

    /// Run one request until it finishes or `cancel` resolves
    ///
    /// `cancel` is honored until the new index is ready to be written. A
    /// cancelled run writes nothing, releases the tenant lease and reports
    /// the stages it completed. Once the write starts it runs to completion
    /// and the outcome reflects it.
    pub async fn ingest_until<C>(&self, request: &IngestRequest, cancel: C) -> PipelineOutcome
    where
        C: Future<Output = ()>,
    {
        let mut progress = RunProgress::new(request);
        tracing::info!(
            "Run {} started for tenant {} ({:?}, {} paths)",
            progress.run_id,
            request.tenant_id,
            request.mode,
            request.paths.len()
        );

        let prepared = {
            let run = self.run(request, &mut progress);
            tokio::pin!(run);
            tokio::pin!(cancel);

            tokio::select! {
                biased;
                _ = &mut cancel => None,
                result = &mut run => Some(result),
            }
        };

        let result = match prepared {
            Some(Ok((lease, pending))) => Some(self.commit(&lease, pending, &mut progress).await),
            Some(Err(e)) => Some(Err(e)),
            None => None,
        };

        let outcome = match result {
            Some(Ok(())) => {
                let message = Self::success_message(&progress);
                progress.finish(OutcomeStatus::Succeeded, message)
            }
            Some(Err(e)) => {
                tracing::error!(
                    "Run {} failed during {}: {}",
                    progress.run_id,
                    progress.stage,
                    e
                );
                let message = format!("{} failed: {}", progress.stage, e);
                progress.finish(OutcomeStatus::Failed, message)
            }
            None => {
                tracing::warn!("Run {} cancelled during {}", progress.run_id, progress.stage);
                let message = format!("Cancelled during {}", progress.stage);
                progress.finish(OutcomeStatus::Cancelled, message)
            }
        };

        tracing::info!(
            "Run {} finished: {:?} in {}ms",
            outcome.run_id,
            outcome.status,
            outcome.elapsed_ms
        );
        outcome
    }

    fn success_message(progress: &RunProgress) -> String {
        let indexed = progress
            .store_report
            .as_ref()
            .map(|r| r.added.values().sum::<usize>())
            .unwrap_or(0);
        format!(
            "Indexed {} passages from {} files ({} failed)",
            indexed,
            progress.stats.file_count,
            progress.file_errors.len()
        )
    }

    /// Everything up to the index write; dropping this future discards the run
    async fn run(
        &self,
        request: &IngestRequest,
        progress: &mut RunProgress,
    ) -> Result<(TenantLease, PendingWrite)> {
        let lease = self.store.lease(&request.tenant_id).await?;

        progress.complete_stage();
        let materials = self.load_materials(request, progress).await;
        if materials.is_empty() {
            return Err(Error::NoMaterials(format!(
                "{} of {} inputs failed to load",
                progress.file_errors.len(),
                request.paths.len()
            )));
        }

        progress.complete_stage();
        let passages: Vec<Passage> = materials
            .iter()
            .flat_map(|m| self.chunker.passages(&m.raw_text))
            .map(|span| Passage::new(span.text.trim()))
            .collect();
        progress.stats.passage_count = passages.len();
        tracing::info!(
            "Segmented {} documents into {} passages",
            materials.len(),
            passages.len()
        );
        drop(materials);

        progress.complete_stage();
        let classified = self.classifier.classify(passages).await?;
        progress.stats.excluded_passages = classified.excluded;
        progress.stats.per_category_chunk_counts = classified.buckets.counts();
        if classified.buckets.is_empty() {
            return Err(Error::NoMaterials(
                "every passage was excluded as a case study".to_string(),
            ));
        }

        progress.complete_stage();
        let pending = match request.mode {
            IngestMode::Fresh => self.store.prepare_build(&lease, &classified.buckets).await?,
            IngestMode::Update => self.store.prepare_update(&lease, &classified.buckets).await?,
        };
        Ok((lease, pending))
    }

    async fn commit(
        &self,
        lease: &TenantLease,
        pending: PendingWrite,
        progress: &mut RunProgress,
    ) -> Result<()> {
        let report = self.store.commit(lease, pending).await?;
        progress.store_report = Some(report);
        progress.complete_stage();
        Ok(())
    }

    /// Load every input file, recording per-file failures
    async fn load_materials(
        &self,
        request: &IngestRequest,
        progress: &mut RunProgress,
    ) -> Vec<CourseMaterial> {
        let files = expand_paths(&request.paths, &mut progress.file_errors);
        tracing::info!("Loading {} files", files.len());

        let results: Vec<(PathBuf, Result<CourseMaterial>)> = stream::iter(files)
            .map(|path| {
                let tenant_id = request.tenant_id.clone();
                async move {
                    let target = path.clone();
                    let result =
                        tokio::task::spawn_blocking(move || FileParser::load(&tenant_id, &target))
                            .await
                            .map_err(Error::from)
                            .and_then(|r| r);
                    (path, result)
                }
            })
            .buffered(self.parallel_files.max(1))
            .collect()
            .await;

        let mut materials = Vec::new();
        for (path, result) in results {
            match result {
                Ok(material) => {
                    progress.stats.file_count += 1;
                    progress.stats.extracted_text_length += material.char_len();
                    progress.processed_files.push(path);
                    materials.push(material);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    progress.file_errors.push(FileError {
                        path,
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
            }
        }
        materials
    }
}

/// Replace directories by their supported files (sorted, not recursive)
///
/// Other paths pass through unchanged so loading reports their errors.
/// Repeated paths are kept once.
fn expand_paths(paths: &[PathBuf], errors: &mut Vec<FileError>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            if seen.insert(path.clone()) {
                files.push(path.clone());
            }
            continue;
        }

        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_supported(entry.path()) => {
                    let file = entry.into_path();
                    if seen.insert(file.clone()) {
                        files.push(file);
                    }
                }
                Ok(entry) => {
                    tracing::debug!("Ignoring {}", entry.path().display());
                }
                Err(e) => {
                    let err = Error::Io(e.into());
                    tracing::warn!("Cannot read {}: {}", path.display(), err);
                    errors.push(FileError {
                        path: path.clone(),
                        kind: err.kind(),
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    files
}

fn is_supported(path: &Path) -> bool {
    FileType::from_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::providers::EmbeddingProvider;
    use crate::storage::TenantIndex;
    use crate::test_support::{
        test_config, write_file, AxisEmbedder, CASE_STUDY_TEXT, PRICING_TEXT, SEGMENTATION_TEXT,
    };

    struct Harness {
        dir: tempfile::TempDir,
        store: Arc<TenantStore>,
        orchestrator: IngestOrchestrator,
    }

    fn harness_with(embedder: AxisEmbedder, configure: impl FnOnce(&mut RagConfig)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir.path().join("tenants"));
        configure(&mut config);

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(embedder);
        let classifier = Arc::new(CategoryClassifier::new(
            Arc::new(config.taxonomy.clone()),
            Arc::clone(&embedder),
            config.classification.clone(),
            2,
        ));
        let store = Arc::new(TenantStore::new(&config.storage, embedder, 2));
        let orchestrator = IngestOrchestrator::new(&config, classifier, Arc::clone(&store));

        Harness {
            dir,
            store,
            orchestrator,
        }
    }

    fn harness() -> Harness {
        harness_with(AxisEmbedder::new(), |_| {})
    }

    impl Harness {
        fn file(&self, name: &str, content: &str) -> PathBuf {
            write_file(self.dir.path(), name, content)
        }

        async fn index(&self, tenant: &str) -> Option<TenantIndex> {
            let lease = self.store.lease(tenant).await.unwrap();
            self.store.load(&lease).await.unwrap()
        }
    }

    fn texts(index: &TenantIndex, category: &str) -> Vec<String> {
        index
            .category(category)
            .map(|c| c.entries().iter().map(|e| e.text.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_fresh_ingest() {
        let h = harness();
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);
        let mix = h.file("mix.txt", PRICING_TEXT);

        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![seg, mix], IngestMode::Fresh))
            .await;

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert_eq!(outcome.stage, PipelineStage::Done);
        assert_eq!(
            outcome.steps_completed,
            vec![
                PipelineStage::Loading,
                PipelineStage::Segmenting,
                PipelineStage::Classifying,
                PipelineStage::Indexing,
            ]
        );
        assert_eq!(outcome.stats.file_count, 2);
        assert_eq!(
            outcome.stats.extracted_text_length,
            SEGMENTATION_TEXT.chars().count() + PRICING_TEXT.chars().count()
        );
        assert_eq!(outcome.stats.passage_count, 2);

        let counts = &outcome.stats.per_category_chunk_counts;
        assert_eq!(counts.len(), 5);
        assert_eq!(counts["Market Segmentation"], 1);
        assert_eq!(counts["Marketing Mix (4Ps)"], 1);
        assert_eq!(counts["Targeting"], 0);

        let report = outcome.store_report.unwrap();
        assert_eq!(report.total_vectors, 2);
        assert_eq!(report.empty_categories.len(), 3);

        let index = h.index("prof_a").await.unwrap();
        assert_eq!(texts(&index, "Market Segmentation"), vec![SEGMENTATION_TEXT]);
        assert_eq!(texts(&index, "Marketing Mix (4Ps)"), vec![PRICING_TEXT]);
    }

    #[tokio::test]
    async fn test_bad_files_are_reported_not_fatal() {
        let h = harness();
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);
        let slides = h.file("slides.pptx", "zip");
        let missing = h.dir.path().join("missing.pdf");

        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new(
                "prof_a",
                vec![seg.clone(), slides, missing],
                IngestMode::Fresh,
            ))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.processed_files, vec![seg]);
        assert_eq!(outcome.file_errors.len(), 2);
        assert!(outcome.file_errors.iter().all(|e| e.kind == ErrorKind::Input));
    }

    #[tokio::test]
    async fn test_no_materials_fails_and_keeps_index() {
        let h = harness();
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);
        h.orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![seg], IngestMode::Fresh))
            .await;

        let blank = h.file("blank.txt", "   \n ");
        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new(
                "prof_a",
                vec![blank, h.dir.path().join("gone.txt")],
                IngestMode::Fresh,
            ))
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.stage, PipelineStage::Failed);
        assert!(outcome.steps_completed.is_empty());
        assert!(outcome.message.contains("No course materials"), "{}", outcome.message);
        assert_eq!(outcome.stats.file_count, 0);
        assert!(outcome.store_report.is_none());

        let index = h.index("prof_a").await.unwrap();
        assert_eq!(texts(&index, "Market Segmentation"), vec![SEGMENTATION_TEXT]);
    }

    #[tokio::test]
    async fn test_only_case_studies_fails_and_keeps_index() {
        let h = harness_with(AxisEmbedder::new(), |config| {
            config.classification.case_study_min_chars = 100;
        });
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);
        let seeded = h
            .orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![seg], IngestMode::Fresh))
            .await;
        assert!(seeded.success, "{}", seeded.message);
        let before = std::fs::read(h.store.index_path("prof_a").unwrap()).unwrap();

        let case = h.file("case.txt", CASE_STUDY_TEXT);
        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![case], IngestMode::Fresh))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.message.contains("case study"), "{}", outcome.message);
        assert_eq!(
            outcome.steps_completed,
            vec![PipelineStage::Loading, PipelineStage::Segmenting]
        );
        assert_eq!(outcome.stats.passage_count, 1);
        assert_eq!(outcome.stats.excluded_passages, 1);
        assert!(outcome.store_report.is_none());

        let after = std::fs::read(h.store.index_path("prof_a").unwrap()).unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_directory_expansion() {
        let h = harness();
        let course = h.dir.path().join("course");
        std::fs::create_dir(&course).unwrap();
        let b = write_file(&course, "b.txt", PRICING_TEXT);
        let a = write_file(&course, "a.txt", SEGMENTATION_TEXT);
        write_file(&course, "readme.md", "ignored");
        std::fs::create_dir(course.join("nested")).unwrap();
        write_file(&course.join("nested"), "c.txt", "targeting");

        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new(
                "prof_a",
                vec![course.clone(), a.clone()],
                IngestMode::Fresh,
            ))
            .await;

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.processed_files, vec![a, b]);
        assert!(outcome.file_errors.is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_and_fresh_replaces() {
        let h = harness();
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);
        let mix = h.file("mix.txt", PRICING_TEXT);

        h.orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![seg.clone()], IngestMode::Fresh))
            .await;
        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new(
                "prof_a",
                vec![mix.clone(), seg],
                IngestMode::Update,
            ))
            .await;

        assert!(outcome.success, "{}", outcome.message);
        let report = outcome.store_report.unwrap();
        assert_eq!(report.duplicates_skipped, 1);
        assert_eq!(report.total_vectors, 2);

        let index = h.index("prof_a").await.unwrap();
        assert_eq!(texts(&index, "Market Segmentation"), vec![SEGMENTATION_TEXT]);
        assert_eq!(texts(&index, "Marketing Mix (4Ps)"), vec![PRICING_TEXT]);

        h.orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![mix], IngestMode::Fresh))
            .await;
        let index = h.index("prof_a").await.unwrap();
        assert!(index.category("Market Segmentation").is_none());
        assert_eq!(index.total_vectors(), 1);
    }

    #[tokio::test]
    async fn test_fresh_rebuild_is_idempotent() {
        let h = harness();
        let seg = h.file("seg.txt", &SEGMENTATION_TEXT.repeat(4));
        let mix = h.file("mix.txt", PRICING_TEXT);
        let request = IngestRequest::new("prof_a", vec![seg, mix], IngestMode::Fresh);

        h.orchestrator.ingest(&request).await;
        let first = h.index("prof_a").await.unwrap();
        h.orchestrator.ingest(&request).await;
        let second = h.index("prof_a").await.unwrap();

        assert_eq!(first.categories, second.categories);
        assert!(first.total_vectors() > 2);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let h = harness();
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);
        let mix = h.file("mix.txt", PRICING_TEXT);

        let request_a = IngestRequest::new("prof_a", vec![seg], IngestMode::Fresh);
        let request_b = IngestRequest::new("prof_b", vec![mix], IngestMode::Fresh);
        let (a, b) = tokio::join!(
            h.orchestrator.ingest(&request_a),
            h.orchestrator.ingest(&request_b),
        );
        assert!(a.success && b.success);

        let index_a = h.index("prof_a").await.unwrap();
        let index_b = h.index("prof_b").await.unwrap();
        assert!(index_a.category("Marketing Mix (4Ps)").is_none());
        assert!(index_b.category("Market Segmentation").is_none());
    }

    #[tokio::test]
    async fn test_embedding_failure_fails_run() {
        let h = harness_with(AxisEmbedder::failing_on("Pricing"), |_| {});
        let mix = h.file("mix.txt", PRICING_TEXT);

        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![mix], IngestMode::Fresh))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(
            outcome.steps_completed,
            vec![PipelineStage::Loading, PipelineStage::Segmenting]
        );
        assert!(outcome.message.contains("passage #0"), "{}", outcome.message);
        assert!(h.index("prof_a").await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_reports_progress_and_releases_lease() {
        let h = harness_with(AxisEmbedder::stalling_on("Pricing"), |config| {
            config.processing.ingest_timeout_secs = Some(1);
        });
        let mix = h.file("mix.txt", PRICING_TEXT);

        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![mix], IngestMode::Fresh))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Cancelled);
        assert_eq!(outcome.stage, PipelineStage::Cancelled);
        assert!(!outcome.success);
        assert_eq!(
            outcome.steps_completed,
            vec![PipelineStage::Loading, PipelineStage::Segmenting]
        );
        assert_eq!(outcome.stats.passage_count, 1);

        let lease = tokio::time::timeout(Duration::from_secs(1), h.store.lease("prof_a")).await;
        assert!(lease.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_while_indexing_writes_nothing() {
        // A fresh run makes 7 embedding calls: 5 categories, 1 passage, 1 index entry.
        // The update below stalls on its index entry, after its passage call.
        let h = harness_with(AxisEmbedder::stalling_after(8), |config| {
            config.processing.ingest_timeout_secs = Some(1);
        });
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);
        let mix = h.file("mix.txt", PRICING_TEXT);

        let seeded = h
            .orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![seg], IngestMode::Fresh))
            .await;
        assert!(seeded.success, "{}", seeded.message);

        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new("prof_a", vec![mix], IngestMode::Update))
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Cancelled);
        assert_eq!(outcome.message, "Cancelled during indexing");
        assert_eq!(
            outcome.steps_completed,
            vec![
                PipelineStage::Loading,
                PipelineStage::Segmenting,
                PipelineStage::Classifying,
            ]
        );
        assert!(outcome.store_report.is_none());

        let lease = tokio::time::timeout(Duration::from_secs(1), h.store.lease("prof_a"))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let index = h.store.load(&lease).await.unwrap().unwrap();
        assert_eq!(index.total_vectors(), 1);
        assert_eq!(texts(&index, "Market Segmentation"), vec![SEGMENTATION_TEXT]);
    }

    #[tokio::test]
    async fn test_ingest_runs_on_spawned_task() {
        let h = harness();
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);
        let orchestrator = Arc::new(h.orchestrator);

        let outcome = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move {
                let request = IngestRequest::new("prof_a", vec![seg], IngestMode::Fresh);
                orchestrator.ingest(&request).await
            }
        })
        .await
        .unwrap();

        assert!(outcome.success, "{}", outcome.message);
        assert!(h.store.index_path("prof_a").unwrap().exists());
    }

    #[tokio::test]
    async fn test_cancel_signal() {
        let h = harness();
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);

        let outcome = h
            .orchestrator
            .ingest_until(
                &IngestRequest::new("prof_a", vec![seg], IngestMode::Fresh),
                std::future::ready(()),
            )
            .await;

        assert_eq!(outcome.status, OutcomeStatus::Cancelled);
        assert!(outcome.steps_completed.is_empty());
        assert!(h.index("prof_a").await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_tenant_fails() {
        let h = harness();
        let seg = h.file("seg.txt", SEGMENTATION_TEXT);

        let outcome = h
            .orchestrator
            .ingest(&IngestRequest::new("  ", vec![seg], IngestMode::Fresh))
            .await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.message.contains("Invalid tenant"));
    }
}
