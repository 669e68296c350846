//! Job Orchestrator: owns the worker pool, the batch/job state table, and
//! the cancellation hierarchy. Wires the Probe Driver, Quality Metrics
//! Pipeline, HLS Analyzer, Report Aggregator, Storage, and AI Commentary
//! Adapter into complete per-item processing pipelines.

mod cancel;
mod cleanup;
mod pool;
mod sync_ext;

pub use cancel::CancellationTree;
pub use cleanup::CleanupRegistry;
pub use pool::WorkerPool;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::commentary::{self, CommentaryConfig};
use crate::domain::{Analysis, AnalysisStatus, BatchJob, BatchJobStatus, HlsAnalysis, Id, MetricType, ProgressEvent};
use crate::error::{AppError, AppResult};
use crate::hls::{self, HlsOptions};
use crate::metrics::{self, MetricsConfig, QualityResult};
use crate::probe::{ProbeDriver, ProbeOptions};
use crate::progress::ProgressBus;
use crate::report::{self, redact_error_for_client, ReportOverlay};
use crate::storage::Storage;

use sync_ext::MutexExt;

/// Orchestrator-level limits, a narrowed view of [`crate::config::AppConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorLimits {
    pub max_batch_items: usize,
    pub max_concurrent_workers: usize,
    pub shutdown_grace_period: Duration,
}

/// One item of a batch submission: a freshly-minted `pending` analysis, the
/// probe options to run against it, and (for uploads and URL downloads) the
/// temp path to guarantee cleanup of.
pub struct BatchItemSpec {
    pub analysis: Analysis,
    pub options: ProbeOptions,
    pub temp_path: Option<PathBuf>,
    pub include_llm: bool,
}

pub struct JobOrchestrator {
    limits: OrchestratorLimits,
    driver: ProbeDriver,
    metrics_config: MetricsConfig,
    commentary_config: CommentaryConfig,
    progress: Arc<ProgressBus>,
    storage: Arc<dyn Storage>,
    pool: WorkerPool,
    batches: Arc<Mutex<HashMap<Id, BatchJob>>>,
    cancellation: Arc<CancellationTree>,
}

impl JobOrchestrator {
    pub fn new(
        limits: OrchestratorLimits,
        driver: ProbeDriver,
        metrics_config: MetricsConfig,
        commentary_config: CommentaryConfig,
        progress: Arc<ProgressBus>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let worker_count = limits.max_concurrent_workers.clamp(1, 100);
        Self {
            pool: WorkerPool::new(worker_count, "qc-worker"),
            limits,
            driver,
            metrics_config,
            commentary_config,
            progress,
            storage,
            batches: Arc::new(Mutex::new(HashMap::new())),
            cancellation: Arc::new(CancellationTree::new()),
        }
    }

    /// Runs a single probe analysis to completion and returns the finished
    /// record. The HTTP layer awaits this directly for `/probe/file` and
    /// `/probe/url`.
    pub async fn submit_single(
        &self,
        analysis: Analysis,
        options: ProbeOptions,
        temp_path: Option<PathBuf>,
        include_llm: bool,
        timeout: Option<Duration>,
    ) -> AppResult<Analysis> {
        let job_id = analysis.id;
        self.storage.create_analysis(analysis.clone()).await?;
        self.progress.publish(ProgressEvent::new(job_id, 0.0, "processing", "starting probe"));

        let (tx, rx) = oneshot::channel();
        let driver = self.driver.clone();
        let handle = Handle::current();
        let commentary_config = self.commentary_config.clone();
        let storage = self.storage.clone();
        let cancel = self.cancellation.standalone_item_token();

        self.pool.submit(Box::new(move || {
            let result = process_probe_item(
                &driver,
                &handle,
                &commentary_config,
                &storage,
                analysis,
                &options,
                temp_path.as_deref(),
                include_llm,
                timeout,
                &cancel,
            );
            let _ = tx.send(result);
        }));

        let analysis = rx
            .await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("probe worker dropped without a result")))?;

        let (progress, status) = terminal_progress(&analysis);
        self.progress.publish(ProgressEvent::new(job_id, progress, status, status));
        self.progress.close(job_id);
        Ok(analysis)
    }

    /// Admits a batch, fans its items out across the worker pool, and
    /// returns the batch id immediately; callers poll `batch_status` or
    /// subscribe to the Progress Bus for completion.
    pub async fn submit_batch(&self, items: Vec<BatchItemSpec>) -> AppResult<Id> {
        if items.is_empty() {
            return Err(AppError::Validation("batch must contain at least one item".to_string()));
        }
        if items.len() > self.limits.max_batch_items {
            return Err(AppError::Validation(format!(
                "batch of {} items exceeds the configured maximum of {}",
                items.len(),
                self.limits.max_batch_items
            )));
        }

        let batch = BatchJob::new(items.len());
        let batch_id = batch.id;
        self.batches.lock_unpoisoned().insert(batch_id, batch);

        let handle = Handle::current();

        for item in items {
            self.storage.create_analysis(item.analysis.clone()).await?;

            let driver = self.driver.clone();
            let handle = handle.clone();
            let commentary_config = self.commentary_config.clone();
            let storage = self.storage.clone();
            let progress = self.progress.clone();
            let batches = self.batches.clone();
            let cancellation = self.cancellation.clone();
            let item_token = self.cancellation.item_token(batch_id);

            self.pool.submit(Box::new(move || {
                let result = process_probe_item(
                    &driver,
                    &handle,
                    &commentary_config,
                    &storage,
                    item.analysis,
                    &item.options,
                    item.temp_path.as_deref(),
                    item.include_llm,
                    None,
                    &item_token,
                );
                record_batch_item(&batches, &progress, &cancellation, batch_id, result);
            }));
        }

        Ok(batch_id)
    }

    pub fn batch_status(&self, batch_id: Id) -> AppResult<BatchJob> {
        self.batches
            .lock_unpoisoned()
            .get(&batch_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(batch_id.to_string()))
    }

    /// Cancels a batch and every item beneath it. Already-completed items
    /// keep their recorded results; unstarted and in-flight items observe
    /// the cancellation at their next suspension point.
    pub fn cancel_batch(&self, batch_id: Id) -> AppResult<()> {
        let (progress_pct, status) = {
            let mut guard = self.batches.lock_unpoisoned();
            let job = guard.get_mut(&batch_id).ok_or_else(|| AppError::NotFound(batch_id.to_string()))?;
            job.cancel();
            (job.progress_percent(), job.status)
        };

        self.cancellation.cancel_batch(batch_id);
        self.progress
            .publish(ProgressEvent::new(batch_id, progress_pct, batch_status_label(status), "batch cancelled"));
        self.progress.close(batch_id);
        self.cancellation.forget_batch(batch_id);
        Ok(())
    }

    /// Direct, unbatched entry point into the Quality Metrics Pipeline.
    /// Callers on the async HTTP layer should run this via
    /// `tokio::task::spawn_blocking`, since each metric pass blocks on a
    /// renderer subprocess.
    pub fn compare_quality(&self, reference: &std::path::Path, distorted: &std::path::Path, metric_types: &[MetricType]) -> Vec<QualityResult> {
        let cancel = self.cancellation.standalone_item_token();
        metrics::analyze_quality(&self.driver, reference, distorted, metric_types, &self.metrics_config, &cancel)
    }

    /// Direct, unbatched entry point into the HLS Analyzer.
    pub async fn analyze_hls_request(&self, analysis_id: Id, manifest_ref: &str, options: &HlsOptions) -> AppResult<HlsAnalysis> {
        let cancel = self.cancellation.standalone_item_token();
        hls::analyze_hls(analysis_id, manifest_ref, options, &self.driver, &cancel).await
    }

    /// Cancels the root token (cascading to every batch and item) and waits
    /// up to the configured grace period for in-flight work to drain before
    /// joining the worker pool. Workers still blocked on a subprocess past
    /// the grace period have their processes force-killed rather than left
    /// to join indefinitely.
    pub async fn shutdown(self) {
        self.cancellation.cancel_all();
        let deadline = self.limits.shutdown_grace_period;
        let pool = self.pool;
        let processes = self.driver.active_processes().clone();
        tokio::task::spawn_blocking(move || {
            pool.shutdown_with_deadline(deadline, move || {
                tracing::warn!("worker pool did not drain within the shutdown grace period, killing stragglers");
                processes.kill_all();
            });
        })
        .await
        .expect("worker pool shutdown task panicked");
    }
}

fn terminal_progress(analysis: &Analysis) -> (f64, &'static str) {
    if analysis.status == AnalysisStatus::Completed {
        (100.0, "completed")
    } else {
        (100.0, "failed")
    }
}

fn batch_status_label(status: BatchJobStatus) -> &'static str {
    match status {
        BatchJobStatus::Processing => "processing",
        BatchJobStatus::Completed => "completed",
        BatchJobStatus::Cancelled => "cancelled",
    }
}

/// Runs one item's full pipeline: cancellation check, probe, optional
/// commentary, persistence. Every temp path supplied is tracked in a scoped
/// [`CleanupRegistry`] that is removed on every exit path, including a panic
/// unwinding through this frame (the worker pool's `catch_unwind` boundary
/// sits above this call, so `Drop` still runs first).
fn process_probe_item(
    driver: &ProbeDriver,
    handle: &Handle,
    commentary_config: &CommentaryConfig,
    storage: &Arc<dyn Storage>,
    mut analysis: Analysis,
    options: &ProbeOptions,
    temp_path: Option<&std::path::Path>,
    include_llm: bool,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Analysis {
    let cleanup = CleanupRegistry::new();
    if let Some(path) = temp_path {
        cleanup.track(path);
    }

    if cancel.is_cancelled() {
        analysis.mark_failed("cancelled".to_string());
        let _ = handle.block_on(storage.update_status(analysis.id, analysis.status, analysis.error.clone()));
        return analysis;
    }

    analysis.mark_processing();

    match driver.probe(&analysis.source_ref, options, timeout, cancel) {
        Ok(probe_data) => {
            let overlay = ReportOverlay { probe_data: Some(probe_data), ..Default::default() };
            report::merge(&mut analysis, &overlay);
            analysis.status = AnalysisStatus::Completed;
            analysis.error = None;
            analysis.processed_at = Some(chrono::Utc::now());

            if include_llm {
                let probe_json = serde_json::to_value(&analysis.probe_data).unwrap_or(serde_json::Value::Null);
                let file_name = analysis.file_name.clone();
                let commentary =
                    handle.block_on(commentary::generate_commentary(&file_name, &probe_json, commentary_config));
                if let Some(text) = commentary {
                    let overlay = ReportOverlay { commentary: Some(text), ..Default::default() };
                    report::merge(&mut analysis, &overlay);
                }
            }
        }
        Err(e) => analysis.mark_failed(redact_error_for_client(&e.to_string())),
    }

    let _ = handle.block_on(storage.save(analysis.clone()));
    analysis
}

/// Records one batch item's outcome under the batch table's lock, publishes
/// the updated batch-level progress, and tears down batch bookkeeping once
/// every item has landed.
fn record_batch_item(
    batches: &Arc<Mutex<HashMap<Id, BatchJob>>>,
    progress: &Arc<ProgressBus>,
    cancellation: &Arc<CancellationTree>,
    batch_id: Id,
    result: Analysis,
) {
    let succeeded = result.status == AnalysisStatus::Completed;
    let file_name = result.file_name.clone();

    let (progress_pct, status) = {
        let mut guard = batches.lock_unpoisoned();
        match guard.get_mut(&batch_id) {
            Some(job) => {
                if job.status == BatchJobStatus::Processing {
                    job.record_result(&result, succeeded);
                }
                (job.progress_percent(), job.status)
            }
            None => (100.0, BatchJobStatus::Completed),
        }
    };

    progress.publish(ProgressEvent::new(
        batch_id,
        progress_pct,
        batch_status_label(status),
        format!("{file_name} processed"),
    ));

    if status == BatchJobStatus::Completed {
        progress.close(batch_id);
        cancellation.forget_batch(batch_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceType;
    use crate::storage::InMemoryStorage;
    use std::path::PathBuf;

    fn test_orchestrator() -> JobOrchestrator {
        JobOrchestrator::new(
            OrchestratorLimits {
                max_batch_items: 100,
                max_concurrent_workers: 2,
                shutdown_grace_period: Duration::from_secs(1),
            },
            ProbeDriver::new(PathBuf::from("/no/such/probe-binary"), PathBuf::from("/no/such/renderer")),
            MetricsConfig::default(),
            CommentaryConfig::default(),
            Arc::new(ProgressBus::new()),
            Arc::new(InMemoryStorage::new()),
        )
    }

    #[tokio::test]
    async fn submit_single_runs_probe_and_marks_failed_on_missing_binary() {
        let orchestrator = test_orchestrator();
        let analysis = Analysis::new("clip.mp4".into(), "clip.mp4".into(), SourceType::Local);
        let result = orchestrator
            .submit_single(analysis, ProbeOptions::default_survey(), None, false, None)
            .await
            .unwrap();
        assert_eq!(result.status, AnalysisStatus::Failed);
    }

    #[tokio::test]
    async fn batch_over_limit_is_rejected() {
        let orchestrator = JobOrchestrator::new(
            OrchestratorLimits {
                max_batch_items: 1,
                max_concurrent_workers: 2,
                shutdown_grace_period: Duration::from_secs(1),
            },
            ProbeDriver::new(PathBuf::from("/bin/true"), PathBuf::from("/bin/true")),
            MetricsConfig::default(),
            CommentaryConfig::default(),
            Arc::new(ProgressBus::new()),
            Arc::new(InMemoryStorage::new()),
        );
        let items = vec![
            BatchItemSpec {
                analysis: Analysis::new("a.mp4".into(), "a.mp4".into(), SourceType::Local),
                options: ProbeOptions::default_survey(),
                temp_path: None,
                include_llm: false,
            },
            BatchItemSpec {
                analysis: Analysis::new("b.mp4".into(), "b.mp4".into(), SourceType::Local),
                options: ProbeOptions::default_survey(),
                temp_path: None,
                include_llm: false,
            },
        ];
        let err = orchestrator.submit_batch(items).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn batch_completes_and_reports_progress() {
        let orchestrator = test_orchestrator();
        let items = vec![
            BatchItemSpec {
                analysis: Analysis::new("a.mp4".into(), "a.mp4".into(), SourceType::Local),
                options: ProbeOptions::default_survey(),
                temp_path: None,
                include_llm: false,
            },
            BatchItemSpec {
                analysis: Analysis::new("b.mp4".into(), "b.mp4".into(), SourceType::Local),
                options: ProbeOptions::default_survey(),
                temp_path: None,
                include_llm: false,
            },
        ];
        let batch_id = orchestrator.submit_batch(items).await.unwrap();

        let mut job = orchestrator.batch_status(batch_id).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while job.status == BatchJobStatus::Processing && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
            job = orchestrator.batch_status(batch_id).unwrap();
        }

        assert_eq!(job.status, BatchJobStatus::Completed);
        assert_eq!(job.failed, 2);
        assert!(job.invariants_hold());
    }

    #[tokio::test]
    async fn cancelling_an_unknown_batch_is_not_found() {
        let orchestrator = test_orchestrator();
        let err = orchestrator.cancel_batch(crate::domain::new_id()).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn temp_path_is_removed_after_a_single_job_runs() {
        let orchestrator = test_orchestrator();
        let dir = tempfile::tempdir().unwrap();
        let temp_file = dir.path().join("upload.mp4");
        std::fs::write(&temp_file, b"data").unwrap();

        let analysis = Analysis::new("upload.mp4".into(), temp_file.to_string_lossy().to_string(), SourceType::Local);
        let _ = orchestrator
            .submit_single(analysis, ProbeOptions::default_survey(), Some(temp_file.clone()), false, None)
            .await
            .unwrap();

        assert!(!temp_file.exists());
    }
}
