//! Batch orchestration: discovery, ordering, parallel dispatch, cleanup
//!
//! One [`Pipeline`] value is one batch run over one input directory. No
//! state survives between runs except what is externalized as `.processed`
//! markers, so a crashed or interrupted batch is always safe to re-run.

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::analyzer::ImageAnalyzer;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::locks::{processed_path, LockCoordinator};
use crate::processor::FileProcessor;
use crate::report::ReportGenerator;
use crate::store::VectorStore;
use crate::types::{BatchStatistics, FileKind, ProcessingResult, ProcessingTask};

/// Name of the per-run CSV rollup written into the input directory
pub const CSV_REPORT_NAME: &str = "processing_results.csv";

/// Releases a file lock on every exit path of a worker, panics included
struct LockGuard {
    locks: Arc<LockCoordinator>,
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locks.release(&self.path);
    }
}

/// Batch pipeline over one input directory
pub struct Pipeline {
    input_dir: PathBuf,
    config: PipelineConfig,
    processor: Arc<FileProcessor>,
    locks: Arc<LockCoordinator>,
    verbose: bool,
    signals_installed: AtomicBool,
    signal_task: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Create a pipeline for an input directory.
    ///
    /// Fails fast when the directory does not exist; everything after
    /// construction degrades per file instead of failing the batch.
    pub async fn new(
        input_dir: impl AsRef<Path>,
        config: PipelineConfig,
        store: Arc<dyn VectorStore>,
        analyzer: Arc<dyn ImageAnalyzer>,
    ) -> Result<Self> {
        let input_dir = input_dir.as_ref().to_path_buf();
        if !input_dir.is_dir() {
            return Err(Error::InputDirNotFound(input_dir.display().to_string()));
        }

        let processor = Arc::new(FileProcessor::new(&config, store, analyzer).await?);

        Ok(Self {
            input_dir,
            config,
            processor,
            locks: Arc::new(LockCoordinator::new()),
            verbose: false,
            signals_installed: AtomicBool::new(false),
            signal_task: Mutex::new(None),
        })
    }

    /// Enable per-file lines in the console summary
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn marker_ttl(&self) -> Duration {
        Duration::from_secs(self.config.processing.marker_ttl_secs)
    }

    /// List supported files in the input directory (non-recursive) and
    /// partition them by the presence of a `.processed` marker.
    ///
    /// Returns the tasks still to process and the count already done.
    pub fn discover_files(&self) -> Result<(Vec<ProcessingTask>, usize)> {
        let mut to_process = Vec::new();
        let mut already_processed = 0usize;

        for entry in std::fs::read_dir(&self.input_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if FileKind::from_path(&path) == FileKind::Unsupported {
                continue;
            }
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::warn!("Skipping {:?}: could not stat ({})", path, e);
                    continue;
                }
            };
            if processed_path(&path).exists() {
                already_processed += 1;
                continue;
            }
            to_process.push(ProcessingTask::new(path, size));
        }

        Ok((to_process, already_processed))
    }

    /// Reorder tasks so expensive work starts early and document parsing is
    /// interleaved with lighter image analysis: both groups sorted by
    /// descending size, emitted as one document then up to two images.
    pub fn optimize_processing_order(tasks: Vec<ProcessingTask>) -> Vec<ProcessingTask> {
        let (mut documents, mut images): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .partition(|t| t.kind == FileKind::Document);
        documents.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        images.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));

        let mut documents = documents.into_iter();
        let mut images = images.into_iter();
        let mut ordered = Vec::new();
        loop {
            let mut emitted = false;
            if let Some(doc) = documents.next() {
                ordered.push(doc);
                emitted = true;
            }
            for _ in 0..2 {
                if let Some(image) = images.next() {
                    ordered.push(image);
                    emitted = true;
                }
            }
            if !emitted {
                break;
            }
        }
        ordered
    }

    /// Dispatch tasks across a bounded worker pool and collect results in
    /// completion order. A panicked worker becomes a failure result; it
    /// never aborts the batch.
    pub async fn process_files_parallel(
        &self,
        tasks: Vec<ProcessingTask>,
    ) -> Vec<ProcessingResult> {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.config.processing.batch_size.max(1)));
        let marker_ttl = self.marker_ttl();

        let mut in_flight = FuturesUnordered::new();
        for task in tasks {
            let semaphore = semaphore.clone();
            let locks = self.locks.clone();
            let processor = self.processor.clone();

            in_flight.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore closed");

                if !locks.acquire(&task.path) {
                    tracing::info!("[{}] locked by another process, skipping", task.file_name());
                    return ProcessingResult::skip(
                        &task.path,
                        task.kind,
                        task.size_bytes,
                        "locked by another process",
                    );
                }
                let _lock_guard = LockGuard {
                    locks: locks.clone(),
                    path: task.path.clone(),
                };

                // A concurrent run may have finished this file between
                // discovery and lock acquisition
                if locks.is_recently_processed(&task.path, marker_ttl) {
                    tracing::info!("[{}] recently processed, skipping", task.file_name());
                    return ProcessingResult::skip(
                        &task.path,
                        task.kind,
                        task.size_bytes,
                        "recently processed by another run",
                    );
                }

                let result = processor.process_file_with_retry(&task).await;
                if result.success() {
                    if let Err(e) = ReportGenerator::create_processed_file(&result) {
                        tracing::warn!(
                            "[{}] could not write processed marker: {}",
                            task.file_name(),
                            e
                        );
                    }
                }
                result
            }));
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = in_flight.next().await {
            let result = joined.unwrap_or_else(|e| {
                tracing::error!("Worker task failed: {}", e);
                ProcessingResult::failure(
                    Path::new("<worker>"),
                    FileKind::Unsupported,
                    0,
                    format!("worker task failed: {}", e),
                )
            });
            let status = if result.success() {
                "ok"
            } else if result.skipped {
                "skipped"
            } else {
                "failed"
            };
            tracing::info!(
                "[{}/{}] {} -> {}",
                results.len() + 1,
                total,
                result.file_name,
                status
            );
            results.push(result);
        }
        results
    }

    /// Run one batch: purge stale markers, discover, order, dispatch,
    /// report, clean up. Returns the aggregate statistics.
    pub async fn run(&self) -> Result<BatchStatistics> {
        self.install_signal_handlers();
        self.locks
            .purge_stale_markers(&self.input_dir, self.marker_ttl());

        let (tasks, already_processed) = self.discover_files()?;
        tracing::info!(
            "Discovered {} files to process, {} already processed",
            tasks.len(),
            already_processed
        );

        if tasks.is_empty() {
            let stats = BatchStatistics {
                already_processed,
                ..BatchStatistics::default()
            };
            ReportGenerator::print_summary(&[], &stats, self.verbose);
            self.shutdown().await;
            return Ok(stats);
        }

        let ordered = Self::optimize_processing_order(tasks);
        let results = self.process_files_parallel(ordered).await;

        let csv_path = self.input_dir.join(CSV_REPORT_NAME);
        if let Err(e) = ReportGenerator::create_csv_report(&results, &csv_path) {
            tracing::warn!("Could not write CSV report: {}", e);
        }

        let mut stats = ReportGenerator::aggregate_results(&results);
        stats.already_processed = already_processed;
        ReportGenerator::print_summary(&results, &stats, self.verbose);

        self.shutdown().await;
        Ok(stats)
    }

    /// Install interrupt handlers that remove lock files and release the
    /// processor before exiting. Explicit, not an import-time side effect;
    /// in-flight work is not cancelled.
    fn install_signal_handlers(&self) {
        if self.signals_installed.swap(true, Ordering::SeqCst) {
            return;
        }
        let locks = self.locks.clone();
        let processor = self.processor.clone();

        let handle = tokio::spawn(async move {
            wait_for_interrupt().await;
            tracing::warn!("Interrupt received; removing lock files before exit");
            locks.cleanup_all();
            processor.cleanup().await;
            std::process::exit(130);
        });
        *self.signal_task.lock() = Some(handle);
    }

    /// Remove all locks and release the processor. Called on normal batch
    /// completion; safe to call more than once.
    pub async fn shutdown(&self) {
        self.locks.cleanup_all();
        self.processor.cleanup().await;
        if let Some(handle) = self.signal_task.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.locks.cleanup_all();
        if let Some(handle) = self.signal_task.lock().take() {
            handle.abort();
        }
    }
}

async fn wait_for_interrupt() {
    #[cfg(unix)]
    {
        let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!("Could not install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
