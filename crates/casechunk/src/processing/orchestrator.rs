//! Resumable parallel batch orchestration

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::config::ProcessingConfig;
use crate::error::{Error, Result};
use crate::ingestion::DocumentPipeline;

use super::discovery::{dedupe, WorkItem};
use super::writer::OutputSink;

/// Requests that a run stop dispatching new files
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after the files currently in flight
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final state of one processed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Completed { chunks: usize },
    Failed { reason: String },
}

/// Called once per finished file, from worker tasks
pub type ProgressFn = Arc<dyn Fn(&str, &FileOutcome) + Send + Sync>;

/// A file that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub filename: String,
    pub reason: String,
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Files processed and committed in this run
    pub completed: usize,
    /// Files that failed in this run
    pub failed: usize,
    /// Files already complete from an earlier run
    pub skipped: usize,
    /// Files never dispatched because the run was stopped
    pub pending: usize,
    /// Records written in this run
    pub chunks_written: usize,
    pub failures: Vec<FileFailure>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Log the summary; failure reasons only at debug level
    pub fn log(&self) {
        tracing::info!(
            "Run finished in {:.1}s: {} completed, {} failed, {} skipped, {} pending, {} chunks written",
            self.elapsed.as_secs_f64(),
            self.completed,
            self.failed,
            self.skipped,
            self.pending,
            self.chunks_written
        );

        if self.cancelled {
            tracing::warn!("Run was stopped early; rerun with resume to process the remaining files");
        }

        for failure in &self.failures {
            tracing::debug!("  failed {}: {}", failure.filename, failure.reason);
        }
    }
}

#[derive(Default)]
struct Tally {
    completed: usize,
    failed: usize,
    chunks_written: usize,
    failures: Vec<FileFailure>,
    fatal: Option<Error>,
}

/// Everything a worker task needs, cloned per task
#[derive(Clone)]
struct WorkerContext {
    pipeline: Arc<DocumentPipeline>,
    sink: Arc<OutputSink>,
    queue: Arc<Mutex<VecDeque<WorkItem>>>,
    tally: Arc<Mutex<Tally>>,
    stop: StopHandle,
    file_timeout: Option<Duration>,
    progress: Option<ProgressFn>,
}

/// Runs the document pipeline over many files with a fixed worker pool.
///
/// Each file's chunks are committed to the [`OutputSink`] as one batch before
/// the worker takes its next file. Whether completed files from an earlier
/// run are skipped is decided by how the sink was opened.
pub struct ResumableOrchestrator {
    pipeline: Arc<DocumentPipeline>,
    sink: Arc<OutputSink>,
    workers: usize,
    file_timeout: Option<Duration>,
    stop: StopHandle,
    progress: Option<ProgressFn>,
}

impl ResumableOrchestrator {
    pub fn new(
        pipeline: Arc<DocumentPipeline>,
        sink: Arc<OutputSink>,
        config: &ProcessingConfig,
    ) -> Self {
        Self {
            pipeline,
            sink,
            workers: config.workers.max(1),
            file_timeout: config.file_timeout(),
            stop: StopHandle::new(),
            progress: None,
        }
    }

    /// Share an externally owned stop handle (e.g. one wired to Ctrl-C)
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Process `files`, skipping those the sink already has.
    ///
    /// Per-file failures are collected in the summary. A fatal error (the
    /// output cannot be written) stops all workers and is returned once the
    /// in-flight files have finished.
    pub async fn run(&self, files: Vec<WorkItem>) -> Result<RunSummary> {
        let start = Instant::now();

        let (skipped, todo): (Vec<WorkItem>, Vec<WorkItem>) = dedupe(files)
            .into_iter()
            .partition(|item| self.sink.is_completed(&item.key));

        for item in &skipped {
            tracing::debug!("Skipping {} (already complete)", item.key);
        }

        let worker_count = self.workers.min(todo.len());
        tracing::info!(
            "Processing {} files with {} workers ({} already complete)",
            todo.len(),
            worker_count,
            skipped.len()
        );

        let ctx = WorkerContext {
            pipeline: self.pipeline.clone(),
            sink: self.sink.clone(),
            queue: Arc::new(Mutex::new(todo.into_iter().collect())),
            tally: Arc::new(Mutex::new(Tally::default())),
            stop: self.stop.clone(),
            file_timeout: self.file_timeout,
            progress: self.progress.clone(),
        };

        let handles: Vec<_> = (0..worker_count)
            .map(|worker_id| tokio::spawn(Self::worker_loop(worker_id, ctx.clone())))
            .collect();

        for result in join_all(handles).await {
            if let Err(e) = result {
                let mut tally = ctx.tally.lock();
                if tally.fatal.is_none() {
                    tally.fatal = Some(Error::internal(format!("worker task failed: {}", e)));
                }
            }
        }

        let pending = ctx.queue.lock().len();
        let mut tally = std::mem::take(&mut *ctx.tally.lock());

        if let Some(fatal) = tally.fatal.take() {
            tracing::error!("Run aborted: {}", fatal);
            return Err(fatal);
        }

        Ok(RunSummary {
            completed: tally.completed,
            failed: tally.failed,
            skipped: skipped.len(),
            pending,
            chunks_written: tally.chunks_written,
            failures: tally.failures,
            cancelled: self.stop.is_stopped(),
            elapsed: start.elapsed(),
        })
    }

    async fn worker_loop(worker_id: usize, ctx: WorkerContext) {
        loop {
            if ctx.stop.is_stopped() {
                tracing::debug!("Worker {} stopping", worker_id);
                break;
            }

            let Some(item) = ctx.queue.lock().pop_front() else {
                break;
            };
            let key = item.key.clone();

            match Self::process_file(&ctx, item).await {
                Ok(chunks) => {
                    tracing::info!("Processed {}: {} chunks", key, chunks);
                    {
                        let mut tally = ctx.tally.lock();
                        tally.completed += 1;
                        tally.chunks_written += chunks;
                    }
                    if let Some(progress) = &ctx.progress {
                        progress(&key, &FileOutcome::Completed { chunks });
                    }
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("Fatal error while committing {}: {}", key, e);
                    {
                        let mut tally = ctx.tally.lock();
                        if tally.fatal.is_none() {
                            tally.fatal = Some(e);
                        }
                    }
                    ctx.stop.stop();
                    break;
                }
                Err(e) => {
                    let reason = e.to_string();
                    tracing::error!("Failed to process {}: {}", key, reason);
                    ctx.sink.record_failure(&key, &reason);
                    {
                        let mut tally = ctx.tally.lock();
                        tally.failed += 1;
                        tally.failures.push(FileFailure {
                            filename: key.clone(),
                            reason: reason.clone(),
                        });
                    }
                    if let Some(progress) = &ctx.progress {
                        progress(&key, &FileOutcome::Failed { reason });
                    }
                }
            }
        }
    }

    /// Run the pipeline for one file and commit its chunks
    async fn process_file(ctx: &WorkerContext, item: WorkItem) -> Result<usize> {
        let key = item.key.clone();
        let started = Instant::now();

        let pipeline = ctx.pipeline.clone();
        let task = tokio::task::spawn_blocking(move || pipeline.process(&item.path, &item.key));

        let joined = match ctx.file_timeout {
            Some(limit) => match timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::error!(
                        "TIMEOUT processing '{}' after {:.1}s (limit: {}s)",
                        key,
                        started.elapsed().as_secs_f64(),
                        limit.as_secs()
                    );
                    return Err(Error::Timeout(limit.as_secs()));
                }
            },
            None => task.await,
        };

        let chunks = joined.map_err(|e| Error::internal(format!("pipeline task failed: {}", e)))??;

        let sink = ctx.sink.clone();
        let output = sink.output_path().display().to_string();
        tokio::task::spawn_blocking(move || sink.commit(&key, &chunks))
            .await
            .map_err(|e| Error::write(output, std::io::Error::other(e.to_string())))?
    }
}
