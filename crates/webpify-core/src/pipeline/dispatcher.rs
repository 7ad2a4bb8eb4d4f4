//! Bounded worker pool driving the codec.
//!
//! Tasks flow through a bounded `async-channel` queue into exactly
//! `workers` tokio tasks. Each worker runs the codec on the blocking pool
//! under a per-file timeout and sends one outcome per task to a single
//! collector, which feeds the [`ResultAggregator`].
//!
//! A timed-out blocking job cannot be stopped, only abandoned. Blocking jobs
//! hold a permit from a shared semaphore until they really end, so at most
//! `workers * (1 + ABANDONED_PER_WORKER)` codec calls ever run at once.

use std::any::Any;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use super::aggregator::ResultAggregator;
use super::writer;
use crate::codec::{EncodeOptions, ImageCodec};
use crate::config::{Config, ThumbSize};
use crate::error::ConversionError;
use crate::types::{ConversionOutcome, ConversionTask};

/// Abandoned (timed-out, still running) jobs tolerated per worker.
pub const ABANDONED_PER_WORKER: usize = 1;

/// Settings for a dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Number of workers, at least 1
    pub workers: usize,
    /// Capacity of the task and outcome queues
    pub queue_size: usize,
    /// Time budget for one file (convert, thumbnail and commit)
    pub file_timeout: Duration,
    pub encode: EncodeOptions,
    pub thumb_size: ThumbSize,
}

impl DispatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.max_workers,
            queue_size: config.queue_size,
            file_timeout: config.file_timeout(),
            encode: config.encode_options(),
            thumb_size: config.thumb_size,
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_size: 64,
            file_timeout: Duration::from_secs(300),
            encode: EncodeOptions::default(),
            thumb_size: ThumbSize::default(),
        }
    }
}

/// How a dispatch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Tasks handed to a worker (each produced exactly one outcome)
    pub completed: usize,
    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
}

/// Fans tasks out to the codec and funnels outcomes back.
pub struct Dispatcher {
    codec: Arc<dyn ImageCodec>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(codec: Arc<dyn ImageCodec>, options: DispatchOptions) -> Self {
        Self { codec, options }
    }

    /// Run every task, recording each outcome in `aggregator`.
    ///
    /// `on_outcome` is called after each outcome has been recorded. On
    /// cancellation no new task is started; tasks already running finish
    /// and are recorded, queued ones produce no outcome.
    pub async fn run<F>(
        &self,
        tasks: Vec<ConversionTask>,
        aggregator: Arc<ResultAggregator>,
        cancel: CancellationToken,
        on_outcome: F,
    ) -> DispatchSummary
    where
        F: Fn(&ConversionOutcome) + Send + Sync + 'static,
    {
        let workers = self.options.workers.max(1);
        let queue_size = self.options.queue_size.max(1);
        let (task_tx, task_rx) = async_channel::bounded::<ConversionTask>(queue_size);
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<ConversionOutcome>(queue_size);

        tracing::debug!(tasks = tasks.len(), workers, "Starting dispatch");

        let slots = Arc::new(Semaphore::new(workers * (1 + ABANDONED_PER_WORKER)));
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker {
                id,
                codec: self.codec.clone(),
                options: self.options.clone(),
                slots: slots.clone(),
            };
            let rx = task_rx.clone();
            let tx = outcome_tx.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move { worker.run(rx, tx, cancel).await }));
        }
        drop(task_rx);
        drop(outcome_tx);

        let collector = tokio::spawn(async move {
            let mut completed = 0usize;
            while let Some(outcome) = outcome_rx.recv().await {
                aggregator.record(&outcome);
                on_outcome(&outcome);
                completed += 1;
            }
            completed
        });

        for task in tasks {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = task_tx.send(task) => {
                    if sent.is_err() {
                        tracing::warn!("All workers exited before the queue drained");
                        break;
                    }
                }
            }
        }
        task_tx.close();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {e}");
            }
        }
        let completed = match collector.await {
            Ok(completed) => completed,
            Err(e) => {
                tracing::error!("Outcome collector failed: {e}");
                0
            }
        };

        let cancelled = cancel.is_cancelled();
        if cancelled {
            tracing::warn!(completed, "Dispatch cancelled");
        }
        DispatchSummary {
            completed,
            cancelled,
        }
    }
}

struct Worker {
    id: usize,
    codec: Arc<dyn ImageCodec>,
    options: DispatchOptions,
    /// Shared by every blocking job, released when the job really ends
    slots: Arc<Semaphore>,
}

impl Worker {
    async fn run(
        self,
        tasks: async_channel::Receiver<ConversionTask>,
        outcomes: mpsc::Sender<ConversionOutcome>,
        cancel: CancellationToken,
    ) {
        loop {
            let task = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = tasks.recv() => match next {
                    Ok(task) => task,
                    Err(_) => break,
                },
            };

            let outcome = self.process(task).await;
            if outcomes.send(outcome).await.is_err() {
                tracing::error!(worker = self.id, "Outcome channel closed");
                break;
            }
        }
        tracing::trace!(worker = self.id, "Worker finished");
    }

    /// Convert one task. Never fails: every error becomes a `Failed` outcome.
    async fn process(&self, task: ConversionTask) -> ConversionOutcome {
        let started = Instant::now();
        let source = task.source_path.clone();
        let original_size = tokio::fs::metadata(&source)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let permit = match self.slots.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(
                    worker = self.id,
                    path = %source.display(),
                    "Timed-out conversions are still running; waiting for a free slot"
                );
                self.slots.clone().acquire_owned().await.ok()
            }
        };

        let state = Arc::new(JobState::default());
        let job = {
            let codec = self.codec.clone();
            let encode = self.options.encode;
            let thumb_size = self.options.thumb_size;
            let state = state.clone();
            move || {
                let result = convert_blocking(codec.as_ref(), &task, &encode, thumb_size, &state);
                drop(permit);
                result
            }
        };

        let mut handle = tokio::task::spawn_blocking(job);
        let joined = match tokio::time::timeout(self.options.file_timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) if state.abandon() => {
                // The blocking job keeps running but can no longer commit
                let error = ConversionError::Timeout {
                    path: source.clone(),
                    timeout_secs: self.options.file_timeout.as_secs(),
                };
                return ConversionOutcome::failed(source, original_size, error, started.elapsed());
            }
            // Already committing; the outputs are on disk or about to be
            Err(_) => handle.await,
        };

        outcome_from(joined, source, original_size, started)
    }
}

fn outcome_from(
    joined: Result<Result<Written, ConversionError>, JoinError>,
    source: std::path::PathBuf,
    original_size: u64,
    started: Instant,
) -> ConversionOutcome {
    match joined {
        Ok(Ok(written)) => ConversionOutcome::converted(
            source,
            written.original_size,
            written.webp_bytes,
            written.thumb_bytes,
            started.elapsed(),
        ),
        Ok(Err(e)) => ConversionOutcome::failed(source, original_size, e, started.elapsed()),
        Err(join_error) => {
            let message = if join_error.is_panic() {
                panic_message(join_error.into_panic())
            } else {
                join_error.to_string()
            };
            let error = ConversionError::Panicked {
                path: source.clone(),
                message,
            };
            ConversionOutcome::failed(source, original_size, error, started.elapsed())
        }
    }
}

/// Who owns the outputs of a job: the job itself once it starts
/// committing, or nobody once the worker gave up waiting.
#[derive(Debug, Default)]
struct JobState(AtomicU8);

impl JobState {
    const RUNNING: u8 = 0;
    const COMMITTING: u8 = 1;
    const ABANDONED: u8 = 2;

    /// Claim the right to write outputs. False if already abandoned.
    fn begin_commit(&self) -> bool {
        self.0
            .compare_exchange(Self::RUNNING, Self::COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give up on the job. False if it is already committing.
    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(Self::RUNNING, Self::ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Debug)]
struct Written {
    original_size: u64,
    webp_bytes: u64,
    thumb_bytes: u64,
}

fn convert_blocking(
    codec: &dyn ImageCodec,
    task: &ConversionTask,
    encode: &EncodeOptions,
    thumb_size: ThumbSize,
    state: &JobState,
) -> Result<Written, ConversionError> {
    let source: &Path = &task.source_path;
    let image = codec.convert(source, encode)?;
    let thumb = codec.thumbnail(source, thumb_size, encode)?;

    if !state.begin_commit() {
        tracing::debug!("Discarding late result for {}", source.display());
        return Err(ConversionError::Abandoned(source.to_path_buf()));
    }

    let (webp_bytes, thumb_bytes) = writer::commit_outputs(task, &image.data, &thumb)?;
    Ok(Written {
        original_size: image.original_size,
        webp_bytes,
        thumb_bytes,
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
