//! Batch orchestration from input folder to report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::aggregator::ResultAggregator;
use super::discovery::FileDiscovery;
use super::dispatcher::{DispatchOptions, Dispatcher};
use super::plan::{plan_tasks, PlanRoots};
use super::staleness::{decide, Decision};
use crate::codec::ImageCodec;
use crate::config::Config;
use crate::error::Result;
use crate::report::{write_failed_list, BatchSummary};
use crate::types::{AggregateStats, ConversionOutcome, ConversionTask, FailureRecord};

/// Final result of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub stats: AggregateStats,
    pub failures: Vec<FailureRecord>,
    pub summary: BatchSummary,
    /// Sources discovered for this run
    pub planned: usize,
    /// The run was interrupted; some planned files have no outcome
    pub cancelled: bool,
}

impl BatchReport {
    /// False iff any file failed.
    pub fn succeeded(&self) -> bool {
        self.stats.files_failed == 0
    }
}

/// Work decided up front, before any worker starts.
#[derive(Debug)]
pub struct PreparedBatch {
    /// Tasks that need the codec
    pub tasks: Vec<ConversionTask>,
    /// Outcomes settled without the codec (skips and collisions)
    pub settled: Vec<ConversionOutcome>,
    started: Instant,
}

impl PreparedBatch {
    /// Number of sources, each of which will produce one outcome.
    pub fn planned(&self) -> usize {
        self.tasks.len() + self.settled.len()
    }
}

/// Converts an input folder according to a [`Config`].
pub struct BatchConverter {
    config: Config,
    codec: Arc<dyn ImageCodec>,
}

impl BatchConverter {
    /// `config` is expected to be validated.
    pub fn new(config: Config, codec: Arc<dyn ImageCodec>) -> Self {
        Self { config, codec }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole batch.
    pub async fn run(&self, cancel: CancellationToken) -> Result<BatchReport> {
        self.run_with_progress(cancel, |_| {}).await
    }

    /// Run the whole batch, calling `on_outcome` for every recorded outcome.
    pub async fn run_with_progress<F>(
        &self,
        cancel: CancellationToken,
        on_outcome: F,
    ) -> Result<BatchReport>
    where
        F: Fn(&ConversionOutcome) + Send + Sync + 'static,
    {
        let prepared = self.prepare()?;
        Ok(self.execute(prepared, cancel, on_outcome).await)
    }

    /// Create output folders, discover sources and decide what to convert.
    ///
    /// Errors here are fatal to the batch; nothing has been converted yet.
    pub fn prepare(&self) -> Result<PreparedBatch> {
        let started = Instant::now();
        let config = &self.config;

        std::fs::create_dir_all(&config.output_webp_folder)?;
        std::fs::create_dir_all(&config.output_thumb_folder)?;

        tracing::info!(
            input = %config.input_folder.display(),
            webp = %config.output_webp_folder.display(),
            thumbs = %config.output_thumb_folder.display(),
            "Starting conversion"
        );

        let discovery = FileDiscovery::new(config.recursive)
            .exclude(&config.output_webp_folder)
            .exclude(&config.output_thumb_folder);
        let sources: Vec<PathBuf> = discovery.walk(&config.input_folder)?.collect();

        let plan = plan_tasks(
            sources,
            PlanRoots {
                input: &config.input_folder,
                webp: &config.output_webp_folder,
                thumbs: &config.output_thumb_folder,
            },
        );

        let mut settled = plan.collisions;
        let mut tasks = Vec::with_capacity(plan.tasks.len());
        for task in plan.tasks {
            match decide(&task, config.skip_existing) {
                Decision::Convert => tasks.push(task),
                Decision::Skip {
                    webp_bytes,
                    thumb_bytes,
                } => {
                    let original = std::fs::metadata(&task.source_path)
                        .map(|m| m.len())
                        .unwrap_or(0);
                    settled.push(ConversionOutcome::skipped(
                        task.source_path,
                        original,
                        webp_bytes,
                        thumb_bytes,
                    ));
                }
            }
        }

        tracing::info!(
            to_convert = tasks.len(),
            settled = settled.len(),
            "Planned batch"
        );
        Ok(PreparedBatch {
            tasks,
            settled,
            started,
        })
    }

    /// Convert a prepared batch and write the failed-files report.
    ///
    /// Per-file problems never abort the run; they show up in the report.
    pub async fn execute<F>(
        &self,
        prepared: PreparedBatch,
        cancel: CancellationToken,
        on_outcome: F,
    ) -> BatchReport
    where
        F: Fn(&ConversionOutcome) + Send + Sync + 'static,
    {
        let planned = prepared.planned();
        let aggregator = Arc::new(ResultAggregator::started_at(prepared.started));

        for outcome in &prepared.settled {
            aggregator.record(outcome);
            on_outcome(outcome);
        }

        let mut cancelled = cancel.is_cancelled();
        if !prepared.tasks.is_empty() {
            let dispatcher = Dispatcher::new(
                self.codec.clone(),
                DispatchOptions::from_config(&self.config),
            );
            let dispatch = dispatcher
                .run(prepared.tasks, aggregator.clone(), cancel, on_outcome)
                .await;
            cancelled = dispatch.cancelled;
        }

        // The dispatcher has joined every task holding a clone
        let (stats, failures) = match Arc::try_unwrap(aggregator) {
            Ok(aggregator) => aggregator.finish(),
            Err(shared) => (shared.snapshot(), shared.failures()),
        };

        if let Err(e) = write_failed_list(&self.config.failed_list_file, &failures) {
            tracing::error!(
                "Failed to write {}: {e}",
                self.config.failed_list_file.display()
            );
        } else if !failures.is_empty() {
            tracing::info!(
                "Failed files list saved to: {}",
                self.config.failed_list_file.display()
            );
        }

        let summary = BatchSummary::new(&stats);
        summary.log();

        BatchReport {
            stats,
            failures,
            summary,
            planned,
            cancelled,
        }
    }
}
