//! Fan-in point for per-file outcomes.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::types::{AggregateStats, ConversionOutcome, FailureRecord, OutcomeStatus};

#[derive(Debug, Default)]
struct State {
    stats: AggregateStats,
    failures: Vec<FailureRecord>,
}

/// Owns the batch totals and the failure list.
///
/// [`record`](Self::record) is the only way either is mutated. It takes
/// `&self` and may be called from any task; each merge happens under a
/// lock so readers never see a half-applied outcome.
#[derive(Debug)]
pub struct ResultAggregator {
    state: Mutex<State>,
    started: Instant,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    /// Measure elapsed time from `started` instead of now.
    pub fn started_at(started: Instant) -> Self {
        Self {
            state: Mutex::new(State::default()),
            started,
        }
    }

    /// Fold one outcome into the totals and log it.
    pub fn record(&self, outcome: &ConversionOutcome) {
        {
            let mut state = self.lock();
            state.stats.merge(outcome);
            if outcome.status == OutcomeStatus::Failed {
                state.failures.push(FailureRecord {
                    source_path: outcome.source_path.clone(),
                    error_detail: outcome
                        .error_detail
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                });
            }
        }
        log_outcome(outcome);
    }

    /// Consistent copy of the running totals.
    pub fn snapshot(&self) -> AggregateStats {
        let mut stats = self.lock().stats.clone();
        stats.elapsed_time = self.started.elapsed();
        stats
    }

    /// Copy of the failures recorded so far.
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.lock().failures.clone()
    }

    /// Consume the aggregator, returning final totals and failures in
    /// arrival order.
    pub fn finish(self) -> (AggregateStats, Vec<FailureRecord>) {
        let elapsed = self.started.elapsed();
        let State {
            mut stats,
            failures,
        } = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        stats.elapsed_time = elapsed;
        (stats, failures)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic elsewhere cannot leave a merge half-done; keep going
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_outcome(outcome: &ConversionOutcome) {
    let path = outcome.source_path.display();
    match outcome.status {
        OutcomeStatus::Converted => tracing::info!(
            path = %path,
            status = %outcome.status,
            original_bytes = outcome.original_size_bytes,
            webp_bytes = outcome.webp_size_bytes,
            thumb_bytes = outcome.thumb_size_bytes,
            ratio_pct = outcome.ratio_percent().unwrap_or(0.0),
            duration_ms = outcome.duration.as_millis() as u64,
            "Converted"
        ),
        OutcomeStatus::Skipped => tracing::info!(
            path = %path,
            status = %outcome.status,
            webp_bytes = outcome.webp_size_bytes,
            thumb_bytes = outcome.thumb_size_bytes,
            "Skipped (up-to-date)"
        ),
        OutcomeStatus::Failed => tracing::warn!(
            path = %path,
            status = %outcome.status,
            original_bytes = outcome.original_size_bytes,
            duration_ms = outcome.duration.as_millis() as u64,
            error = outcome.error_detail.as_deref().unwrap_or(""),
            "Failed"
        ),
    }
}
