//! Core data types for the webpify conversion pipeline.
//!
//! A batch is a list of [`ConversionTask`]s. Every task yields exactly one
//! [`ConversionOutcome`], and outcomes are folded into [`AggregateStats`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One source image and the two files it should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionTask {
    /// Source image
    pub source_path: PathBuf,

    /// Full-size WebP output
    pub target_webp_path: PathBuf,

    /// WebP thumbnail output
    pub target_thumb_path: PathBuf,
}

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Converted,
    Skipped,
    Failed,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Converted => write!(f, "converted"),
            OutcomeStatus::Skipped => write!(f, "skipped"),
            OutcomeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of attempting one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub source_path: PathBuf,

    pub status: OutcomeStatus,

    /// Size of the source file
    pub original_size_bytes: u64,

    /// Size of the WebP output (existing output for skipped files)
    pub webp_size_bytes: u64,

    /// Size of the thumbnail, 0 if none was produced
    pub thumb_size_bytes: u64,

    /// Present iff `status` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Wall-clock time spent on this file
    pub duration: Duration,
}

impl ConversionOutcome {
    /// A successful conversion.
    pub fn converted(
        source_path: PathBuf,
        original_size_bytes: u64,
        webp_size_bytes: u64,
        thumb_size_bytes: u64,
        duration: Duration,
    ) -> Self {
        Self {
            source_path,
            status: OutcomeStatus::Converted,
            original_size_bytes,
            webp_size_bytes,
            thumb_size_bytes,
            error_detail: None,
            duration,
        }
    }

    /// A file whose outputs were already up to date.
    pub fn skipped(
        source_path: PathBuf,
        original_size_bytes: u64,
        webp_size_bytes: u64,
        thumb_size_bytes: u64,
    ) -> Self {
        Self {
            source_path,
            status: OutcomeStatus::Skipped,
            original_size_bytes,
            webp_size_bytes,
            thumb_size_bytes,
            error_detail: None,
            duration: Duration::ZERO,
        }
    }

    /// A failed conversion. No output sizes are reported.
    pub fn failed(
        source_path: PathBuf,
        original_size_bytes: u64,
        error: impl std::fmt::Display,
        duration: Duration,
    ) -> Self {
        Self {
            source_path,
            status: OutcomeStatus::Failed,
            original_size_bytes,
            webp_size_bytes: 0,
            thumb_size_bytes: 0,
            error_detail: Some(error.to_string()),
            duration,
        }
    }

    /// Combined size of both outputs.
    pub fn output_size_bytes(&self) -> u64 {
        self.webp_size_bytes + self.thumb_size_bytes
    }

    /// Output size as a percentage of the source, if the source is non-empty.
    pub fn ratio_percent(&self) -> Option<f64> {
        (self.original_size_bytes > 0)
            .then(|| self.output_size_bytes() as f64 / self.original_size_bytes as f64 * 100.0)
    }
}

/// Running totals for a batch.
///
/// Byte totals only count `Converted` outcomes so that ratios are computed
/// over files that were actually encoded in this run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub files_total: u64,
    pub files_converted: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub original_bytes_total: u64,
    pub webp_bytes_total: u64,
    pub thumb_bytes_total: u64,
    pub elapsed_time: Duration,
}

impl AggregateStats {
    /// Fold a single outcome into the totals.
    pub fn merge(&mut self, outcome: &ConversionOutcome) {
        self.files_total += 1;
        match outcome.status {
            OutcomeStatus::Converted => {
                self.files_converted += 1;
                self.original_bytes_total += outcome.original_size_bytes;
                self.webp_bytes_total += outcome.webp_size_bytes;
                self.thumb_bytes_total += outcome.thumb_size_bytes;
            }
            OutcomeStatus::Skipped => self.files_skipped += 1,
            OutcomeStatus::Failed => self.files_failed += 1,
        }
    }

    /// Files that went through the codec (converted or failed).
    pub fn files_processed(&self) -> u64 {
        self.files_converted + self.files_failed
    }

    /// Whether the per-status counts add up to the total.
    pub fn is_consistent(&self) -> bool {
        self.files_total == self.files_converted + self.files_skipped + self.files_failed
    }
}

/// A failed file, as listed in the failed-files report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub source_path: PathBuf,
    pub error_detail: String,
}
