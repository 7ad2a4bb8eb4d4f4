//! End-of-batch reporting: derived metrics and the failed-files list.

use serde::Serialize;
use std::path::Path;

use crate::pipeline::writer::write_atomic;
use crate::types::{AggregateStats, FailureRecord};

/// Derived metrics for a finished batch.
///
/// Ratios are computed over converted files only. They are `None` when
/// nothing was converted, rendered as "N/A".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub files_total: u64,
    pub files_converted: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub elapsed_secs: f64,
    pub files_per_minute: Option<f64>,
    /// Average seconds per file that went through the codec
    pub avg_secs_per_file: Option<f64>,
    pub original_bytes: u64,
    pub webp_bytes: u64,
    pub thumb_bytes: u64,
    /// `webp / original`
    pub compression_ratio: Option<f64>,
    /// `1 - (webp + thumb) / original`
    pub space_savings: Option<f64>,
    /// `original - webp - thumb`, negative when outputs grew
    pub bytes_saved: i64,
}

impl BatchSummary {
    pub fn new(stats: &AggregateStats) -> Self {
        let elapsed_secs = stats.elapsed_time.as_secs_f64();
        let processed = stats.files_processed();
        let original = stats.original_bytes_total;
        let outputs = stats.webp_bytes_total + stats.thumb_bytes_total;

        let files_per_minute =
            (elapsed_secs > 0.0).then(|| processed as f64 / elapsed_secs * 60.0);
        let avg_secs_per_file = (processed > 0).then(|| elapsed_secs / processed as f64);
        let compression_ratio =
            (original > 0).then(|| stats.webp_bytes_total as f64 / original as f64);
        let space_savings = (original > 0).then(|| 1.0 - outputs as f64 / original as f64);

        Self {
            files_total: stats.files_total,
            files_converted: stats.files_converted,
            files_skipped: stats.files_skipped,
            files_failed: stats.files_failed,
            elapsed_secs,
            files_per_minute,
            avg_secs_per_file,
            original_bytes: original,
            webp_bytes: stats.webp_bytes_total,
            thumb_bytes: stats.thumb_bytes_total,
            compression_ratio,
            space_savings,
            bytes_saved: to_i64(original) - to_i64(outputs),
        }
    }

    /// Emit the summary as one structured event.
    pub fn log(&self) {
        tracing::info!(
            files_total = self.files_total,
            converted = self.files_converted,
            skipped = self.files_skipped,
            failed = self.files_failed,
            elapsed_secs = self.elapsed_secs,
            files_per_minute = %format_rate(self.files_per_minute),
            original = %format_file_size(to_i64(self.original_bytes)),
            webp = %format_file_size(to_i64(self.webp_bytes)),
            thumbs = %format_file_size(to_i64(self.thumb_bytes)),
            compression_ratio = %format_percent(self.compression_ratio),
            space_savings = %format_percent(self.space_savings),
            saved = %format_file_size(self.bytes_saved),
            "Batch summary"
        );
    }
}

fn to_i64(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

/// Human-readable size in binary units with one decimal, e.g. `1.5 MB`.
pub fn format_file_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 B".to_string();
    }

    let sign = if bytes < 0 { "-" } else { "" };
    let mut size = bytes.unsigned_abs() as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{sign}{size:.1} {}", UNITS[unit])
}

/// `0.45` → `45.0%`, `None` → `N/A`.
pub fn format_percent(fraction: Option<f64>) -> String {
    fraction.map_or_else(|| "N/A".to_string(), |f| format!("{:.1}%", f * 100.0))
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "N/A".to_string(), |r| format!("{r:.1}"))
}

/// Write one `path<TAB>error` line per failure, in arrival order.
///
/// With no failures any list left by a previous run is removed.
pub fn write_failed_list(path: &Path, failures: &[FailureRecord]) -> std::io::Result<()> {
    if failures.is_empty() {
        return match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
    }

    let mut content = String::new();
    for failure in failures {
        // Keep one record per line
        let detail = failure.error_detail.replace(['\n', '\r'], " ");
        content.push_str(&format!("{}\t{}\n", failure.source_path.display(), detail));
    }
    write_atomic(path, content.as_bytes())
}
