//! The `webpify convert` command.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use webpify_core::{
    format_file_size, format_percent, BatchConverter, BatchReport, BatchSummary, Config,
    ConversionOutcome, OutcomeStatus, WebpCodec,
};

/// Exit status when at least one file failed.
const EXIT_FAILURES: u8 = 1;
/// Conventional status for a run stopped by Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

/// Arguments for the `convert` command.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Folder to scan for images
    #[arg(long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Folder for full-size WebP files
    #[arg(long, value_name = "DIR")]
    pub output_webp: Option<PathBuf>,

    /// Folder for WebP thumbnails
    #[arg(long, value_name = "DIR")]
    pub output_thumbs: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Lossy quality (1-100)
    #[arg(short, long)]
    pub quality: Option<u32>,

    /// Reconvert files even if their outputs are up to date
    #[arg(long)]
    pub force: bool,

    /// Descend into sub-folders of the input folder
    #[arg(long)]
    pub recursive: bool,

    /// Also write the final report as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,
}

impl ConvertArgs {
    /// Layer the command-line flags over the loaded config.
    fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.input_folder = input.clone();
        }
        if let Some(webp) = &self.output_webp {
            config.output_webp_folder = webp.clone();
        }
        if let Some(thumbs) = &self.output_thumbs {
            config.output_thumb_folder = thumbs.clone();
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if self.force {
            config.skip_existing = false;
        }
        if self.recursive {
            config.recursive = true;
        }
        config.expand_paths();
    }
}

/// Execute the convert command.
pub async fn execute(args: ConvertArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let mut config = Config::resolve(config_path)?;
    args.apply(&mut config);
    config.validate()?;

    tracing::info!(
        quality = config.quality,
        method = config.method,
        workers = config.max_workers,
        thumb_size = %config.thumb_size,
        skip_existing = config.skip_existing,
        "Settings loaded"
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let converter = BatchConverter::new(config, Arc::new(WebpCodec::new()));
    let prepared = converter.prepare()?;

    let pb = create_progress_bar(prepared.planned() as u64)?;
    let ratio = Arc::new(LiveRatio::default());
    let report = {
        let pb = pb.clone();
        converter
            .execute(prepared, cancel, move |outcome| {
                ratio.observe(outcome);
                pb.set_message(ratio.message());
                pb.inc(1);
            })
            .await
    };

    if report.cancelled {
        pb.abandon_with_message("interrupted");
    } else {
        pb.finish_with_message("done");
    }

    print_summary(&report.summary);
    if !report.failures.is_empty() {
        eprintln!(
            "  {} file(s) failed, see {}",
            report.failures.len(),
            converter.config().failed_list_file.display()
        );
    }

    if let Some(path) = &args.summary_json {
        write_summary_json(path, &report)?;
        tracing::info!("Summary written to {}", path.display());
    }

    Ok(ExitCode::from(exit_status(&report)))
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing files already in progress...");
            cancel.cancel();
        }
    });
}

fn exit_status(report: &BatchReport) -> u8 {
    if report.cancelled {
        EXIT_INTERRUPTED
    } else if report.succeeded() {
        0
    } else {
        EXIT_FAILURES
    }
}

fn write_summary_json(path: &Path, report: &BatchReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Running compression ratio shown next to the progress bar.
#[derive(Debug, Default)]
struct LiveRatio {
    original: AtomicU64,
    webp: AtomicU64,
    failed: AtomicU64,
}

impl LiveRatio {
    fn observe(&self, outcome: &ConversionOutcome) {
        match outcome.status {
            OutcomeStatus::Converted => {
                self.original
                    .fetch_add(outcome.original_size_bytes, Ordering::Relaxed);
                self.webp.fetch_add(outcome.webp_size_bytes, Ordering::Relaxed);
            }
            OutcomeStatus::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeStatus::Skipped => {}
        }
    }

    fn message(&self) -> String {
        let original = self.original.load(Ordering::Relaxed);
        let webp = self.webp.load(Ordering::Relaxed);
        let ratio = (original > 0).then(|| webp as f64 / original as f64);
        let failed = self.failed.load(Ordering::Relaxed);
        if failed > 0 {
            format!("ratio {} | {failed} failed", format_percent(ratio))
        } else {
            format!("ratio {}", format_percent(ratio))
        }
    }
}

/// Create a progress bar for batch conversion.
fn create_progress_bar(total: u64) -> anyhow::Result<indicatif::ProgressBar> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )?
            .progress_chars("##-"),
    );
    pb.set_message("starting...");
    Ok(pb)
}

/// Print a formatted summary table after conversion.
fn print_summary(summary: &BatchSummary) {
    let size = |bytes: u64| format_file_size(i64::try_from(bytes).unwrap_or(i64::MAX));
    let rate = summary
        .files_per_minute
        .map_or_else(|| "N/A".to_string(), |r| format!("{r:.1}"));

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Converted:    {:>8}", summary.files_converted);
    if summary.files_skipped > 0 {
        eprintln!("    Skipped:      {:>8}", summary.files_skipped);
    }
    if summary.files_failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.files_failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", summary.files_total);
    eprintln!("    Duration:     {:>7.1}s", summary.elapsed_secs);
    eprintln!("    Rate:         {:>8} files/min", rate);
    eprintln!("    Original:     {:>8}", size(summary.original_bytes));
    eprintln!("    WebP:         {:>8}", size(summary.webp_bytes));
    eprintln!("    Thumbnails:   {:>8}", size(summary.thumb_bytes));
    eprintln!("    Ratio:        {:>8}", format_percent(summary.compression_ratio));
    eprintln!("    Saved:        {:>8}", format_file_size(summary.bytes_saved));
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;
    use webpify_core::AggregateStats;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ConvertArgs,
    }

    fn parse(argv: &[&str]) -> ConvertArgs {
        let mut full = vec!["webpify"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    fn report(failed: u64, cancelled: bool) -> BatchReport {
        let stats = AggregateStats {
            files_total: 3,
            files_converted: 3 - failed,
            files_failed: failed,
            ..AggregateStats::default()
        };
        BatchReport {
            summary: BatchSummary::new(&stats),
            stats,
            failures: Vec::new(),
            planned: 3,
            cancelled,
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "--input",
            "photos",
            "--output-webp",
            "out/webp",
            "--output-thumbs",
            "out/thumbs",
            "-w",
            "2",
            "-q",
            "80",
            "--force",
            "--recursive",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.input_folder, PathBuf::from("photos"));
        assert_eq!(config.output_webp_folder, PathBuf::from("out/webp"));
        assert_eq!(config.output_thumb_folder, PathBuf::from("out/thumbs"));
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.quality, 80);
        assert!(!config.skip_existing);
        assert!(config.recursive);
        config.validate().unwrap();
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let mut config = Config {
            quality: 70,
            max_workers: 6,
            ..Config::default()
        };
        parse(&[]).apply(&mut config);

        assert_eq!(config.quality, 70);
        assert_eq!(config.max_workers, 6);
        assert!(config.skip_existing);
        assert!(!config.recursive);
    }

    #[test]
    fn test_out_of_range_flag_fails_validation() {
        let mut config = Config::default();
        parse(&["--input", "a", "--output-webp", "b", "--output-thumbs", "c", "-q", "0"])
            .apply(&mut config);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&report(0, false)), 0);
        assert_eq!(exit_status(&report(1, false)), EXIT_FAILURES);
        assert_eq!(exit_status(&report(0, true)), EXIT_INTERRUPTED);
        assert_eq!(exit_status(&report(2, true)), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_live_ratio_counts_converted_only() {
        let ratio = LiveRatio::default();
        assert_eq!(ratio.message(), "ratio N/A");

        ratio.observe(&ConversionOutcome::converted(
            PathBuf::from("a.jpg"),
            1_000_000,
            450_000,
            10_000,
            Duration::from_millis(5),
        ));
        ratio.observe(&ConversionOutcome::skipped(
            PathBuf::from("b.jpg"),
            500,
            9_999,
            99,
        ));
        assert_eq!(ratio.message(), "ratio 45.0%");

        ratio.observe(&ConversionOutcome::failed(
            PathBuf::from("c.jpg"),
            10,
            "broken",
            Duration::ZERO,
        ));
        assert_eq!(ratio.message(), "ratio 45.0% | 1 failed");
    }

    #[test]
    fn test_write_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("summary.json");

        write_summary_json(&path, &report(1, false)).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["summary"]["files_failed"], 1);
        assert_eq!(json["planned"], 3);
        assert_eq!(json["cancelled"], false);
    }
}
