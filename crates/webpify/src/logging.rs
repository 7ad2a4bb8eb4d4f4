//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging. Console output goes
//! to stderr (pretty or JSON); a conversion run additionally appends plain
//! text to the configured log file through a non-blocking writer.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// `RUST_LOG` overrides the level chosen from `verbose`. When `log_file` is
/// given, events are also written there; the returned guard flushes that
/// writer and must be held until the program exits.
pub fn init(verbose: bool, json_format: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_file.and_then(open_log_file) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if json_format {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }

    guard
}

/// Initialize logging with settings from the loaded config.
pub fn init_from_config(
    config: &webpify_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
    with_log_file: bool,
) -> Option<WorkerGuard> {
    let verbose =
        verbose_override || config.logging.level == "debug" || config.logging.level == "trace";
    let json_format = json_logs_override || config.logging.format == "json";
    let log_file = with_log_file.then_some(config.log_file.as_path());
    init(verbose, json_format, log_file)
}

fn open_log_file(path: &Path) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let file_name = path.file_name()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // The subscriber is not installed yet, so problems go straight to stderr
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Warning: cannot create log directory {}: {e}", dir.display());
        return None;
    }
    // Fail here rather than inside the appender, which panics on open errors
    if let Err(e) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        eprintln!("Warning: cannot open log file {}: {e}", path.display());
        return None;
    }

    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("convert.log");

        let opened = open_log_file(&path);
        assert!(opened.is_some());
        assert!(path.exists());
    }

    #[test]
    fn test_open_log_file_reports_blocked_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        assert!(open_log_file(&blocker.join("convert.log")).is_none());
    }

    #[test]
    fn test_open_log_file_needs_a_file_name() {
        assert!(open_log_file(Path::new("/")).is_none());
    }
}
