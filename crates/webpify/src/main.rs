//! webpify CLI - batch-convert image folders to WebP with thumbnails.
//!
//! Every supported image in the input folder gets a full-size WebP and a
//! bounded thumbnail. Up-to-date outputs are skipped, so re-running on the
//! same folder only converts what changed.
//!
//! # Usage
//!
//! ```bash
//! # Convert using ./settings.toml (or settings.json)
//! webpify convert
//!
//! # Override folders and encoder settings on the command line
//! webpify convert --input ./photos --output-webp ./webp --output-thumbs ./thumbs -q 80
//!
//! # View configuration
//! webpify config show
//! ```
//!
//! Variables from a `.env` file in the working directory (or a parent) are
//! loaded before settings are resolved. Variables already set win.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Exit status for fatal errors (configuration, missing input folder).
const EXIT_FATAL: u8 = 2;

/// webpify - batch-convert image folders to WebP with thumbnails.
#[derive(Parser, Debug)]
#[command(name = "webpify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Settings file (TOML, or JSON by extension)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert the input folder to WebP images and thumbnails
    Convert(cli::convert::ConvertArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let env_file = load_env_file(None);

    // Logging isn't initialized yet, so use eprintln for config warnings.
    // Validation happens later, once command-line overrides are applied.
    let config = match webpify_core::Config::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `webpify config path`."
            );
            webpify_core::Config::default()
        }
    };
    let with_log_file = matches!(cli.command, Commands::Convert(_));
    let _log_guard = logging::init_from_config(&config, cli.verbose, cli.json_logs, with_log_file);

    tracing::debug!("webpify v{}", webpify_core::VERSION);
    if let Some(path) = &env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let result = match cli.command {
        Commands::Convert(args) => cli::convert::execute(args, cli.config.as_deref()).await,
        Commands::Config(args) => cli::config::execute(args, cli.config.as_deref())
            .await
            .map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Load a `.env` file into the process environment without replacing
/// variables that are already set. `None` searches the working directory
/// and its parents.
fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenv::from_path(path).ok().map(|()| path.to_path_buf()),
        None => dotenv::dotenv().ok(),
    }
}
