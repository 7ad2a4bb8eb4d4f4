//! Webpify Core - batch WebP conversion library.
//!
//! Converts a folder of raster images into full-size WebP files plus
//! WebP thumbnails, skipping files whose outputs are already up to date.
//!
//! # Architecture
//!
//! ```text
//! Discovery → Plan → Staleness → Dispatcher (N workers → ImageCodec) → Aggregator → Summary
//! ```
//!
//! Pixel work lives behind the [`ImageCodec`] trait; [`WebpCodec`] is the
//! libwebp-backed implementation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use webpify_core::{BatchConverter, Config, WebpCodec};
//!
//! #[tokio::main]
//! async fn main() -> webpify_core::Result<()> {
//!     let config = Config::load()?;
//!     let converter = BatchConverter::new(config, Arc::new(WebpCodec::new()));
//!
//!     let report = converter.run(CancellationToken::new()).await?;
//!     println!("Converted {} files", report.stats.files_converted);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod types;

// Re-exports for convenient access
pub use codec::{EncodeOptions, EncodedImage, ImageCodec, WebpCodec};
pub use config::{Config, ThumbSize};
pub use error::{BatchError, CodecError, ConfigError, ConversionError, DiscoveryError, Result};
pub use pipeline::{BatchConverter, BatchReport};
pub use report::{format_file_size, format_percent, write_failed_list, BatchSummary};
pub use types::{AggregateStats, ConversionOutcome, ConversionTask, FailureRecord, OutcomeStatus};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
