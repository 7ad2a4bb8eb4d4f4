//! Error types for the webpify conversion pipeline.
//!
//! Errors are split by blast radius: configuration and discovery errors abort
//! a batch before any work starts, while codec and conversion errors are
//! confined to a single file and end up as a `Failed` outcome.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for batch operations.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// General I/O errors (creating output roots, writing reports)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to parse JSON configuration
    #[error("Failed to parse JSON config: {0}")]
    JsonError(#[from] serde_json::Error),

    /// An environment override could not be parsed
    #[error("Invalid value {value:?} for environment variable {key}: {message}")]
    EnvError {
        key: String,
        value: String,
        message: String,
    },

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised while enumerating input files.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Input directory does not exist
    #[error("Input folder not found: {0}")]
    NotFound(PathBuf),

    /// Input path exists but is not a directory
    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The directory could not be listed
    #[error("Cannot read input folder {path}: {source}")]
    Walk {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors reported by an image codec for a single file.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Source file could not be read
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Image decoding failed (corrupt or truncated data)
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// WebP encoding failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Not an image, or a format the codec cannot handle
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },
}

/// Per-file conversion errors. Each one becomes a `Failed` outcome.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The codec rejected the file
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Writing an output file failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exceeded the per-file time budget
    #[error("Timed out after {timeout_secs}s converting {path}")]
    Timeout { path: PathBuf, timeout_secs: u64 },

    /// The codec panicked while handling the file
    #[error("Codec panicked on {path}: {message}")]
    Panicked { path: PathBuf, message: String },

    /// The job finished after its slot was given up; outputs were discarded
    #[error("Conversion of {0} was abandoned")]
    Abandoned(PathBuf),

    /// Another source already maps to the same output path
    #[error("Output {target} for {path} collides with {other}")]
    TargetCollision {
        path: PathBuf,
        target: PathBuf,
        other: PathBuf,
    },
}

/// Convenience type alias for batch results.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Convenience type alias for codec results.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_wraps_into_batch_error() {
        let err: BatchError = ConfigError::ValidationError("quality must be 1..=100".into()).into();
        assert!(err.to_string().starts_with("Configuration error"));
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn test_codec_error_is_transparent_in_conversion_error() {
        let codec = CodecError::Decode {
            path: PathBuf::from("broken.jpg"),
            message: "unexpected EOF".into(),
        };
        let err = ConversionError::from(codec);
        assert_eq!(err.to_string(), "Decode error for broken.jpg: unexpected EOF");
    }
}
