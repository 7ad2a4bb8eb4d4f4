//! Image codec boundary.
//!
//! The orchestrator only talks to [`ImageCodec`]; pixel-level decode and
//! encode live behind it. [`WebpCodec`] is the implementation used by the
//! CLI, tests substitute their own.

mod anim;
mod encoder;
mod exif;
mod mux;

pub use encoder::WebpCodec;
pub use mux::{embed_metadata, MuxError};

use std::path::Path;

use crate::config::ThumbSize;
use crate::error::CodecResult;

/// Encoder settings shared by every file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Lossy quality, 1..=100
    pub quality: u8,
    /// libwebp effort, 0..=6
    pub method: u8,
    pub preserve_exif: bool,
    pub preserve_icc: bool,
    pub preserve_alpha: bool,
    pub force_lossless_for_alpha: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: 100,
            method: 6,
            preserve_exif: true,
            preserve_icc: true,
            preserve_alpha: true,
            force_lossless_for_alpha: true,
        }
    }
}

/// A full-size WebP produced from one source.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Encoded WebP bytes
    pub data: Vec<u8>,
    /// Size of the source file in bytes
    pub original_size: u64,
    /// Whether the output is an animation
    pub animated: bool,
}

/// Converts source images to WebP.
///
/// Implementations are called from blocking worker threads, concurrently for
/// different files. Any failure is reported as a [`CodecError`] and only
/// affects the file at hand.
///
/// [`CodecError`]: crate::error::CodecError
pub trait ImageCodec: Send + Sync {
    /// Encode the full-size WebP for `source`.
    ///
    /// Animated sources must keep every frame and its timing.
    fn convert(&self, source: &Path, options: &EncodeOptions) -> CodecResult<EncodedImage>;

    /// Encode a thumbnail fitting within `bounds`.
    ///
    /// Animated sources may be reduced to a single representative frame.
    fn thumbnail(
        &self,
        source: &Path,
        bounds: ThumbSize,
        options: &EncodeOptions,
    ) -> CodecResult<Vec<u8>>;
}
