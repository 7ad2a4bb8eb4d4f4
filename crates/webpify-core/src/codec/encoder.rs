//! WebP encoding built on `image` for decoding and libwebp for encoding.

use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::metadata::LoopCount;
use image::{AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use webp::{Encoder, WebPConfig};

use super::anim::AnimationWriter;
use super::{embed_metadata, exif, EncodeOptions, EncodedImage, ImageCodec};
use crate::config::ThumbSize;
use crate::error::{CodecError, CodecResult};

/// Frame delay used when a source frame declares none.
const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// The production codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpCodec;

impl WebpCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for WebpCodec {
    fn convert(&self, source: &Path, options: &EncodeOptions) -> CodecResult<EncodedImage> {
        let bytes = read_source(source)?;
        let original_size = bytes.len() as u64;
        let format = sniff_format(source, &bytes)?;

        if let Some(animation) = decode_animation(source, &bytes, format)? {
            let data = encode_animation(source, &animation, options)?;
            tracing::debug!(
                path = %source.display(),
                frames = animation.frames.len(),
                loop_count = animation.loop_count,
                "Encoded animation"
            );
            return Ok(EncodedImage {
                data,
                original_size,
                animated: true,
            });
        }

        let still = decode_still(source, bytes, options.preserve_icc, options.preserve_exif)?;
        let keep_alpha = still.image.color().has_alpha() && options.preserve_alpha;
        let lossless = keep_alpha && options.force_lossless_for_alpha;
        let (width, height) = (still.image.width(), still.image.height());

        let encoded = encode_still(source, &still.image, keep_alpha, lossless, options)?;
        let data = embed_metadata(
            &encoded,
            width,
            height,
            keep_alpha,
            still.icc.as_deref(),
            still.exif.as_deref(),
        )
        .map_err(|e| CodecError::Encode {
            path: source.to_path_buf(),
            message: format!("Cannot embed metadata: {e}"),
        })?;

        Ok(EncodedImage {
            data,
            original_size,
            animated: false,
        })
    }

    fn thumbnail(
        &self,
        source: &Path,
        bounds: ThumbSize,
        options: &EncodeOptions,
    ) -> CodecResult<Vec<u8>> {
        let bytes = read_source(source)?;
        sniff_format(source, &bytes)?;

        // Multi-frame sources decode to their first frame here
        let still = decode_still(source, bytes, false, false)?;
        let image = fit_within(&still.image, bounds);

        let keep_alpha = image.color().has_alpha() && options.preserve_alpha;
        encode_still(source, &image, keep_alpha, keep_alpha, options)
    }
}

/// A decoded still image plus the metadata worth carrying over.
struct StillImage {
    image: DynamicImage,
    icc: Option<Vec<u8>>,
    exif: Option<Vec<u8>>,
}

fn read_source(path: &Path) -> CodecResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| CodecError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_error(path: &Path, e: impl std::fmt::Display) -> CodecError {
    CodecError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn encode_error(path: &Path, message: impl Into<String>) -> CodecError {
    CodecError::Encode {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Decoded frames of a multi-frame source.
struct Animation {
    frames: Vec<Frame>,
    /// WebP loop count, 0 = forever
    loop_count: u16,
}

/// Detect the format from content; the extension is not trusted.
fn sniff_format(path: &Path, bytes: &[u8]) -> CodecResult<ImageFormat> {
    image::guess_format(bytes).map_err(|_| CodecError::UnsupportedFormat {
        path: path.to_path_buf(),
        format: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_string(),
    })
}

/// Decode every frame of a GIF or WebP animation.
///
/// Returns `None` for still images, including single-frame GIFs.
fn decode_animation(
    path: &Path,
    bytes: &[u8],
    format: ImageFormat,
) -> CodecResult<Option<Animation>> {
    let (frames, loop_count) = match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(|e| decode_error(path, e))?;
            let loop_count = decoder.loop_count();
            (decoder.into_frames().collect_frames(), loop_count)
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes)).map_err(|e| decode_error(path, e))?;
            if !decoder.has_animation() {
                return Ok(None);
            }
            let loop_count = decoder.loop_count();
            (decoder.into_frames().collect_frames(), loop_count)
        }
        _ => return Ok(None),
    };
    let frames = frames.map_err(|e| decode_error(path, e))?;

    Ok((frames.len() > 1).then(|| Animation {
        frames,
        loop_count: webp_loop_count(loop_count),
    }))
}

fn webp_loop_count(count: LoopCount) -> u16 {
    match count {
        LoopCount::Infinite => 0,
        LoopCount::Finite(n) => u16::try_from(n.get()).unwrap_or(u16::MAX),
    }
}

fn decode_still(
    path: &Path,
    bytes: Vec<u8>,
    want_icc: bool,
    want_exif: bool,
) -> CodecResult<StillImage> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_error(path, format!("Cannot detect image format: {e}")))?;
    let mut decoder = reader.into_decoder().map_err(|e| decode_error(path, e))?;

    // Metadata is best effort; a broken profile never fails the file
    let icc = if want_icc {
        decoder.icc_profile().ok().flatten()
    } else {
        None
    };
    let exif_block = decoder.exif_metadata().ok().flatten();
    let orientation = decoder
        .orientation()
        .unwrap_or(image::metadata::Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    image.apply_orientation(orientation);

    let exif = exif_block.filter(|_| want_exif).map(|raw| {
        let mut block = exif::normalize(raw);
        exif::reset_orientation(&mut block);
        block
    });

    Ok(StillImage { image, icc, exif })
}

/// Shrink to fit `bounds`, keeping aspect ratio. Never upscales.
fn fit_within(image: &DynamicImage, bounds: ThumbSize) -> DynamicImage {
    if bounds.contains(image.width(), image.height()) {
        image.clone()
    } else {
        image.thumbnail(bounds.width, bounds.height)
    }
}

fn webp_config(path: &Path, lossless: bool, options: &EncodeOptions) -> CodecResult<WebPConfig> {
    let mut config =
        WebPConfig::new().map_err(|_| encode_error(path, "Cannot initialise libwebp config"))?;
    config.lossless = i32::from(lossless);
    config.quality = f32::from(options.quality);
    config.method = i32::from(options.method);
    config.alpha_compression = 1;
    Ok(config)
}

fn encode_still(
    path: &Path,
    image: &DynamicImage,
    keep_alpha: bool,
    lossless: bool,
    options: &EncodeOptions,
) -> CodecResult<Vec<u8>> {
    let config = webp_config(path, lossless, options)?;
    let (width, height) = (image.width(), image.height());

    let pixels = if keep_alpha {
        image.to_rgba8().into_raw()
    } else {
        image.to_rgb8().into_raw()
    };
    let encoder = if keep_alpha {
        Encoder::from_rgba(&pixels, width, height)
    } else {
        Encoder::from_rgb(&pixels, width, height)
    };
    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| encode_error(path, format!("{e:?}")))?;

    // WebPMemory is !Send, copy out before crossing threads
    Ok(memory.to_vec())
}

fn encode_animation(
    path: &Path,
    animation: &Animation,
    options: &EncodeOptions,
) -> CodecResult<Vec<u8>> {
    let first = animation
        .frames
        .first()
        .ok_or_else(|| encode_error(path, "Animation has no frames"))?;
    let (width, height) = first.buffer().dimensions();
    let config = webp_config(path, false, options)?;
    let anim_error = |e: super::anim::AnimError| encode_error(path, e.to_string());

    let mut writer =
        AnimationWriter::new(width, height, animation.loop_count, config).map_err(anim_error)?;

    let mut timestamp_ms: i32 = 0;
    for frame in &animation.frames {
        let buffer = frame.buffer();
        if buffer.dimensions() != (width, height) {
            return Err(encode_error(path, "Animation frames differ in size"));
        }
        writer
            .add_frame(buffer.as_raw(), timestamp_ms)
            .map_err(anim_error)?;
        timestamp_ms = timestamp_ms.saturating_add(frame_delay_ms(frame) as i32);
    }

    // The end timestamp carries the last frame's delay
    writer.finish(timestamp_ms).map_err(anim_error)
}

fn frame_delay_ms(frame: &Frame) -> u32 {
    let (numer, denom) = frame.delay().numer_denom_ms();
    match numer.checked_div(denom) {
        Some(0) | None => DEFAULT_FRAME_DELAY_MS,
        Some(ms) => ms,
    }
}
