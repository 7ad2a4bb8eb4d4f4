//! Animated WebP assembly on libwebp's `WebPAnimEncoder`.
//!
//! Frames are added at their start timestamps and the stream is closed with
//! an explicit end timestamp, so the last frame keeps its own duration.

use std::ffi::CStr;
use std::os::raw::c_int;
use std::ptr::{self, NonNull};

use libwebp_sys::{
    WebPAnimEncoder, WebPAnimEncoderAdd, WebPAnimEncoderAssemble, WebPAnimEncoderDelete,
    WebPAnimEncoderGetError, WebPAnimEncoderNewInternal, WebPAnimEncoderOptions,
    WebPAnimEncoderOptionsInitInternal, WebPConfig, WebPData, WebPDataClear,
    WebPGetMuxABIVersion, WebPPicture, WebPPictureFree, WebPPictureImportRGBA,
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AnimError {
    #[error("cannot initialise the animation encoder")]
    Init,

    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },

    #[error("frame timestamp {timestamp_ms}ms is before {previous_ms}ms")]
    OutOfOrder { timestamp_ms: i32, previous_ms: i32 },

    #[error("libwebp: {0}")]
    Encode(String),
}

/// Builds one animated WebP from same-sized RGBA frames.
pub(crate) struct AnimationWriter {
    encoder: NonNull<WebPAnimEncoder>,
    config: WebPConfig,
    width: u32,
    height: u32,
    last_timestamp_ms: i32,
}

impl AnimationWriter {
    /// `loop_count` 0 loops forever.
    pub(crate) fn new(
        width: u32,
        height: u32,
        loop_count: u16,
        config: WebPConfig,
    ) -> Result<Self, AnimError> {
        let (w, h) = (
            c_int::try_from(width).map_err(|_| AnimError::Init)?,
            c_int::try_from(height).map_err(|_| AnimError::Init)?,
        );

        let mut options = std::mem::MaybeUninit::<WebPAnimEncoderOptions>::uninit();
        // SAFETY: the init call fills every field or reports failure.
        let options = unsafe {
            if WebPAnimEncoderOptionsInitInternal(options.as_mut_ptr(), WebPGetMuxABIVersion())
                == 0
            {
                return Err(AnimError::Init);
            }
            let mut options = options.assume_init();
            options.anim_params.loop_count = c_int::from(loop_count);
            options
        };

        // SAFETY: `options` is initialised and only read during the call.
        let raw = unsafe { WebPAnimEncoderNewInternal(w, h, &options, WebPGetMuxABIVersion()) };
        let encoder = NonNull::new(raw).ok_or(AnimError::Init)?;

        Ok(Self {
            encoder,
            config,
            width,
            height,
            last_timestamp_ms: 0,
        })
    }

    /// Add a frame that starts at `timestamp_ms`.
    pub(crate) fn add_frame(&mut self, rgba: &[u8], timestamp_ms: i32) -> Result<(), AnimError> {
        let expected = self.width as usize * self.height as usize * 4;
        if rgba.len() != expected {
            return Err(AnimError::FrameSize {
                expected,
                actual: rgba.len(),
            });
        }
        self.check_order(timestamp_ms)?;

        let mut picture = WebPPicture::new().map_err(|()| AnimError::Init)?;
        picture.use_argb = 1;
        picture.width = self.width as c_int;
        picture.height = self.height as c_int;

        // SAFETY: `rgba` holds exactly width * height * 4 bytes (checked above)
        // and the picture owns its own copy after import.
        let ok = unsafe {
            let imported =
                WebPPictureImportRGBA(&mut picture, rgba.as_ptr(), self.width as c_int * 4) != 0;
            let added = imported
                && WebPAnimEncoderAdd(
                    self.encoder.as_ptr(),
                    &mut picture,
                    timestamp_ms,
                    &self.config,
                ) != 0;
            WebPPictureFree(&mut picture);
            added
        };
        if !ok {
            return Err(AnimError::Encode(self.last_error()));
        }

        self.last_timestamp_ms = timestamp_ms;
        Ok(())
    }

    /// Close the stream at `end_ms` and return the assembled file.
    pub(crate) fn finish(mut self, end_ms: i32) -> Result<Vec<u8>, AnimError> {
        self.check_order(end_ms)?;

        let mut data = WebPData::default();
        // SAFETY: a null frame flushes the encoder; `data` is released below
        // after its bytes are copied out.
        unsafe {
            if WebPAnimEncoderAdd(self.encoder.as_ptr(), ptr::null_mut(), end_ms, ptr::null())
                == 0
                || WebPAnimEncoderAssemble(self.encoder.as_ptr(), &mut data) == 0
            {
                WebPDataClear(&mut data);
                return Err(AnimError::Encode(self.last_error()));
            }
            let bytes = std::slice::from_raw_parts(data.bytes, data.size).to_vec();
            WebPDataClear(&mut data);
            Ok(bytes)
        }
    }

    fn check_order(&self, timestamp_ms: i32) -> Result<(), AnimError> {
        if timestamp_ms < self.last_timestamp_ms {
            return Err(AnimError::OutOfOrder {
                timestamp_ms,
                previous_ms: self.last_timestamp_ms,
            });
        }
        Ok(())
    }

    fn last_error(&self) -> String {
        // SAFETY: libwebp returns null or a NUL-terminated string owned by the encoder.
        unsafe {
            let message = WebPAnimEncoderGetError(self.encoder.as_ptr());
            if message.is_null() {
                "unknown error".to_string()
            } else {
                CStr::from_ptr(message).to_string_lossy().into_owned()
            }
        }
    }
}

impl Drop for AnimationWriter {
    fn drop(&mut self) {
        // SAFETY: the encoder was created by `new` and is deleted exactly once.
        unsafe { WebPAnimEncoderDelete(self.encoder.as_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mux::parse_chunks;

    fn lossy_config() -> WebPConfig {
        let mut config = WebPConfig::new().unwrap();
        config.quality = 75.0;
        config
    }

    fn frame(shade: u8) -> Vec<u8> {
        [shade, 0, 0, 255].repeat(4 * 4)
    }

    #[test]
    fn test_finish_writes_anim_and_frames() {
        let mut writer = AnimationWriter::new(4, 4, 3, lossy_config()).unwrap();
        writer.add_frame(&frame(10), 0).unwrap();
        writer.add_frame(&frame(200), 120).unwrap();
        let data = writer.finish(300).unwrap();

        let chunks = parse_chunks(&data).unwrap();
        let anim = chunks.iter().find(|c| &c.fourcc == b"ANIM").unwrap();
        assert_eq!(u16::from_le_bytes([anim.payload[4], anim.payload[5]]), 3);
        assert_eq!(chunks.iter().filter(|c| &c.fourcc == b"ANMF").count(), 2);
    }

    #[test]
    fn test_rejects_wrong_frame_size() {
        let mut writer = AnimationWriter::new(4, 4, 0, lossy_config()).unwrap();
        let err = writer.add_frame(&[0; 10], 0).unwrap_err();
        assert_eq!(
            err,
            AnimError::FrameSize {
                expected: 64,
                actual: 10
            }
        );
    }

    #[test]
    fn test_rejects_end_before_last_frame() {
        let mut writer = AnimationWriter::new(4, 4, 0, lossy_config()).unwrap();
        writer.add_frame(&frame(1), 0).unwrap();
        writer.add_frame(&frame(2), 500).unwrap();
        assert!(matches!(
            writer.finish(100),
            Err(AnimError::OutOfOrder { .. })
        ));
    }
}
