//! Metadata muxing for WebP containers.
//!
//! libwebp's encoder emits a bare `VP8 `/`VP8L` file (or `VP8X` + `ALPH` for
//! lossy alpha). To carry an ICC profile or EXIF block the file has to use
//! the extended layout:
//!
//! ```text
//! RIFF <size> WEBP
//!   VP8X  flags + canvas size
//!   ICCP  (optional, must directly follow VP8X)
//!   ...   image data chunks, unchanged
//!   EXIF  (optional, after image data)
//! ```

use thiserror::Error;

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const VP8X_PAYLOAD_LEN: usize = 10;

const FLAG_ICC: u8 = 0x20;
const FLAG_ALPHA: u8 = 0x10;
const FLAG_EXIF: u8 = 0x08;

/// Errors raised when the encoder output is not a well-formed WebP file.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MuxError {
    #[error("not a RIFF/WEBP file")]
    NotWebp,

    #[error("chunk {0} runs past the end of the file")]
    Truncated(String),

    #[error("file is too large for a RIFF container")]
    TooLarge,
}

/// A chunk borrowed from a parsed WebP file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Chunk<'a> {
    pub fourcc: [u8; 4],
    pub payload: &'a [u8],
}

/// Split a WebP file into its top-level chunks.
pub(crate) fn parse_chunks(data: &[u8]) -> Result<Vec<Chunk<'_>>, MuxError> {
    if data.len() < RIFF_HEADER_LEN || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(MuxError::NotWebp);
    }

    let mut chunks = Vec::new();
    let mut pos = RIFF_HEADER_LEN;
    while pos + CHUNK_HEADER_LEN <= data.len() {
        let fourcc = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
        let size = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
            as usize;
        let start = pos + CHUNK_HEADER_LEN;
        let end = start
            .checked_add(size)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| MuxError::Truncated(String::from_utf8_lossy(&fourcc).into_owned()))?;
        chunks.push(Chunk {
            fourcc,
            payload: &data[start..end],
        });
        // Chunks are padded to an even length
        pos = end + (size & 1);
    }
    Ok(chunks)
}

/// Embed an ICC profile and/or EXIF block into an encoded WebP.
///
/// `width`, `height` and `has_alpha` describe the encoded image and are only
/// used when the input is a simple (non-`VP8X`) file. Returns the input
/// unchanged when there is nothing to embed.
pub fn embed_metadata(
    webp: &[u8],
    width: u32,
    height: u32,
    has_alpha: bool,
    icc: Option<&[u8]>,
    exif: Option<&[u8]>,
) -> Result<Vec<u8>, MuxError> {
    let icc = icc.filter(|p| !p.is_empty());
    let exif = exif.filter(|p| !p.is_empty());
    if icc.is_none() && exif.is_none() {
        return Ok(webp.to_vec());
    }

    let chunks = parse_chunks(webp)?;

    let mut vp8x = [0u8; VP8X_PAYLOAD_LEN];
    match chunks.first() {
        Some(chunk) if &chunk.fourcc == b"VP8X" && chunk.payload.len() >= VP8X_PAYLOAD_LEN => {
            vp8x.copy_from_slice(&chunk.payload[..VP8X_PAYLOAD_LEN]);
        }
        _ => {
            if has_alpha {
                vp8x[0] |= FLAG_ALPHA;
            }
            vp8x[4..7].copy_from_slice(&u24_le(width.saturating_sub(1)));
            vp8x[7..10].copy_from_slice(&u24_le(height.saturating_sub(1)));
        }
    }
    if icc.is_some() {
        vp8x[0] |= FLAG_ICC;
    }
    if exif.is_some() {
        vp8x[0] |= FLAG_EXIF;
    }

    let mut body = Vec::with_capacity(webp.len() + icc.map_or(0, <[u8]>::len) + exif.map_or(0, <[u8]>::len) + 64);
    body.extend_from_slice(b"WEBP");
    write_chunk(&mut body, b"VP8X", &vp8x)?;
    if let Some(icc) = icc {
        write_chunk(&mut body, b"ICCP", icc)?;
    }
    for chunk in chunks
        .iter()
        .filter(|c| !matches!(&c.fourcc, b"VP8X" | b"ICCP" | b"EXIF"))
    {
        write_chunk(&mut body, &chunk.fourcc, chunk.payload)?;
    }
    if let Some(exif) = exif {
        write_chunk(&mut body, b"EXIF", exif)?;
    }

    let riff_size = u32::try_from(body.len()).map_err(|_| MuxError::TooLarge)?;
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

fn write_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], payload: &[u8]) -> Result<(), MuxError> {
    let size = u32::try_from(payload.len()).map_err(|_| MuxError::TooLarge)?;
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    Ok(())
}

fn u24_le(value: u32) -> [u8; 3] {
    let bytes = value.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal RIFF/WEBP file from raw chunks.
    fn riff(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut body = b"WEBP".to_vec();
        for (fourcc, payload) in chunks {
            write_chunk(&mut body, fourcc, payload).unwrap();
        }
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn test_parse_chunks_handles_padding() {
        let file = riff(&[(b"VP8L", &[1, 2, 3]), (b"EXIF", &[9, 9])]);
        let chunks = parse_chunks(&file).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0].fourcc, b"VP8L");
        assert_eq!(chunks[0].payload, &[1, 2, 3]);
        assert_eq!(&chunks[1].fourcc, b"EXIF");
    }

    #[test]
    fn test_parse_chunks_rejects_non_webp() {
        assert_eq!(parse_chunks(b"GIF89a......"), Err(MuxError::NotWebp));
    }

    #[test]
    fn test_parse_chunks_rejects_truncated_chunk() {
        let mut file = riff(&[(b"VP8 ", &[0; 16])]);
        file.truncate(file.len() - 4);
        assert!(matches!(parse_chunks(&file), Err(MuxError::Truncated(_))));
    }

    #[test]
    fn test_embed_nothing_returns_input() {
        let file = riff(&[(b"VP8L", &[1, 2, 3, 4])]);
        assert_eq!(embed_metadata(&file, 10, 10, false, None, Some(&[])).unwrap(), file);
    }

    #[test]
    fn test_embed_into_simple_file_builds_vp8x() {
        let file = riff(&[(b"VP8L", &[7; 5])]);
        let out = embed_metadata(&file, 640, 480, true, Some(&[1, 2, 3]), Some(b"II*\0")).unwrap();

        let riff_size = u32::from_le_bytes([out[4], out[5], out[6], out[7]]) as usize;
        assert_eq!(riff_size, out.len() - 8);

        let chunks = parse_chunks(&out).unwrap();
        let order: Vec<&[u8; 4]> = chunks.iter().map(|c| &c.fourcc).collect();
        assert_eq!(order, vec![b"VP8X", b"ICCP", b"VP8L", b"EXIF"]);

        let vp8x = chunks[0].payload;
        assert_eq!(vp8x[0], FLAG_ICC | FLAG_ALPHA | FLAG_EXIF);
        let canvas_w = u32::from_le_bytes([vp8x[4], vp8x[5], vp8x[6], 0]) + 1;
        let canvas_h = u32::from_le_bytes([vp8x[7], vp8x[8], vp8x[9], 0]) + 1;
        assert_eq!((canvas_w, canvas_h), (640, 480));
        assert_eq!(chunks[1].payload, &[1, 2, 3]);
        assert_eq!(chunks[2].payload, &[7; 5]);
    }

    #[test]
    fn test_embed_into_extended_file_keeps_flags_and_replaces_old_metadata() {
        let mut vp8x = [0u8; VP8X_PAYLOAD_LEN];
        vp8x[0] = FLAG_ALPHA;
        vp8x[4] = 99; // canvas width - 1 = 99
        vp8x[7] = 49;
        let file = riff(&[
            (b"VP8X", &vp8x),
            (b"ICCP", &[0xAA]),
            (b"ALPH", &[1, 1]),
            (b"VP8 ", &[2, 2, 2]),
        ]);

        let out = embed_metadata(&file, 1, 1, false, Some(&[0xBB, 0xCC]), None).unwrap();
        let chunks = parse_chunks(&out).unwrap();
        let order: Vec<&[u8; 4]> = chunks.iter().map(|c| &c.fourcc).collect();
        assert_eq!(order, vec![b"VP8X", b"ICCP", b"ALPH", b"VP8 "]);
        assert_eq!(chunks[0].payload[0], FLAG_ALPHA | FLAG_ICC);
        // Canvas comes from the existing header, not the arguments
        assert_eq!(chunks[0].payload[4], 99);
        assert_eq!(chunks[1].payload, &[0xBB, 0xCC]);
    }
}
