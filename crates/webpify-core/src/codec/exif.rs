//! Minimal EXIF (TIFF) patching.

const EXIF_PREAMBLE: &[u8] = b"Exif\0\0";
const ORIENTATION_TAG: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;
const IFD_ENTRY_LEN: usize = 12;

/// Strip the JPEG APP1 `Exif\0\0` preamble; WebP stores the bare TIFF block.
pub(crate) fn normalize(mut exif: Vec<u8>) -> Vec<u8> {
    if exif.starts_with(EXIF_PREAMBLE) {
        exif.drain(..EXIF_PREAMBLE.len());
    }
    exif
}

/// Set the IFD0 orientation tag to 1 (upright).
///
/// Called after the pixels have been rotated so viewers don't rotate twice.
/// Returns whether a tag was found and rewritten.
pub(crate) fn reset_orientation(exif: &mut [u8]) -> bool {
    let tiff = if exif.starts_with(EXIF_PREAMBLE) {
        &mut exif[EXIF_PREAMBLE.len()..]
    } else {
        exif
    };
    if tiff.len() < 8 {
        return false;
    }
    let little_endian = match &tiff[0..2] {
        b"II" => true,
        b"MM" => false,
        _ => return false,
    };

    let ifd = read_u32(&tiff[4..8], little_endian) as usize;
    if ifd.checked_add(2).map_or(true, |end| end > tiff.len()) {
        return false;
    }
    let count = read_u16(&tiff[ifd..ifd + 2], little_endian) as usize;

    for i in 0..count {
        let entry = ifd + 2 + i * IFD_ENTRY_LEN;
        if entry + IFD_ENTRY_LEN > tiff.len() {
            break;
        }
        let tag = read_u16(&tiff[entry..entry + 2], little_endian);
        let kind = read_u16(&tiff[entry + 2..entry + 4], little_endian);
        if tag == ORIENTATION_TAG && kind == TYPE_SHORT {
            let upright = if little_endian {
                1u16.to_le_bytes()
            } else {
                1u16.to_be_bytes()
            };
            tiff[entry + 8..entry + 10].copy_from_slice(&upright);
            return true;
        }
    }
    false
}

fn read_u16(bytes: &[u8], little_endian: bool) -> u16 {
    let raw = [bytes[0], bytes[1]];
    if little_endian {
        u16::from_le_bytes(raw)
    } else {
        u16::from_be_bytes(raw)
    }
}

fn read_u32(bytes: &[u8], little_endian: bool) -> u32 {
    let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if little_endian {
        u32::from_le_bytes(raw)
    } else {
        u32::from_be_bytes(raw)
    }
}
