//! Atomic output commits.
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! crash or error never leaves a truncated `.webp` behind.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::ConversionError;
use crate::types::ConversionTask;

/// Write `data` to `path` via a temp file in the same directory.
///
/// Parent directories are created as needed. The temp file is deleted on
/// any error.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Commit both outputs of a task. Returns the bytes written for each.
///
/// Either both files end up in place or neither does: if the thumbnail
/// fails after the main image landed, the main image is removed again.
pub fn commit_outputs(
    task: &ConversionTask,
    webp: &[u8],
    thumb: &[u8],
) -> Result<(u64, u64), ConversionError> {
    write_atomic(&task.target_webp_path, webp).map_err(|source| ConversionError::Write {
        path: task.target_webp_path.clone(),
        source,
    })?;

    if let Err(source) = write_atomic(&task.target_thumb_path, thumb) {
        if let Err(e) = std::fs::remove_file(&task.target_webp_path) {
            tracing::warn!(
                "Could not roll back {}: {e}",
                task.target_webp_path.display()
            );
        }
        return Err(ConversionError::Write {
            path: task.target_thumb_path.clone(),
            source,
        });
    }

    Ok((webp.len() as u64, thumb.len() as u64))
}
