//! Deciding whether a source needs (re)conversion.
//!
//! A task is skipped only when both outputs exist and neither is older than
//! the source. Everything else converts, including the case where only one
//! of the two outputs is present.

use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

use crate::types::ConversionTask;

/// What the filesystem says about a task's outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Both outputs exist and are at least as new as the source
    UpToDate { webp_bytes: u64, thumb_bytes: u64 },
    /// At least one output is missing
    Missing,
    /// Both outputs exist but one predates the source
    Outdated,
    /// The source's metadata could not be read
    SourceUnreadable,
}

/// Whether a task goes to the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Convert,
    Skip { webp_bytes: u64, thumb_bytes: u64 },
}

/// Inspect the source and both targets. Reads metadata only.
pub fn is_up_to_date(task: &ConversionTask) -> Freshness {
    let Some(source_mtime) = modified(&task.source_path) else {
        return Freshness::SourceUnreadable;
    };
    let (Ok(webp), Ok(thumb)) = (
        std::fs::metadata(&task.target_webp_path),
        std::fs::metadata(&task.target_thumb_path),
    ) else {
        return Freshness::Missing;
    };

    if newer_or_equal(&webp, source_mtime) && newer_or_equal(&thumb, source_mtime) {
        Freshness::UpToDate {
            webp_bytes: webp.len(),
            thumb_bytes: thumb.len(),
        }
    } else {
        Freshness::Outdated
    }
}

/// Decide what to do with a task.
///
/// With `skip_existing` off every task converts.
pub fn decide(task: &ConversionTask, skip_existing: bool) -> Decision {
    if !skip_existing {
        return Decision::Convert;
    }
    match is_up_to_date(task) {
        Freshness::UpToDate {
            webp_bytes,
            thumb_bytes,
        } => Decision::Skip {
            webp_bytes,
            thumb_bytes,
        },
        other => {
            tracing::trace!("{} needs conversion: {:?}", task.source_path.display(), other);
            Decision::Convert
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn newer_or_equal(target: &Metadata, source_mtime: SystemTime) -> bool {
    target
        .modified()
        .map(|mtime| mtime >= source_mtime)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::path::PathBuf;
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        task: ConversionTask,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let task = ConversionTask {
            source_path: dir.path().join("photo.jpg"),
            target_webp_path: dir.path().join("webp/photo.webp"),
            target_thumb_path: dir.path().join("thumbs/photo_thumb.webp"),
        };
        fs::create_dir_all(dir.path().join("webp")).unwrap();
        fs::create_dir_all(dir.path().join("thumbs")).unwrap();
        Fixture { _dir: dir, task }
    }

    fn write_with_mtime(path: &PathBuf, bytes: &[u8], mtime: SystemTime) {
        fs::write(path, bytes).unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    #[test]
    fn test_skip_when_both_outputs_are_newer() {
        let f = fixture();
        write_with_mtime(&f.task.source_path, b"source", at(0));
        write_with_mtime(&f.task.target_webp_path, b"webp!", at(10));
        write_with_mtime(&f.task.target_thumb_path, b"th", at(10));

        assert_eq!(
            decide(&f.task, true),
            Decision::Skip {
                webp_bytes: 5,
                thumb_bytes: 2
            }
        );
    }

    #[test]
    fn test_equal_mtime_counts_as_fresh() {
        let f = fixture();
        write_with_mtime(&f.task.source_path, b"source", at(5));
        write_with_mtime(&f.task.target_webp_path, b"w", at(5));
        write_with_mtime(&f.task.target_thumb_path, b"t", at(5));

        assert!(matches!(is_up_to_date(&f.task), Freshness::UpToDate { .. }));
    }

    #[test]
    fn test_touched_source_is_reconverted() {
        let f = fixture();
        write_with_mtime(&f.task.source_path, b"source", at(0));
        write_with_mtime(&f.task.target_webp_path, b"w", at(10));
        write_with_mtime(&f.task.target_thumb_path, b"t", at(10));
        assert!(matches!(decide(&f.task, true), Decision::Skip { .. }));

        write_with_mtime(&f.task.source_path, b"source", at(20));
        assert_eq!(is_up_to_date(&f.task), Freshness::Outdated);
        assert_eq!(decide(&f.task, true), Decision::Convert);
    }

    #[test]
    fn test_only_one_output_present_converts() {
        let f = fixture();
        write_with_mtime(&f.task.source_path, b"source", at(0));
        write_with_mtime(&f.task.target_webp_path, b"w", at(10));

        assert_eq!(is_up_to_date(&f.task), Freshness::Missing);
        assert_eq!(decide(&f.task, true), Decision::Convert);
    }

    #[test]
    fn test_skip_existing_off_always_converts() {
        let f = fixture();
        write_with_mtime(&f.task.source_path, b"source", at(0));
        write_with_mtime(&f.task.target_webp_path, b"w", at(10));
        write_with_mtime(&f.task.target_thumb_path, b"t", at(10));

        assert_eq!(decide(&f.task, false), Decision::Convert);
    }

    #[test]
    fn test_missing_source_converts() {
        let f = fixture();
        assert_eq!(is_up_to_date(&f.task), Freshness::SourceUnreadable);
        assert_eq!(decide(&f.task, true), Decision::Convert);
    }
}
