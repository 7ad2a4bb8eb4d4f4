//! File discovery for finding source images in the input folder.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::DiscoveryError;

/// Extensions accepted as conversion sources, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif"];

/// Discovers image files in the input folder.
#[derive(Debug, Clone, Default)]
pub struct FileDiscovery {
    recursive: bool,
    excluded: Vec<PathBuf>,
}

impl FileDiscovery {
    /// Create a discovery that lists only the top level, or the whole tree
    /// when `recursive` is set.
    pub fn new(recursive: bool) -> Self {
        Self {
            recursive,
            excluded: Vec::new(),
        }
    }

    /// Never descend into `dir`. Used for output folders nested inside the
    /// input folder.
    pub fn exclude(mut self, dir: &Path) -> Self {
        self.excluded
            .push(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
        self
    }

    /// Lazily list supported files under `input_dir`, sorted by file name
    /// within each directory.
    ///
    /// Entries that cannot be read below the root are logged and skipped.
    pub fn walk(
        &self,
        input_dir: &Path,
    ) -> Result<impl Iterator<Item = PathBuf> + '_, DiscoveryError> {
        let meta = match std::fs::metadata(input_dir) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DiscoveryError::NotFound(input_dir.to_path_buf()));
            }
            Err(source) => {
                return Err(DiscoveryError::Walk {
                    path: input_dir.to_path_buf(),
                    source,
                });
            }
        };
        if !meta.is_dir() {
            return Err(DiscoveryError::NotADirectory(input_dir.to_path_buf()));
        }
        // Surface an unreadable root as fatal rather than an empty batch
        std::fs::read_dir(input_dir).map_err(|source| DiscoveryError::Walk {
            path: input_dir.to_path_buf(),
            source,
        })?;

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let files = WalkDir::new(input_dir)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| entry.depth() == 0 || self.should_enter(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|entry| is_file(entry) && is_supported(entry.path()))
            .map(DirEntry::into_path);

        Ok(files)
    }

    fn should_enter(&self, entry: &DirEntry) -> bool {
        if is_hidden(entry) {
            return false;
        }
        if entry.file_type().is_dir() && !self.excluded.is_empty() {
            let path = entry
                .path()
                .canonicalize()
                .unwrap_or_else(|_| entry.path().to_path_buf());
            return !self.excluded.iter().any(|ex| *ex == path);
        }
        true
    }
}

/// Regular files, and symlinks that resolve to one. Linked directories are
/// not followed.
fn is_file(entry: &DirEntry) -> bool {
    if entry.path_is_symlink() {
        entry.path().is_file()
    } else {
        entry.file_type().is_file()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Check if a file has a supported extension.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    fn names(paths: &[PathBuf], root: &Path) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("test.jpg")));
        assert!(is_supported(Path::new("test.JPG")));
        assert!(is_supported(Path::new("test.jpeg")));
        assert!(is_supported(Path::new("test.png")));
        assert!(is_supported(Path::new("test.webp")));
        assert!(is_supported(Path::new("scan.TIF")));
        assert!(!is_supported(Path::new("test.txt")));
        assert!(!is_supported(Path::new("test.pdf")));
        assert!(!is_supported(Path::new("jpg")));
    }

    #[test]
    fn test_walk_top_level_only_by_default() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("a.JPG"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("nested/c.gif"));

        let found: Vec<PathBuf> = FileDiscovery::new(false).walk(dir.path()).unwrap().collect();
        assert_eq!(names(&found, dir.path()), vec!["a.JPG", "b.png"]);
    }

    #[test]
    fn test_walk_recursive_descends() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("nested/deeper/c.gif"));

        let found: Vec<PathBuf> = FileDiscovery::new(true).walk(dir.path()).unwrap().collect();
        assert_eq!(names(&found, dir.path()), vec!["a.jpg", "nested/deeper/c.gif"]);
    }

    #[test]
    fn test_walk_skips_hidden_and_excluded() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join(".hidden.jpg"));
        touch(&dir.path().join(".cache/b.jpg"));
        touch(&dir.path().join("webp/a.webp"));

        let discovery = FileDiscovery::new(true).exclude(&dir.path().join("webp"));
        let found: Vec<PathBuf> = discovery.walk(dir.path()).unwrap().collect();
        assert_eq!(names(&found, dir.path()), vec!["a.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_follows_file_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("plain.jpg"));
        touch(&dir.path().join("other/real.jpg"));
        std::os::unix::fs::symlink(
            dir.path().join("other/real.jpg"),
            dir.path().join("link.jpg"),
        )
        .unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.jpg"), dir.path().join("dangling.jpg"))
            .unwrap();

        let found: Vec<PathBuf> = FileDiscovery::new(false).walk(dir.path()).unwrap().collect();
        assert_eq!(names(&found, dir.path()), vec!["link.jpg", "plain.jpg"]);
    }

    #[test]
    fn test_walk_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FileDiscovery::new(false).walk(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_walk_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = FileDiscovery::new(false).walk(&missing).err().unwrap();
        assert!(matches!(err, DiscoveryError::NotFound(p) if p == missing));
    }

    #[test]
    fn test_walk_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        touch(&file);
        let err = FileDiscovery::new(false).walk(&file).err().unwrap();
        assert!(matches!(err, DiscoveryError::NotADirectory(_)));
    }
}
