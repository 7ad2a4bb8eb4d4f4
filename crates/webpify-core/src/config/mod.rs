//! Configuration management for webpify.
//!
//! Settings come from three layers, highest precedence first:
//!
//! 1. environment variables (`QUALITY`, or the prefixed `CONVERT_QUALITY`)
//! 2. a settings file (`settings.toml` / `settings.json`, or the platform
//!    config file)
//! 3. built-in defaults
//!
//! The merged result is validated once; any violation is a fatal
//! [`ConfigError`] reported before a single file is touched.

mod env;
mod types;
mod validate;

pub use env::{ENV_PREFIX, ENV_PREFIX_ALIAS};
pub use types::*;

use crate::codec::EncodeOptions;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings files looked up in the working directory, in order.
const LOCAL_CONFIG_FILES: [&str; 2] = ["settings.toml", "settings.json"];

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder scanned for source images
    pub input_folder: PathBuf,

    /// Where full-size WebP files are written
    pub output_webp_folder: PathBuf,

    /// Where WebP thumbnails are written
    pub output_thumb_folder: PathBuf,

    /// Lossy encoding quality, 1..=100
    pub quality: u32,

    /// libwebp effort level, 0 (fast) ..= 6 (slowest, smallest)
    pub method: u32,

    /// Thumbnail bounding box
    pub thumb_size: ThumbSize,

    /// Number of parallel conversion workers
    pub max_workers: usize,

    /// Copy EXIF metadata into the WebP output
    pub preserve_exif: bool,

    /// Copy the ICC color profile into the WebP output
    pub preserve_icc: bool,

    /// Keep the alpha channel of transparent sources
    pub preserve_alpha: bool,

    /// Encode transparent sources losslessly
    pub force_lossless_for_alpha: bool,

    /// Skip sources whose outputs are newer than the source
    pub skip_existing: bool,

    /// Descend into sub-folders of the input folder
    pub recursive: bool,

    /// Per-file time budget in seconds
    pub file_timeout_secs: u64,

    /// Tasks buffered between the planner and the workers
    pub queue_size: usize,

    /// Log file written alongside console output
    pub log_file: PathBuf,

    /// Report listing files that failed to convert
    pub failed_list_file: PathBuf,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::new(),
            output_webp_folder: PathBuf::new(),
            output_thumb_folder: PathBuf::new(),
            quality: 100,
            method: 6,
            thumb_size: ThumbSize::default(),
            max_workers: 4,
            preserve_exif: true,
            preserve_icc: true,
            preserve_alpha: true,
            force_lossless_for_alpha: true,
            skip_existing: true,
            recursive: false,
            file_timeout_secs: 300,
            queue_size: 64,
            log_file: PathBuf::from("convert_images.log"),
            failed_list_file: PathBuf::from("failed_files.txt"),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load, overlay the environment and validate.
    ///
    /// Uses the first settings file found by [`Config::locate`], or defaults
    /// if there is none.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::resolve(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file, overlay the environment and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::resolve(Some(path))?;
        config.validate()?;
        Ok(config)
    }

    /// Merge file, environment and defaults without validating.
    ///
    /// Callers that layer further overrides (e.g. command-line flags) on top
    /// must call [`Config::validate`] themselves afterwards.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path.map(Path::to_path_buf).or_else(Self::locate) {
            Some(path) => {
                tracing::debug!("Loading settings from {:?}", path);
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.expand_paths();
        Ok(config)
    }

    /// Parse a settings file. JSON is used for `.json`, TOML otherwise.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        Ok(config)
    }

    /// Find the settings file to use, if any.
    pub fn locate() -> Option<PathBuf> {
        LOCAL_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .chain(std::iter::once(Self::default_path()))
            .find(|path| path.is_file())
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.webpify.webpify/config.toml
    /// - Linux: ~/.config/webpify/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\webpify\config\config.toml
    ///
    /// Falls back to ~/.webpify/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "webpify", "webpify")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".webpify").join("config.toml")
            })
    }

    /// Expand `~` in every configured path.
    pub fn expand_paths(&mut self) {
        for path in [
            &mut self.input_folder,
            &mut self.output_webp_folder,
            &mut self.output_thumb_folder,
            &mut self.log_file,
            &mut self.failed_list_file,
        ] {
            *path = expand_tilde(path);
        }
    }

    /// Encoder settings handed to the codec for every file.
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            // Validated ranges fit in u8
            quality: self.quality.min(100) as u8,
            method: self.method.min(6) as u8,
            preserve_exif: self.preserve_exif,
            preserve_icc: self.preserve_icc,
            preserve_alpha: self.preserve_alpha,
            force_lossless_for_alpha: self.force_lossless_for_alpha,
        }
    }

    /// Per-file timeout as a `Duration`.
    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.quality, 100);
        assert_eq!(config.method, 6);
        assert_eq!(config.thumb_size, ThumbSize::new(400, 400));
        assert_eq!(config.max_workers, 4);
        assert!(config.skip_existing);
        assert!(!config.recursive);
        assert_eq!(config.failed_list_file, PathBuf::from("failed_files.txt"));
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("quality = 100"));
        assert!(toml.contains("[logging]"));
    }

    #[test]
    fn test_from_file_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "input_folder = \"in\"\n\
             output_webp_folder = \"out\"\n\
             output_thumb_folder = \"thumbs\"\n\
             quality = 80\n\
             thumb_size = [200, 150]\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.input_folder, PathBuf::from("in"));
        assert_eq!(config.quality, 80);
        assert_eq!(config.thumb_size, ThumbSize::new(200, 150));
        // Unset keys keep their defaults
        assert_eq!(config.method, 6);
    }

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "input_folder": "images",
                "output_webp_folder": "webp",
                "output_thumb_folder": "thumbs",
                "max_workers": 2,
                "skip_existing": false
            }"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.max_workers, 2);
        assert!(!config.skip_existing);
        assert_eq!(config.output_thumb_folder, PathBuf::from("thumbs"));
    }

    #[test]
    fn test_from_file_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "quality = [not toml").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_encode_options_mirror_config() {
        let config = Config {
            quality: 80,
            method: 4,
            preserve_exif: false,
            ..Config::default()
        };
        let options = config.encode_options();
        assert_eq!(options.quality, 80);
        assert_eq!(options.method, 4);
        assert!(!options.preserve_exif);
        assert!(options.preserve_icc);
    }

    #[test]
    fn test_expand_paths_leaves_relative_paths_alone() {
        let mut config = Config {
            input_folder: PathBuf::from("photos/raw"),
            ..Config::default()
        };
        config.expand_paths();
        assert_eq!(config.input_folder, PathBuf::from("photos/raw"));
    }
}
