//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    ///
    /// Each output folder must differ from `input_folder`. The two output
    /// folders may be the same, since thumbnails carry a `_thumb` suffix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, path) in [
            ("input_folder", &self.input_folder),
            ("output_webp_folder", &self.output_webp_folder),
            ("output_thumb_folder", &self.output_thumb_folder),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{key} is required (set it in the settings file or via the environment)"
                )));
            }
        }
        if self.output_webp_folder == self.input_folder
            || self.output_thumb_folder == self.input_folder
        {
            return Err(ConfigError::ValidationError(
                "output folders must differ from input_folder".into(),
            ));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::ValidationError(
                "quality must be between 1 and 100".into(),
            ));
        }
        if self.method > 6 {
            return Err(ConfigError::ValidationError(
                "method must be between 0 and 6".into(),
            ));
        }
        if self.thumb_size.width == 0 || self.thumb_size.height == 0 {
            return Err(ConfigError::ValidationError(
                "thumb_size dimensions must be > 0".into(),
            ));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::ValidationError(
                "max_workers must be >= 1".into(),
            ));
        }
        if self.file_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "file_timeout_secs must be > 0".into(),
            ));
        }
        if self.queue_size == 0 {
            return Err(ConfigError::ValidationError(
                "queue_size must be > 0".into(),
            ));
        }
        if self.failed_list_file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "failed_list_file must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config {
            input_folder: PathBuf::from("in"),
            output_webp_folder: PathBuf::from("out/webp"),
            output_thumb_folder: PathBuf::from("out/thumbs"),
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_requires_folders() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("input_folder is required"));
    }

    #[test]
    fn test_validate_rejects_quality_out_of_range() {
        let mut config = valid_config();
        config.quality = 0;
        assert!(config.validate().unwrap_err().to_string().contains("quality"));

        config.quality = 101;
        assert!(config.validate().unwrap_err().to_string().contains("quality"));
    }

    #[test]
    fn test_validate_rejects_method_out_of_range() {
        let mut config = valid_config();
        config.method = 7;
        assert!(config.validate().unwrap_err().to_string().contains("method"));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = valid_config();
        config.max_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn test_validate_rejects_zero_thumb_dimension() {
        let mut config = valid_config();
        config.thumb_size.height = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thumb_size"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = valid_config();
        config.file_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("file_timeout_secs"));
    }

    #[test]
    fn test_validate_rejects_output_equal_to_input() {
        let mut config = valid_config();
        config.output_thumb_folder = config.input_folder.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));

        let mut config = valid_config();
        config.output_webp_folder = config.input_folder.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_validate_allows_shared_output_folder() {
        let mut config = valid_config();
        config.output_thumb_folder = config.output_webp_folder.clone();
        assert!(config.validate().is_ok());
    }
}
