//! Environment variable overlay.
//!
//! Every config key can be overridden by its upper-case name (`MAX_WORKERS`)
//! or by a prefixed form: `CONVERT_MAX_WORKERS`, or `WEBPIFY_MAX_WORKERS`.
//! Lookup order is bare name, then `CONVERT_`, then `WEBPIFY_`.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

use super::{Config, ThumbSize};

/// Prefix for namespaced environment overrides.
pub const ENV_PREFIX: &str = "CONVERT_";

/// Lower-priority alias of [`ENV_PREFIX`].
pub const ENV_PREFIX_ALIAS: &str = "WEBPIFY_";

impl Config {
    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    pub(crate) fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvLookup { lookup };

        if let Some(v) = env.get("input_folder") {
            self.input_folder = PathBuf::from(v.value);
        }
        if let Some(v) = env.get("output_webp_folder") {
            self.output_webp_folder = PathBuf::from(v.value);
        }
        if let Some(v) = env.get("output_thumb_folder") {
            self.output_thumb_folder = PathBuf::from(v.value);
        }
        if let Some(v) = env.get("quality") {
            self.quality = v.number()?;
        }
        if let Some(v) = env.get("method") {
            self.method = v.number()?;
        }
        if let Some(v) = env.get("thumb_size") {
            self.thumb_size = v.thumb_size()?;
        }
        if let Some(v) = env.get("max_workers") {
            self.max_workers = v.number()?;
        }
        if let Some(v) = env.get("preserve_exif") {
            self.preserve_exif = v.flag()?;
        }
        if let Some(v) = env.get("preserve_icc") {
            self.preserve_icc = v.flag()?;
        }
        if let Some(v) = env.get("preserve_alpha") {
            self.preserve_alpha = v.flag()?;
        }
        if let Some(v) = env.get("force_lossless_for_alpha") {
            self.force_lossless_for_alpha = v.flag()?;
        }
        if let Some(v) = env.get("skip_existing") {
            self.skip_existing = v.flag()?;
        }
        if let Some(v) = env.get("recursive") {
            self.recursive = v.flag()?;
        }
        if let Some(v) = env.get("file_timeout_secs") {
            self.file_timeout_secs = v.number()?;
        }
        if let Some(v) = env.get("queue_size") {
            self.queue_size = v.number()?;
        }
        if let Some(v) = env.get("log_file") {
            self.log_file = PathBuf::from(v.value);
        }
        if let Some(v) = env.get("failed_list_file") {
            self.failed_list_file = PathBuf::from(v.value);
        }
        Ok(())
    }
}

struct EnvLookup<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvLookup<F> {
    fn get(&self, key: &str) -> Option<EnvValue> {
        let bare = key.to_uppercase();
        let prefixed = format!("{ENV_PREFIX}{bare}");
        let alias = format!("{ENV_PREFIX_ALIAS}{bare}");
        [bare, prefixed, alias].into_iter().find_map(|name| {
            (self.lookup)(&name).map(|value| EnvValue { name, value })
        })
    }
}

/// A raw environment value together with the variable it came from.
struct EnvValue {
    name: String,
    value: String,
}

impl EnvValue {
    fn invalid(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::EnvError {
            key: self.name.clone(),
            value: self.value.clone(),
            message: message.into(),
        }
    }

    fn number<T>(&self) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.value
            .trim()
            .parse()
            .map_err(|e: T::Err| self.invalid(e.to_string()))
    }

    fn flag(&self) -> Result<bool, ConfigError> {
        match self.value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Ok(true),
            "0" | "false" | "no" | "n" | "off" | "" => Ok(false),
            _ => Err(self.invalid("expected a boolean (true/false, yes/no, 1/0, on/off)")),
        }
    }

    /// Accepts `400,300`, `400x300` or a JSON array `[400, 300]`.
    fn thumb_size(&self) -> Result<ThumbSize, ConfigError> {
        let raw = self.value.trim();
        if raw.starts_with('[') {
            let [width, height]: [u32; 2] =
                serde_json::from_str(raw).map_err(|e| self.invalid(e.to_string()))?;
            return Ok(ThumbSize::new(width, height));
        }

        let parts: Vec<&str> = raw
            .split(|c: char| c == ',' || c == 'x' || c == 'X')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [w, h] => {
                let width = w.parse().map_err(|_| self.invalid("width is not a number"))?;
                let height = h.parse().map_err(|_| self.invalid("height is not a number"))?;
                Ok(ThumbSize::new(width, height))
            }
            _ => Err(self.invalid("expected WIDTH,HEIGHT")),
        }
    }
}
