//! The `webpify config` command for configuration management.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use webpify_core::Config;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration (file, environment and defaults merged)
    Show,

    /// Show the settings file in use, or where `init` would create one
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::resolve(config_path)?;
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", settings_path(config_path).display());
        }

        ConfigCommand::Init { force } => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            init_file(&path, force)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn settings_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(Config::locate)
        .unwrap_or_else(Config::default_path)
}

/// Write the default settings to `path`, refusing to clobber unless `force`.
fn init_file(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = if is_json(path) {
        serde_json::to_string_pretty(&Config::default())?
    } else {
        Config::default().to_toml()?
    };
    std::fs::write(path, content)?;
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        init_file(&path, false).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.quality, Config::default().quality);
        assert_eq!(config.thumb_size, Config::default().thumb_size);
    }

    #[test]
    fn test_init_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        init_file(&path, false).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.trim_start().starts_with('{'));
        assert_eq!(Config::from_file(&path).unwrap().max_workers, 4);
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "quality = 55\n").unwrap();

        let err = init_file(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "quality = 55\n");

        init_file(&path, true).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().quality, 100);
    }

    #[test]
    fn test_settings_path_prefers_explicit() {
        let explicit = Path::new("custom/settings.json");
        assert_eq!(settings_path(Some(explicit)), PathBuf::from("custom/settings.json"));
    }
}
