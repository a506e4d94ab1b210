//! Configuration file resolution and loading
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. `JITTERPLAY_CONFIG` environment variable
//! 3. Per-user config file (`<config_dir>/jitterplay/config.toml`)
//! 4. Compiled defaults (no file)
//!
//! A config file that cannot be found falls back to defaults; a config file that exists but
//! cannot be parsed is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "JITTERPLAY_CONFIG";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. "info", "jitterplay=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Resolve which config file to load, if any
///
/// Returns `None` when neither the CLI, the environment nor the per-user location names an
/// existing file.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument (must exist; a typo should surface as an error later)
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config file
    let user_config = default_config_path()?;
    if user_config.exists() {
        Some(user_config)
    } else {
        debug!("No config file at {}", user_config.display());
        None
    }
}

/// Per-user config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("jitterplay").join("config.toml"))
}

/// Load a TOML config file into `T`, or `T::default()` when no file is given
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("Using compiled configuration defaults");
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        warn!("Failed to read config file {}: {}", path.display(), e);
        Error::Config(format!("cannot read {}: {}", path.display(), e))
    })?;

    let config = toml::from_str::<T>(&content)?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        logging: LoggingConfig,
        value: u32,
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let loaded: Sample = load_toml_config(None).unwrap();
        assert_eq!(loaded, Sample::default());
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "value = 7\n").unwrap();

        let loaded: Sample = load_toml_config(Some(&path)).unwrap();
        assert_eq!(loaded.value, 7);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "value = [unterminated").unwrap();

        let result: Result<Sample> = load_toml_config(Some(&path));
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_cli_argument_wins() {
        let path = PathBuf::from("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(&path)), Some(path));
    }
}
