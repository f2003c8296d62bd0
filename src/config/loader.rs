use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::{ActionMode, Overflow, StoreConfig};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl StoreConfig {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/mvi-store/store.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("mvi-store").join("store.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// - If the file doesn't exist, returns `StoreConfig::default()`.
    /// - Otherwise behaves like [`StoreConfig::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(StoreConfig::default());
        }

        Self::load_from(&path)
    }

    /// Loads, parses and validates the TOML file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: StoreConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The store name is not blank
    /// - Channel and recording capacities are non-zero
    /// - `overflow = "block"` is only used with a bounded queue
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Store name must not be empty".to_string(),
            });
        }

        if self.actions.capacity == Some(0) {
            return Err(ConfigError::ValidationError {
                message: "actions.capacity must be greater than zero".to_string(),
            });
        }

        if self.actions.overflow == Overflow::Block {
            if self.actions.mode == ActionMode::Broadcast {
                return Err(ConfigError::ValidationError {
                    message: "overflow = \"block\" is not supported by broadcast channels"
                        .to_string(),
                });
            }
            if self.actions.capacity.is_none() {
                return Err(ConfigError::ValidationError {
                    message: "overflow = \"block\" requires actions.capacity".to_string(),
                });
            }
        }

        if self.recording.enabled && self.recording.capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "recording.capacity must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ActionChannelConfig, LogLevel};
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = write_config("");
        let config = StoreConfig::load_from(file.path()).expect("load");
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.actions, ActionChannelConfig::unbounded());
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn parses_full_config() {
        let file = write_config(
            r#"
name = "checkout"

[actions]
mode = "queue"
capacity = 8
overflow = "block"

[recording]
enabled = true
capacity = 25

[logging]
level = "info"
"#,
        );
        let config = StoreConfig::load_from(file.path()).expect("load");
        assert_eq!(config.name, "checkout");
        assert_eq!(config.actions, ActionChannelConfig::bounded(8, Overflow::Block));
        assert!(config.recording.enabled);
        assert_eq!(config.recording.capacity, 25);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn broadcast_block_is_rejected() {
        let file = write_config(
            r#"
[actions]
mode = "broadcast"
capacity = 4
overflow = "block"
"#,
        );
        let err = StoreConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn unbounded_block_is_rejected() {
        let mut config = StoreConfig::default();
        config.actions.overflow = Overflow::Block;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = StoreConfig::default();
        config.actions.capacity = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let file = write_config("name = [");
        let err = StoreConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = StoreConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
