//! Configuration module for Nimbus.

use serde::Deserialize;
use std::path::Path;

use crate::{NimbusError, Result};

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory that destination paths are resolved against.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Maximum declared upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Space dedicated to stored files, in megabytes.
    #[serde(default = "default_dedicated_space")]
    pub dedicated_space_mb: u64,
}

fn default_storage_path() -> String {
    "data/files".to_string()
}

fn default_max_upload_size() -> u64 {
    1024
}

fn default_dedicated_space() -> u64 {
    10 * 1024
}

impl StorageConfig {
    /// Maximum declared upload size in bytes.
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }

    /// Dedicated space in bytes.
    pub fn dedicated_space_bytes(&self) -> u64 {
        self.dedicated_space_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_upload_size_mb: default_max_upload_size(),
            dedicated_space_mb: default_dedicated_space(),
        }
    }
}

/// Upload engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Number of uploads allowed to write to disk at the same time.
    #[serde(default = "default_max_concurrent_writers")]
    pub max_concurrent_writers: usize,
    /// Buffer size of the upload event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_concurrent_writers() -> usize {
    1
}

fn default_event_capacity() -> usize {
    64
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_writers: default_max_concurrent_writers(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty disables file output.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/nimbus.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// File storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload engine configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(NimbusError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| NimbusError::Config(format!("parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `NIMBUS_STORAGE_PATH`: Override the storage base directory
    /// - `NIMBUS_MAX_CONCURRENT_WRITERS`: Override the writer ceiling
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("NIMBUS_STORAGE_PATH") {
            if !path.is_empty() {
                self.storage.path = path;
            }
        }

        if let Ok(writers) = std::env::var("NIMBUS_MAX_CONCURRENT_WRITERS") {
            if !writers.is_empty() {
                self.upload.max_concurrent_writers = writers.parse().map_err(|e| {
                    NimbusError::Config(format!("NIMBUS_MAX_CONCURRENT_WRITERS: {e}"))
                })?;
            }
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_concurrent_writers == 0 {
            return Err(NimbusError::Validation(
                "upload.max_concurrent_writers must be at least 1".to_string(),
            ));
        }
        if self.storage.max_upload_size_mb == 0 {
            return Err(NimbusError::Validation(
                "storage.max_upload_size_mb must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.path, "data/files");
        assert_eq!(config.storage.max_upload_size_mb, 1024);
        assert_eq!(config.storage.dedicated_space_mb, 10 * 1024);

        assert_eq!(config.upload.max_concurrent_writers, 1);
        assert_eq!(config.upload.event_capacity, 64);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/nimbus.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[storage]
path = "custom/files"
max_upload_size_mb = 20
dedicated_space_mb = 100

[upload]
max_concurrent_writers = 4
event_capacity = 8

[logging]
level = "debug"
file = ""
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.storage.path, "custom/files");
        assert_eq!(config.storage.max_upload_size_bytes(), 20 * 1024 * 1024);
        assert_eq!(config.storage.dedicated_space_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.upload.max_concurrent_writers, 4);
        assert_eq!(config.upload.event_capacity, 8);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_empty());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[upload]
max_concurrent_writers = 2
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.upload.max_concurrent_writers, 2);
        // Defaults
        assert_eq!(config.upload.event_capacity, 64);
        assert_eq!(config.storage.path, "data/files");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        if let Err(NimbusError::Config(msg)) = result {
            assert!(msg.contains("parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(NimbusError::Io(_))));
    }

    #[test]
    fn test_validate_rejects_zero_writers() {
        let mut config = Config::default();
        config.upload.max_concurrent_writers = 0;
        assert!(matches!(config.validate(), Err(NimbusError::Validation(_))));

        config.upload.max_concurrent_writers = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_upload_size() {
        let mut config = Config::default();
        config.storage.max_upload_size_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_env_overrides() {
        let original_path = std::env::var("NIMBUS_STORAGE_PATH").ok();
        let original_writers = std::env::var("NIMBUS_MAX_CONCURRENT_WRITERS").ok();

        std::env::set_var("NIMBUS_STORAGE_PATH", "/srv/nimbus");
        std::env::set_var("NIMBUS_MAX_CONCURRENT_WRITERS", "3");

        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.storage.path, "/srv/nimbus");
        assert_eq!(config.upload.max_concurrent_writers, 3);

        std::env::set_var("NIMBUS_MAX_CONCURRENT_WRITERS", "many");
        assert!(matches!(
            config.apply_env_overrides(),
            Err(NimbusError::Config(_))
        ));

        // Restore original
        match original_path {
            Some(val) => std::env::set_var("NIMBUS_STORAGE_PATH", val),
            None => std::env::remove_var("NIMBUS_STORAGE_PATH"),
        }
        match original_writers {
            Some(val) => std::env::set_var("NIMBUS_MAX_CONCURRENT_WRITERS", val),
            None => std::env::remove_var("NIMBUS_MAX_CONCURRENT_WRITERS"),
        }
    }
}
