//! Configuration management for Cynosure
//!
//! Configuration is read from `~/.cyno/config` (JSON5) with environment
//! variable overrides for logging.

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::error::{CynoError, Result};

impl Config {
    /// Returns the Cynosure configuration directory path (~/.cyno)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cyno")
    }

    /// Returns the path to the config file (~/.cyno/config)
    pub fn path() -> PathBuf {
        Self::dir().join("config")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// A missing file yields the default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::parse(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse JSON5 config text.
    pub fn parse(content: &str) -> Result<Self> {
        json5::from_str(content)
            .map_err(|e| CynoError::Config(format!("failed to parse config: {}", e)))
    }

    /// Parse JSON5 config text into an untyped value, for field validation.
    pub fn parse_raw(content: &str) -> Result<serde_json::Value> {
        json5::from_str(content)
            .map_err(|e| CynoError::Config(format!("failed to parse config: {}", e)))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported: `CYNOSURE_LOG_LEVEL`, `CYNOSURE_LOG_FORMAT`.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CYNOSURE_LOG_LEVEL") {
            if !val.trim().is_empty() {
                self.logging.level = val;
            }
        }
        if let Ok(val) = std::env::var("CYNOSURE_LOG_FORMAT") {
            match val.to_ascii_lowercase().as_str() {
                "pretty" => self.logging.format = LogFormat::Pretty,
                "component" => self.logging.format = LogFormat::Component,
                "json" => self.logging.format = LogFormat::Json,
                _ => {}
            }
        }
    }
}
