//! Scorecast CLI Configuration Management
//!
//! Configuration is read from an optional TOML file given with `--config`.
//! Every section and key is optional; missing values fall back to defaults.
//!
//! ```toml
//! [client]
//! accept_version = "1.2"
//! virtual_host = "stomp.cs.bgu.ac.il"
//! attach_file_header = true
//!
//! [logging]
//! level = "warn"
//!
//! [shell]
//! prompt = "> "
//! ```

use std::path::Path;

use scorecast_runtime::ClientConfig;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the Scorecast CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Broker session settings
    pub client: ClientConfig,

    pub logging: LoggingConfig,

    pub shell: ShellConfig,
}

/// Diagnostic log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`
    pub level: String,
}

/// Interactive shell settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Printed before each command; empty disables the prompt
    pub prompt: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileSystem(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_toml(&text)
            .map_err(|e| ConfigError::Loading(format!("Failed to load from {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text without validating it
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.accept_version.trim().is_empty() {
            return Err(ConfigError::Validation(
                "accept_version must not be empty".to_string(),
            ));
        }

        if self.client.virtual_host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "virtual_host must not be empty".to_string(),
            ));
        }

        self.log_level()?;
        Ok(())
    }

    /// Configured diagnostic log level
    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        self.logging
            .level
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Unknown log level: {}", self.logging.level)))
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
