//! Configuration management for docdump
//!
//! This module handles loading and validating configuration from:
//! - A configuration file (TOML format)
//! - Command-line arguments (applied by the `cli` module)
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::store::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Export/restore transfer configuration
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Retry policy used while the bulk upserter warms up
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connect and server selection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Transfer configuration shared by export and restore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Documents per bulk-upsert call during restore
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum documents buffered per page during export
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Show a progress bar on stderr
    #[serde(default = "default_progress_bar")]
    pub progress_bar: bool,
}

/// Initialization-phase retry configuration
///
/// The transfer phase always runs with no client-level retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts on throttled requests
    #[serde(default = "default_init_max_attempts")]
    pub init_max_attempts: u32,

    /// Maximum cumulative wait in seconds across retries
    #[serde(default = "default_init_max_wait_secs")]
    pub init_max_wait_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_timeout() -> u64 {
    30
}

fn default_app_name() -> String {
    "docdump".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_page_size() -> u32 {
    10
}

fn default_progress_bar() -> bool {
    true
}

fn default_init_max_attempts() -> u32 {
    9
}

fn default_init_max_wait_secs() -> u64 {
    30
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            app_name: default_app_name(),
        }
    }
}

impl ConnectionConfig {
    /// Connect and server selection timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            page_size: default_page_size(),
            progress_bar: default_progress_bar(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            init_max_attempts: default_init_max_attempts(),
            init_max_wait_secs: default_init_max_wait_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// With an explicit path the file must exist. Without one the default
    /// path is tried and defaults are used when it is absent.
    ///
    /// # Arguments
    /// * `path` - Optional explicit configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - `~/.docdump/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docdump")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.transfer.batch_size == 0 {
            return Err(invalid("transfer.batch_size", 0).into());
        }
        if self.transfer.page_size == 0 {
            return Err(invalid("transfer.page_size", 0).into());
        }
        if self.connection.timeout == 0 {
            return Err(invalid("connection.timeout", 0).into());
        }
        Ok(())
    }

    /// Retry policy for the bulk upserter's initialization phase
    pub fn initialization_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.init_max_attempts,
            Duration::from_secs(self.retry.init_max_wait_secs),
        )
    }
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
