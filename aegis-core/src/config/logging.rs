//! Structured logger configuration

use super::defaults::*;
use super::parse_duration_from_env;
use crate::error::{AegisError, AegisResult};
use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Structured logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum level that is stored and delivered
    pub level: LogLevel,

    /// Entries per delivered batch
    pub batch_size: usize,

    /// Maximum time the first queued entry waits for delivery
    #[serde(with = "humantime_serde")]
    pub batch_timeout: Duration,

    /// Entries retained in the in-memory history
    pub max_entries: usize,

    /// Case-insensitive substrings that mark a context key as sensitive
    pub sensitive_keys: Vec<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            batch_size: DEFAULT_LOG_BATCH_SIZE,
            batch_timeout: duration_ms(DEFAULT_LOG_BATCH_TIMEOUT_MS),
            max_entries: DEFAULT_LOG_MAX_ENTRIES,
            sensitive_keys: DEFAULT_SENSITIVE_KEYS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LoggerConfig {
    /// Load logger configuration from environment variables
    pub fn from_env() -> AegisResult<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("AEGIS_LOG_LEVEL") {
            config.level = level.parse()?;
        }

        if let Ok(size) = std::env::var("AEGIS_LOG_BATCH_SIZE") {
            config.batch_size = size.parse().map_err(|_| {
                AegisError::configuration("logger", "Invalid AEGIS_LOG_BATCH_SIZE")
            })?;
        }

        if let Ok(max) = std::env::var("AEGIS_LOG_MAX_ENTRIES") {
            config.max_entries = max.parse().map_err(|_| {
                AegisError::configuration("logger", "Invalid AEGIS_LOG_MAX_ENTRIES")
            })?;
        }

        config.batch_timeout =
            parse_duration_from_env("AEGIS_LOG_BATCH_TIMEOUT_MS", config.batch_timeout);

        Ok(config)
    }

    pub fn validate(&self) -> AegisResult<()> {
        if self.batch_size == 0 {
            return Err(AegisError::configuration(
                "logger",
                "batch_size must be greater than zero",
            ));
        }
        if self.max_entries == 0 {
            return Err(AegisError::configuration(
                "logger",
                "max_entries must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Copy with zero sizes replaced by defaults
    pub(crate) fn normalized(mut self) -> Self {
        if self.batch_size == 0 {
            warn!(default = DEFAULT_LOG_BATCH_SIZE, "zero log batch size, using default");
            self.batch_size = DEFAULT_LOG_BATCH_SIZE;
        }
        if self.max_entries == 0 {
            warn!(default = DEFAULT_LOG_MAX_ENTRIES, "zero log history, using default");
            self.max_entries = DEFAULT_LOG_MAX_ENTRIES;
        }
        self
    }
}
