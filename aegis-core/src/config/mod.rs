//! Configuration for the Aegis diagnostics core
//!
//! Every section has serde defaults, so a partial TOML document or an empty
//! environment yields a usable configuration. Durations are written in
//! humantime form (`"250ms"`, `"1m"`) in files and as milliseconds in
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AegisError, AegisResult};
use crate::patterns::{CircuitBreakerConfig, RetryConfig};

pub mod defaults;
pub mod detection;
pub mod logging;
pub mod manager;

pub use defaults::*;
pub use detection::PatternConfig;
pub use logging::LoggerConfig;
pub use manager::{ManagerConfig, ManagerConfigUpdate};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AegisConfig {
    /// Error manager configuration
    pub manager: ManagerConfig,

    /// Structured logger configuration
    pub logger: LoggerConfig,

    /// Default retry policy
    pub retry: RetryConfig,

    /// Default circuit breaker policy
    pub circuit_breaker: CircuitBreakerConfig,

    /// Aggregation and pattern detection
    pub patterns: PatternConfig,
}

impl AegisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `AEGIS_*` environment variables
    pub fn from_env() -> AegisResult<Self> {
        let mut config = Self {
            manager: ManagerConfig::from_env()?,
            logger: LoggerConfig::from_env()?,
            patterns: PatternConfig::from_env()?,
            ..Default::default()
        };

        if let Ok(attempts) = std::env::var("AEGIS_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = attempts.parse().map_err(|_| {
                AegisError::configuration("retry", "Invalid AEGIS_RETRY_MAX_ATTEMPTS")
            })?;
        }
        config.retry.base_delay =
            parse_duration_from_env("AEGIS_RETRY_BASE_DELAY_MS", config.retry.base_delay);
        if let Ok(multiplier) = std::env::var("AEGIS_RETRY_MULTIPLIER") {
            config.retry.backoff_multiplier = multiplier.parse().map_err(|_| {
                AegisError::configuration("retry", "Invalid AEGIS_RETRY_MULTIPLIER")
            })?;
        }

        if let Ok(threshold) = std::env::var("AEGIS_BREAKER_FAILURE_THRESHOLD") {
            config.circuit_breaker.failure_threshold = threshold.parse().map_err(|_| {
                AegisError::configuration(
                    "circuit_breaker",
                    "Invalid AEGIS_BREAKER_FAILURE_THRESHOLD",
                )
            })?;
        }
        config.circuit_breaker.reset_timeout = parse_duration_from_env(
            "AEGIS_BREAKER_RESET_TIMEOUT_MS",
            config.circuit_breaker.reset_timeout,
        );
        if let Ok(throughput) = std::env::var("AEGIS_BREAKER_MINIMUM_THROUGHPUT") {
            config.circuit_breaker.minimum_throughput = throughput.parse().map_err(|_| {
                AegisError::configuration(
                    "circuit_breaker",
                    "Invalid AEGIS_BREAKER_MINIMUM_THROUGHPUT",
                )
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> AegisResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> AegisResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            AegisError::configuration("file", format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> AegisResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AegisError::configuration("toml", e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> AegisResult<()> {
        self.manager.validate()?;
        self.logger.validate()?;
        self.patterns.validate()?;
        validate_retry(&self.retry)?;
        validate_circuit_breaker(&self.circuit_breaker)?;
        Ok(())
    }
}

fn validate_retry(retry: &RetryConfig) -> AegisResult<()> {
    if retry.max_attempts == 0 {
        return Err(AegisError::configuration(
            "retry",
            "max_attempts must be at least 1",
        ));
    }
    if retry.backoff_multiplier.is_nan() || retry.backoff_multiplier < 1.0 {
        return Err(AegisError::configuration(
            "retry",
            "backoff_multiplier must be >= 1.0",
        ));
    }
    Ok(())
}

fn validate_circuit_breaker(breaker: &CircuitBreakerConfig) -> AegisResult<()> {
    if !(0.0..=1.0).contains(&breaker.failure_threshold) {
        return Err(AegisError::configuration(
            "circuit_breaker",
            "failure_threshold must be between 0.0 and 1.0",
        ));
    }
    if breaker.minimum_throughput == 0 {
        return Err(AegisError::configuration(
            "circuit_breaker",
            "minimum_throughput must be at least 1",
        ));
    }
    Ok(())
}

/// Builder for AegisConfig
pub struct AegisConfigBuilder {
    config: AegisConfig,
}

impl AegisConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AegisConfig::default(),
        }
    }

    pub fn manager(mut self, manager: ManagerConfig) -> Self {
        self.config.manager = manager;
        self
    }

    pub fn logger(mut self, logger: LoggerConfig) -> Self {
        self.config.logger = logger;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn circuit_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = breaker;
        self
    }

    pub fn patterns(mut self, patterns: PatternConfig) -> Self {
        self.config.patterns = patterns;
        self
    }

    pub fn build(self) -> AegisResult<AegisConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for AegisConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for environment parsing
pub(crate) fn parse_duration_from_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

pub(crate) fn parse_bool_from_env(key: &str) -> AegisResult<Option<bool>> {
    match std::env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(AegisError::configuration("env", format!("Invalid {}", key))),
        },
        Err(_) => Ok(None),
    }
}
