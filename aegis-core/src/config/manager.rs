//! Error manager configuration

use super::defaults::*;
use super::{parse_bool_from_env, parse_duration_from_env};
use crate::error::{AegisError, AegisResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Session-wide error manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// When false, reports are dropped without touching the buffer
    pub enabled: bool,

    /// Ring buffer capacity
    pub max_errors_per_session: usize,

    /// Window in which identical messages are suppressed
    #[serde(with = "humantime_serde")]
    pub reporting_throttle: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_errors_per_session: DEFAULT_MAX_ERRORS_PER_SESSION,
            reporting_throttle: duration_ms(DEFAULT_REPORTING_THROTTLE_MS),
        }
    }
}

/// Partial update merged by [`ErrorManager::configure`](crate::manager::ErrorManager::configure).
///
/// Numeric fields are signed so that nonsensical values can be expressed and
/// clamped instead of rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfigUpdate {
    pub enabled: Option<bool>,
    pub max_errors_per_session: Option<i64>,
    pub reporting_throttle_ms: Option<i64>,
}

impl ManagerConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn max_errors_per_session(mut self, cap: i64) -> Self {
        self.max_errors_per_session = Some(cap);
        self
    }

    pub fn reporting_throttle_ms(mut self, ms: i64) -> Self {
        self.reporting_throttle_ms = Some(ms);
        self
    }
}

impl ManagerConfig {
    /// Merge `update` into this config, clamping invalid values to defaults
    pub fn apply(&mut self, update: &ManagerConfigUpdate) {
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }

        if let Some(cap) = update.max_errors_per_session {
            self.max_errors_per_session = if cap <= 0 {
                warn!(
                    requested = cap,
                    default = DEFAULT_MAX_ERRORS_PER_SESSION,
                    "invalid error cap, using default"
                );
                DEFAULT_MAX_ERRORS_PER_SESSION
            } else {
                usize::try_from(cap).unwrap_or(usize::MAX)
            };
        }

        if let Some(ms) = update.reporting_throttle_ms {
            self.reporting_throttle = match u64::try_from(ms) {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => {
                    warn!(
                        requested = ms,
                        default = DEFAULT_REPORTING_THROTTLE_MS,
                        "negative reporting throttle, using default"
                    );
                    duration_ms(DEFAULT_REPORTING_THROTTLE_MS)
                }
            };
        }
    }

    /// Load manager configuration from environment variables
    pub fn from_env() -> AegisResult<Self> {
        let mut config = Self::default();

        if let Some(enabled) = parse_bool_from_env("AEGIS_ERRORS_ENABLED")? {
            config.enabled = enabled;
        }

        if let Ok(cap) = std::env::var("AEGIS_MAX_ERRORS_PER_SESSION") {
            config.max_errors_per_session = cap.parse().map_err(|_| {
                AegisError::configuration("manager", "Invalid AEGIS_MAX_ERRORS_PER_SESSION")
            })?;
        }

        config.reporting_throttle =
            parse_duration_from_env("AEGIS_REPORTING_THROTTLE_MS", config.reporting_throttle);

        Ok(config)
    }

    pub fn validate(&self) -> AegisResult<()> {
        if self.max_errors_per_session == 0 {
            return Err(AegisError::configuration(
                "manager",
                "max_errors_per_session must be greater than zero",
            ));
        }
        Ok(())
    }
}
