//! Aggregation and pattern detection configuration

use super::defaults::*;
use super::parse_duration_from_env;
use crate::aggregation::{FingerprintStrategy, GroupingKey};
use crate::error::{AegisError, AegisResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Fingerprint used by the aggregator
    pub fingerprint: FingerprintStrategy,

    /// Attribute recurring patterns are grouped by
    pub grouping: GroupingKey,

    /// Smallest group reported as recurring
    pub min_occurrences: usize,

    /// Largest gap between consecutive records of one cascade
    #[serde(with = "humantime_serde")]
    pub cascade_gap: Duration,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintStrategy::default(),
            grouping: GroupingKey::default(),
            min_occurrences: DEFAULT_MIN_PATTERN_OCCURRENCES,
            cascade_gap: duration_ms(DEFAULT_CASCADE_GAP_MS),
        }
    }
}

impl PatternConfig {
    /// Load pattern configuration from environment variables
    pub fn from_env() -> AegisResult<Self> {
        let mut config = Self::default();

        if let Ok(min) = std::env::var("AEGIS_MIN_PATTERN_OCCURRENCES") {
            config.min_occurrences = min.parse().map_err(|_| {
                AegisError::configuration("patterns", "Invalid AEGIS_MIN_PATTERN_OCCURRENCES")
            })?;
        }

        config.cascade_gap = parse_duration_from_env("AEGIS_CASCADE_GAP_MS", config.cascade_gap);

        Ok(config)
    }

    pub fn validate(&self) -> AegisResult<()> {
        if self.min_occurrences == 0 {
            return Err(AegisError::configuration(
                "patterns",
                "min_occurrences must be at least 1",
            ));
        }
        Ok(())
    }

    pub(crate) fn normalized(mut self) -> Self {
        self.min_occurrences = self.min_occurrences.max(1);
        self
    }
}
