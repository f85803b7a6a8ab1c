//! Default configuration values for Aegis
//!
//! This module centralizes all default values to make them easy to find and modify.

// Error manager defaults
pub const DEFAULT_MAX_ERRORS_PER_SESSION: usize = 100;
pub const DEFAULT_REPORTING_THROTTLE_MS: u64 = 1000;

// Structured logger defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_BATCH_SIZE: usize = 50;
pub const DEFAULT_LOG_BATCH_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_LOG_MAX_ENTRIES: usize = 1000;
pub const REDACTION_MARKER: &str = "[REDACTED]";
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "secret",
    "api_key",
    "apikey",
    "authorization",
    "credential",
    "private_key",
];

// Retry defaults
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;

// Circuit breaker defaults
pub const DEFAULT_BREAKER_FAILURE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_BREAKER_RESET_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_BREAKER_MINIMUM_THROUGHPUT: u32 = 5;

// Pattern detection defaults
pub const DEFAULT_CASCADE_GAP_MS: u64 = 1000;
pub const DEFAULT_MIN_PATTERN_OCCURRENCES: usize = 2;

/// Helper to create Duration from milliseconds
pub const fn duration_ms(ms: u64) -> std::time::Duration {
    std::time::Duration::from_millis(ms)
}
