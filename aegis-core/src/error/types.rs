//! Core error types for Aegis
//!
//! This module contains the [`AegisError`] enum with all error variants and
//! the [`ErrorKind`] discriminator that retry policies and classifiers match on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Closed discriminator for failures.
///
/// Retry allow-lists and record classification match on this value instead of
/// free-text type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    Validation,
    State,
    Component,
    Render,
    CircuitOpen,
    Cancelled,
    Configuration,
    Internal,
    Unknown,
}

impl ErrorKind {
    /// Get the display name for the kind
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Validation => "validation",
            ErrorKind::State => "state",
            ErrorKind::Component => "component",
            ErrorKind::Render => "render",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Kinds produced by the resilience layer itself. They are never retried.
    pub fn is_control(&self) -> bool {
        matches!(self, ErrorKind::CircuitOpen | ErrorKind::Cancelled)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for every operation guarded by Aegis
#[derive(Error, Debug, Clone)]
pub enum AegisError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation timed out: {operation} after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("State error: {0}")]
    State(String),

    #[error("Component '{component}' failed: {message}")]
    Component { component: String, message: String },

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Configuration error in {component}: {message}")]
    Configuration { component: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Failure raised by caller code that declares its own kind
    #[error("{message}")]
    Operation { kind: ErrorKind, message: String },
}

impl AegisError {
    /// Discriminator for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AegisError::Network(_) => ErrorKind::Network,
            AegisError::Timeout { .. } => ErrorKind::Timeout,
            AegisError::Validation { .. } => ErrorKind::Validation,
            AegisError::State(_) => ErrorKind::State,
            AegisError::Component { .. } => ErrorKind::Component,
            AegisError::Render(_) => ErrorKind::Render,
            AegisError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            AegisError::Cancelled { .. } => ErrorKind::Cancelled,
            AegisError::Configuration { .. } => ErrorKind::Configuration,
            AegisError::Internal { .. } => ErrorKind::Internal,
            AegisError::Operation { kind, .. } => *kind,
        }
    }
}

pub type Result<T> = std::result::Result<T, AegisError>;
pub type AegisResult<T> = std::result::Result<T, AegisError>;
