//! Constructor methods and convenience functions for AegisError

use super::types::{AegisError, ErrorKind};
use std::time::Duration;

impl AegisError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        AegisError::Network(message.into())
    }

    /// Create a timeout error for the named operation
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        AegisError::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a validation error for a field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AegisError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        AegisError::State(message.into())
    }

    /// Create a component failure with the originating component name
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        AegisError::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error with component and message
    ///
    /// # Examples
    /// ```rust
    /// use aegis_core::error::AegisError;
    ///
    /// let err = AegisError::configuration("retry.max_attempts", "must be at least 1");
    /// assert!(err.to_string().contains("retry.max_attempts"));
    /// ```
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        AegisError::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        AegisError::Internal {
            message: message.into(),
        }
    }

    /// Create a failure carrying a caller-declared kind
    pub fn operation(kind: ErrorKind, message: impl Into<String>) -> Self {
        AegisError::Operation {
            kind,
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        AegisError::Cancelled {
            operation: operation.into(),
        }
    }

    /// Whether this error was produced by an open circuit breaker
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, AegisError::CircuitOpen { .. })
    }

    /// Whether this error represents a cancelled operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AegisError::Cancelled { .. })
    }
}

impl From<tokio::time::error::Elapsed> for AegisError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AegisError::Timeout {
            operation: "async_operation".to_string(),
            duration: Duration::ZERO,
        }
    }
}

impl From<serde_json::Error> for AegisError {
    fn from(err: serde_json::Error) -> Self {
        AegisError::Internal {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<toml::de::Error> for AegisError {
    fn from(err: toml::de::Error) -> Self {
        AegisError::Configuration {
            component: "toml".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AegisError {
    fn from(err: std::io::Error) -> Self {
        AegisError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}
