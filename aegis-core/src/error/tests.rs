//! Tests for error kinds and conversions

use crate::error::{AegisError, ErrorKind};
use std::time::Duration;

#[test]
fn test_kind_discriminators() {
    assert_eq!(AegisError::network("down").kind(), ErrorKind::Network);
    assert_eq!(
        AegisError::timeout("fetch", Duration::from_millis(5)).kind(),
        ErrorKind::Timeout
    );
    assert_eq!(AegisError::validation("email", "bad").kind(), ErrorKind::Validation);
    assert_eq!(
        AegisError::operation(ErrorKind::State, "stale").kind(),
        ErrorKind::State
    );
    assert_eq!(
        AegisError::CircuitOpen { name: "api".into() }.kind(),
        ErrorKind::CircuitOpen
    );
}

#[test]
fn test_control_kinds_are_flagged() {
    assert!(ErrorKind::CircuitOpen.is_control());
    assert!(ErrorKind::Cancelled.is_control());
    assert!(!ErrorKind::Network.is_control());
}

#[test]
fn test_operation_error_displays_message_only() {
    let err = AegisError::operation(ErrorKind::Network, "socket closed");
    assert_eq!(err.to_string(), "socket closed");
}

/// Test that timeout errors can be converted
#[tokio::test]
async fn test_timeout_error_conversion() {
    use tokio::time::timeout;

    async fn test_function() -> Result<(), AegisError> {
        timeout(Duration::from_millis(1), tokio::time::sleep(Duration::from_secs(1))).await?;
        Ok(())
    }

    let result = test_function().await;
    if let Err(AegisError::Timeout { operation, .. }) = result {
        assert_eq!(operation, "async_operation");
    } else {
        panic!("Expected Timeout error");
    }
}

#[test]
fn test_toml_error_conversion() {
    let parse: Result<toml::Value, _> = toml::from_str("not = [valid");
    let err: AegisError = parse.unwrap_err().into();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
