//! Structured error records and the failure classifier
//!
//! Every failure that reaches the diagnostics layer is normalised into an
//! [`ErrorRecord`]. Classification is pure construction: recording a record is
//! a separate step performed by the [`ErrorManager`](crate::manager::ErrorManager).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

use crate::error::{AegisError, ErrorKind};

/// Broad area a failure originated from
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Component,
    Network,
    Validation,
    State,
    Render,
    Timeout,
    #[default]
    Unknown,
    Custom(String),
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Component => write!(f, "component"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::State => write!(f, "state"),
            ErrorCategory::Render => write!(f, "render"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::Unknown => write!(f, "unknown"),
            ErrorCategory::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Error severity levels, totally ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Component that raised a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub component_id: String,
    pub component_name: Option<String>,
}

impl Attribution {
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            component_name: None,
        }
    }

    pub fn named(component_id: impl Into<String>, component_name: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            component_name: Some(component_name.into()),
        }
    }
}

/// Raw failure as handed to the classifier
#[derive(Debug, Clone)]
pub enum RawFailure {
    /// A typed error value
    Error(Arc<dyn StdError + Send + Sync>),
    /// A bare message with no underlying error value
    Message(String),
    /// A panic payload captured by `catch_unwind`
    Panic(String),
}

impl RawFailure {
    /// Convert a `catch_unwind` payload. Non-string payloads are normalised.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        RawFailure::Panic(message)
    }

    fn message(&self) -> String {
        match self {
            RawFailure::Error(err) => err.to_string(),
            RawFailure::Message(message) => message.clone(),
            RawFailure::Panic(message) => format!("panic: {}", message),
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            RawFailure::Error(err) => err
                .downcast_ref::<AegisError>()
                .map(AegisError::kind)
                .unwrap_or(ErrorKind::Unknown),
            _ => ErrorKind::Unknown,
        }
    }
}

impl From<AegisError> for RawFailure {
    fn from(err: AegisError) -> Self {
        RawFailure::Error(Arc::new(err))
    }
}

impl From<Box<dyn StdError + Send + Sync>> for RawFailure {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        RawFailure::Error(Arc::from(err))
    }
}

impl From<String> for RawFailure {
    fn from(message: String) -> Self {
        RawFailure::Message(message)
    }
}

impl From<&str> for RawFailure {
    fn from(message: &str) -> Self {
        RawFailure::Message(message.to_string())
    }
}

/// Optional overrides applied during classification
#[derive(Debug, Clone, Default)]
pub struct ClassifyHints {
    pub category: Option<ErrorCategory>,
    pub severity: Option<ErrorSeverity>,
    pub attribution: Option<Attribution>,
    pub message: Option<String>,
}

impl ClassifyHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = Some(attribution);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Canonical structured error record
///
/// Fields are fixed at creation; only [`annotations`](Self::annotations) may be
/// appended to afterwards.
#[derive(Clone)]
pub struct ErrorRecord {
    id: String,
    message: String,
    kind: ErrorKind,
    category: ErrorCategory,
    severity: ErrorSeverity,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
    attribution: Option<Attribution>,
    timestamp: Instant,
    created_at: DateTime<Utc>,
    annotations: Vec<String>,
}

impl ErrorRecord {
    /// Create a record with default category and severity and no cause
    pub fn new(message: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: generate_id(created_at),
            message: normalize_message(message.into()),
            kind: ErrorKind::Unknown,
            category: ErrorCategory::Unknown,
            severity: ErrorSeverity::Medium,
            cause: None,
            attribution: None,
            timestamp: Instant::now(),
            created_at,
            annotations: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = Some(attribution);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn category(&self) -> &ErrorCategory {
        &self.category
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    /// Underlying failure. Retained for diagnostics only.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn attribution(&self) -> Option<&Attribution> {
        self.attribution.as_ref()
    }

    pub fn component_id(&self) -> Option<&str> {
        self.attribution.as_ref().map(|a| a.component_id.as_str())
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    /// Attach a transient diagnostic note, such as a recovery outcome
    pub fn annotate(&mut self, note: impl Into<String>) {
        self.annotations.push(note.into());
    }
}

impl fmt::Debug for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecord")
            .field("id", &self.id)
            .field("message", &self.message)
            .field("kind", &self.kind)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .field("attribution", &self.attribution)
            .field("created_at", &self.created_at)
            .field("annotations", &self.annotations)
            .finish()
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.severity, self.message, self.category)?;
        if let Some(component_id) = self.component_id() {
            write!(f, " in {}", component_id)?;
        }
        Ok(())
    }
}

/// Normalise any failure into an [`ErrorRecord`]. Never fails.
pub fn classify(raw: impl Into<RawFailure>, hints: ClassifyHints) -> ErrorRecord {
    let raw = raw.into();
    let message = hints.message.unwrap_or_else(|| raw.message());
    let mut record = ErrorRecord::new(message).with_kind(raw.kind());

    record.category = hints.category.unwrap_or_default();
    record.severity = hints.severity.unwrap_or_default();
    record.attribution = hints.attribution;
    if let RawFailure::Error(err) = raw {
        record.cause = Some(err);
    }
    record
}

fn normalize_message(message: String) -> String {
    if message.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        message
    }
}

fn generate_id(created_at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("err_{}_{}", created_at.timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_defaults() {
        let record = classify("boom", ClassifyHints::default());
        assert_eq!(record.message(), "boom");
        assert_eq!(record.category(), &ErrorCategory::Unknown);
        assert_eq!(record.severity(), ErrorSeverity::Medium);
        assert_eq!(record.kind(), ErrorKind::Unknown);
        assert!(record.cause().is_none());
        assert!(record.id().starts_with("err_"));
    }

    #[test]
    fn test_classify_applies_hints() {
        let record = classify(
            AegisError::network("connection reset"),
            ClassifyHints::new()
                .category(ErrorCategory::Network)
                .severity(ErrorSeverity::High)
                .attribution(Attribution::named("btn-1", "SubmitButton")),
        );
        assert_eq!(record.category(), &ErrorCategory::Network);
        assert_eq!(record.severity(), ErrorSeverity::High);
        assert_eq!(record.kind(), ErrorKind::Network);
        assert_eq!(record.component_id(), Some("btn-1"));
        assert_eq!(record.message(), "Network error: connection reset");
    }

    #[test]
    fn test_classify_preserves_cause() {
        let record = classify(AegisError::state("stale"), ClassifyHints::default());
        let cause = record.cause().expect("cause retained");
        assert!(cause.downcast_ref::<AegisError>().is_some());
    }

    #[test]
    fn test_classify_normalises_empty_message() {
        let record = classify("   ", ClassifyHints::default());
        assert_eq!(record.message(), "Unknown error");
    }

    #[test]
    fn test_classify_keeps_surrounding_whitespace() {
        let padded = classify("  boom ", ClassifyHints::default());
        assert_eq!(padded.message(), "  boom ");
        assert_ne!(padded.message(), classify("boom", ClassifyHints::default()).message());
    }

    #[test]
    fn test_panic_payloads() {
        let payload = std::panic::catch_unwind(|| panic!("render exploded")).unwrap_err();
        let record = classify(RawFailure::from_panic(payload), ClassifyHints::default());
        assert_eq!(record.message(), "panic: render exploded");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        match RawFailure::from_panic(payload) {
            RawFailure::Panic(message) => assert_eq!(message, "unknown panic payload"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Low < ErrorSeverity::Medium);
        assert!(ErrorSeverity::Medium < ErrorSeverity::High);
        assert!(ErrorSeverity::High < ErrorSeverity::Critical);
        assert!(ErrorSeverity::Critical < ErrorSeverity::Fatal);
    }

    #[test]
    fn test_annotate_keeps_identity() {
        let mut record = ErrorRecord::new("x");
        let id = record.id().to_string();
        record.annotate("recovered after 1 attempt");
        assert_eq!(record.id(), id);
        assert_eq!(record.annotations(), ["recovered after 1 attempt".to_string()]);
    }
}
