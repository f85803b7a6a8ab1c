//! Error resilience and diagnostics core
//!
//! Classifies runtime failures, contains them at boundaries, recovers from
//! transient failures and surfaces diagnostics without flooding output.

pub mod aggregation;
pub mod boundary;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod observability;
pub mod patterns;
pub mod record;

pub use aggregation::{ErrorAggregator, PatternDetector};
pub use boundary::{BoundaryFallback, BoundaryOptions, BoundaryOutput, ErrorBoundary, RecoveryStrategy};
pub use config::AegisConfig;
pub use error::{AegisError, AegisResult, ErrorKind};
pub use logging::{LogLevel, StructuredLogger};
pub use manager::{ErrorManager, ReportOutcome};
pub use patterns::{CircuitBreaker, Fallback, RetryPolicy, RobustFunction};
pub use record::{classify, ClassifyHints, ErrorCategory, ErrorRecord, ErrorSeverity};
