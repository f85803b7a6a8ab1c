//! Error aggregation and pattern detection
//!
//! ```text
//! ┌──────────────┐  subscribe   ┌─────────────────┐
//! │ ErrorManager │ ───────────▶ │ ErrorAggregator │  fingerprint → count, components
//! └──────┬───────┘              └─────────────────┘
//!        │ errors()
//!        ▼
//! ┌─────────────────┐
//! │ PatternDetector │  recurring groups, cascades
//! └─────────────────┘
//! ```

mod aggregator;
mod detector;

pub use aggregator::{ErrorAggregation, ErrorAggregator, FingerprintStrategy};
pub use detector::{Cascade, GroupingKey, PatternDetector, PatternReport, RecurringPattern};
