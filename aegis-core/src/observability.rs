//! Tracing subscriber setup
//!
//! Internal diagnostics of this crate are emitted through `tracing`. Binaries
//! install a subscriber once at startup; tests use [`try_init_tracing`] so
//! repeated initialisation is harmless.

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::defaults::DEFAULT_LOG_LEVEL;

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("aegis_core={}", DEFAULT_LOG_LEVEL)))
}

/// Initialize tracing with environment-based configuration.
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing() {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    Registry::default()
        .with(default_filter())
        .with(fmt_layer)
        .init();
}

/// Like [`init_tracing`], but returns false instead of panicking when a
/// subscriber is already installed
pub fn try_init_tracing() -> bool {
    Registry::default()
        .with(default_filter())
        .with(fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}

/// Span for a guarded call
#[inline]
pub fn operation_span(operation: &str) -> Span {
    tracing::debug_span!("guarded_operation", operation = %operation)
}
