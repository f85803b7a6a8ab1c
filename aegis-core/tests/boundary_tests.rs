//! Error boundaries reporting into the shared diagnostics pipeline

use aegis_core::aggregation::ErrorAggregator;
use aegis_core::boundary::{
    BoundaryFallback, BoundaryOptions, BoundaryOutput, ErrorBoundary, RecoveryStrategy, RetryHandle,
};
use aegis_core::error::AegisError;
use aegis_core::manager::ErrorManager;
use aegis_core::record::{Attribution, ErrorCategory, ErrorRecord, ErrorSeverity};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Retry { message: String },
}

fn widget(manager: &Arc<ErrorManager>, id: &str) -> ErrorBoundary<Node> {
    ErrorBoundary::new(
        BoundaryOptions::new(id)
            .attribution(Attribution::named(id, "Widget"))
            .manager(manager.clone())
            .fallback(BoundaryFallback::render(|record: &ErrorRecord, _: &RetryHandle| {
                Node::Retry {
                    message: record.message().to_string(),
                }
            })),
    )
}

#[test]
fn test_boundary_failures_are_reported_and_aggregated() {
    let manager = Arc::new(ErrorManager::default());
    let aggregator = ErrorAggregator::default();
    let _sub = aggregator.attach(&manager);

    let weather = widget(&manager, "weather");
    let news = widget(&manager, "news");

    let output = weather.render(|| Err::<Node, _>(AegisError::network("feed offline")));
    assert_eq!(
        output,
        BoundaryOutput::Fallback(Node::Retry {
            message: "Network error: feed offline".to_string()
        })
    );
    news.render(|| Err::<Node, _>(AegisError::network("feed offline")));

    // throttled at the manager: one stored record for both widgets
    assert_eq!(manager.len(), 1);
    let stored = &manager.errors()[0];
    assert_eq!(stored.category(), &ErrorCategory::Component);
    assert_eq!(stored.severity(), ErrorSeverity::High);
    assert_eq!(stored.component_id(), Some("weather"));
    assert_eq!(aggregator.get("Network error: feed offline").unwrap().count, 1);
}

#[test]
fn test_retry_after_fix_renders_content_again() {
    let manager = Arc::new(ErrorManager::default());
    let boundary = widget(&manager, "profile");
    let healthy = AtomicBool::new(false);

    let render = |boundary: &ErrorBoundary<Node>| {
        boundary.render(|| {
            if healthy.load(Ordering::SeqCst) {
                Ok(Node::Text("profile".to_string()))
            } else {
                Err("profile service unavailable")
            }
        })
    };

    assert!(!render(&boundary).is_content());
    assert!(!render(&boundary).is_content());

    healthy.store(true, Ordering::SeqCst);
    assert!(boundary.retry());
    assert_eq!(boundary.retry_attempts(), 1);
    assert_eq!(
        render(&boundary).into_content(),
        Some(Node::Text("profile".to_string()))
    );
    assert!(!boundary.retry());
    assert_eq!(boundary.retry_attempts(), 1);
}

#[test]
fn test_recovery_strategy_clears_transient_panic() {
    let boundary: ErrorBoundary<Node> = ErrorBoundary::new(
        BoundaryOptions::new("chart").recovery(RecoveryStrategy::retry(3, |record, _| {
            record.message().contains("transient")
        })),
    );

    let output = boundary.render(|| -> Result<Node, AegisError> { panic!("transient glitch") });
    // recovery ran inside catch, so the boundary is ok again by render time
    assert!(matches!(output, BoundaryOutput::Placeholder { .. }));
    assert!(!boundary.has_error());
    assert_eq!(boundary.retry_attempts(), 1);

    let output = boundary.render(|| Ok::<_, AegisError>(Node::Text("chart".to_string())));
    assert!(output.is_content());
}

#[test]
fn test_sibling_boundaries_are_isolated() {
    let manager = Arc::new(ErrorManager::default());
    let left = widget(&manager, "left");
    let right = widget(&manager, "right");

    left.render(|| -> Result<Node, AegisError> { panic!("left broke") });
    let output = right.render(|| Ok::<_, AegisError>(Node::Text("right".to_string())));

    assert!(left.has_error());
    assert!(!right.has_error());
    assert_eq!(output, BoundaryOutput::Content(Node::Text("right".to_string())));
}
