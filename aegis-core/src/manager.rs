//! Session-wide error manager
//!
//! The [`ErrorManager`] is the sink for classified errors. It owns a bounded
//! ring buffer of [`ErrorRecord`]s, suppresses duplicate messages inside a
//! throttle window and fans every stored record out to subscribers.
//!
//! The manager is an explicitly owned service: create one per process (or per
//! test) and share it behind an `Arc`.
//!
//! ```
//! use aegis_core::manager::{ErrorManager, ReportOutcome};
//! use aegis_core::record::ErrorRecord;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let manager = ErrorManager::default();
//! assert_eq!(manager.report(ErrorRecord::new("disk full")), ReportOutcome::Recorded);
//! assert_eq!(manager.report(ErrorRecord::new("disk full")), ReportOutcome::Throttled);
//! assert_eq!(manager.statistics().total, 1);
//! # }
//! ```

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::{ManagerConfig, ManagerConfigUpdate};
use crate::record::{classify, ClassifyHints, ErrorCategory, ErrorRecord, ErrorSeverity, RawFailure};

type Handler = Arc<dyn Fn(&ErrorRecord) + Send + Sync>;

/// Result of a single [`ErrorManager::report`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Stored and delivered to subscribers
    Recorded,
    /// Dropped as a duplicate inside the throttle window
    Throttled,
    /// Dropped because reporting is disabled
    Disabled,
}

/// Aggregate counters over the current buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorStatistics {
    pub total: usize,
    pub by_category: BTreeMap<ErrorCategory, usize>,
    pub by_severity: BTreeMap<ErrorSeverity, usize>,
    /// Reports suppressed by the throttle since the last clear
    pub throttled: u64,
    /// Records evicted by the session cap since the last clear
    pub evicted: u64,
}

struct ManagerState {
    config: ManagerConfig,
    buffer: VecDeque<ErrorRecord>,
    last_reported: HashMap<String, Instant>,
    subscribers: Vec<(u64, Handler)>,
    next_subscriber: u64,
    throttled: u64,
    evicted: u64,
}

impl ManagerState {
    fn enforce_cap(&mut self) {
        let cap = self.config.max_errors_per_session;
        while self.buffer.len() > cap {
            if let Some(evicted) = self.buffer.pop_front() {
                trace!(id = %evicted.id(), "evicting oldest error");
                self.evicted += 1;
            }
        }
    }

    fn prune_throttle(&mut self, now: Instant) {
        let window = self.config.reporting_throttle;
        self.last_reported
            .retain(|_, seen| now.saturating_duration_since(*seen) < window);
    }
}

/// Bounded, throttled store of classified errors with subscriber fan-out
pub struct ErrorManager {
    state: Arc<Mutex<ManagerState>>,
}

impl Default for ErrorManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl ErrorManager {
    pub fn new(mut config: ManagerConfig) -> Self {
        // a zero cap would silently discard everything
        if config.max_errors_per_session == 0 {
            config.max_errors_per_session = ManagerConfig::default().max_errors_per_session;
        }

        Self {
            state: Arc::new(Mutex::new(ManagerState {
                config,
                buffer: VecDeque::new(),
                last_reported: HashMap::new(),
                subscribers: Vec::new(),
                next_subscriber: 0,
                throttled: 0,
                evicted: 0,
            })),
        }
    }

    /// Merge a partial configuration. Shrinking the cap trims the buffer at once.
    pub fn configure(&self, update: ManagerConfigUpdate) {
        let mut state = self.state.lock();
        state.config.apply(&update);
        state.enforce_cap();
        debug!(config = ?state.config, "error manager reconfigured");
    }

    pub fn config(&self) -> ManagerConfig {
        self.state.lock().config.clone()
    }

    /// Store a record and notify subscribers.
    ///
    /// Subscribers run synchronously in subscription order after the record is
    /// in the buffer and the internal lock has been released.
    pub fn report(&self, record: ErrorRecord) -> ReportOutcome {
        let handlers = {
            let mut state = self.state.lock();
            if !state.config.enabled {
                return ReportOutcome::Disabled;
            }

            let now = Instant::now();
            state.prune_throttle(now);
            if state.last_reported.contains_key(record.message()) {
                state.throttled += 1;
                trace!(message = %record.message(), "duplicate error throttled");
                return ReportOutcome::Throttled;
            }
            state
                .last_reported
                .insert(record.message().to_string(), now);

            debug!(
                id = %record.id(),
                category = %record.category(),
                severity = %record.severity(),
                "error recorded"
            );
            state.buffer.push_back(record.clone());
            state.enforce_cap();

            state
                .subscribers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect::<Vec<_>>()
        };

        for handler in handlers {
            handler(&record);
        }
        ReportOutcome::Recorded
    }

    /// Classify a raw failure and report it
    pub fn capture(&self, raw: impl Into<RawFailure>, hints: ClassifyHints) -> ReportOutcome {
        self.report(classify(raw, hints))
    }

    /// Register a handler for every recorded error
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ErrorRecord) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.push((id, Arc::new(handler)));

        Subscription {
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub fn by_category(&self, category: &ErrorCategory) -> Vec<ErrorRecord> {
        self.state
            .lock()
            .buffer
            .iter()
            .filter(|record| record.category() == category)
            .cloned()
            .collect()
    }

    pub fn by_severity(&self, severity: ErrorSeverity) -> Vec<ErrorRecord> {
        self.state
            .lock()
            .buffer
            .iter()
            .filter(|record| record.severity() == severity)
            .cloned()
            .collect()
    }

    /// Up to `n` most recent records, newest first
    pub fn recent(&self, n: usize) -> Vec<ErrorRecord> {
        self.state
            .lock()
            .buffer
            .iter()
            .rev()
            .take(n)
            .cloned()
            .collect()
    }

    /// Snapshot of the buffer, oldest first
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.state.lock().buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    pub fn statistics(&self) -> ErrorStatistics {
        let state = self.state.lock();
        let mut stats = ErrorStatistics {
            total: state.buffer.len(),
            throttled: state.throttled,
            evicted: state.evicted,
            ..Default::default()
        };
        for record in &state.buffer {
            *stats
                .by_category
                .entry(record.category().clone())
                .or_default() += 1;
            *stats.by_severity.entry(record.severity()).or_default() += 1;
        }
        stats
    }

    /// Drop all records, counters and throttle memory. Config and subscribers stay.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.buffer.clear();
        state.last_reported.clear();
        state.throttled = 0;
        state.evicted = 0;
        debug!("error manager cleared");
    }
}

/// Handle returned by [`ErrorManager::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    state: Weak<Mutex<ManagerState>>,
}

impl Subscription {
    /// Remove exactly this handler. Calling more than once is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Attribution;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn manager_with(update: ManagerConfigUpdate) -> ErrorManager {
        let manager = ErrorManager::default();
        manager.configure(update);
        manager
    }

    fn messages(records: &[ErrorRecord]) -> Vec<&str> {
        records.iter().map(|r| r.message()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttles_identical_messages_within_window() {
        let manager = ErrorManager::default();
        let notified = Arc::new(Mutex::new(0));
        let counter = notified.clone();
        let _sub = manager.subscribe(move |_| *counter.lock() += 1);

        assert_eq!(manager.report(ErrorRecord::new("same")), ReportOutcome::Recorded);
        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(manager.report(ErrorRecord::new("same")), ReportOutcome::Throttled);
        assert_eq!(manager.len(), 1);
        assert_eq!(*notified.lock(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(manager.report(ErrorRecord::new("same")), ReportOutcome::Recorded);
        assert_eq!(manager.len(), 2);
        assert_eq!(*notified.lock(), 2);
        assert_eq!(manager.statistics().throttled, 1);
    }

    #[tokio::test]
    async fn test_throttle_ignores_category_and_severity() {
        let manager = ErrorManager::default();
        manager.report(ErrorRecord::new("dup").with_category(ErrorCategory::Network));
        let outcome = manager.report(
            ErrorRecord::new("dup")
                .with_category(ErrorCategory::State)
                .with_severity(ErrorSeverity::Fatal),
        );
        assert_eq!(outcome, ReportOutcome::Throttled);
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest_first() {
        let manager = manager_with(ManagerConfigUpdate::new().max_errors_per_session(3));
        for i in 1..=5 {
            manager.report(ErrorRecord::new(format!("error {}", i)));
        }

        assert_eq!(
            messages(&manager.errors()),
            vec!["error 3", "error 4", "error 5"]
        );
        assert_eq!(manager.statistics().evicted, 2);
    }

    #[tokio::test]
    async fn test_shrinking_cap_trims_immediately() {
        let manager = ErrorManager::default();
        for i in 0..4 {
            manager.report(ErrorRecord::new(format!("e{}", i)));
        }
        manager.configure(ManagerConfigUpdate::new().max_errors_per_session(2));
        assert_eq!(messages(&manager.errors()), vec!["e2", "e3"]);
    }

    #[tokio::test]
    async fn test_invalid_cap_clamped_to_default() {
        let manager = manager_with(ManagerConfigUpdate::new().max_errors_per_session(-10));
        assert_eq!(manager.config().max_errors_per_session, 100);
    }

    #[tokio::test]
    async fn test_disabled_manager_ignores_reports() {
        let manager = manager_with(ManagerConfigUpdate::new().enabled(false));
        let notified = Arc::new(Mutex::new(0));
        let counter = notified.clone();
        let _sub = manager.subscribe(move |_| *counter.lock() += 1);

        assert_eq!(manager.report(ErrorRecord::new("x")), ReportOutcome::Disabled);
        assert!(manager.is_empty());
        assert_eq!(*notified.lock(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_notified_in_order_and_can_query() {
        let manager = Arc::new(ErrorManager::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        let inner = manager.clone();
        let _first = manager.subscribe(move |record| {
            log.lock()
                .push(format!("first:{}:{}", record.message(), inner.statistics().total));
        });
        let log = seen.clone();
        let _second = manager.subscribe(move |record| {
            log.lock().push(format!("second:{}", record.message()));
        });

        manager.report(ErrorRecord::new("boom"));
        assert_eq!(*seen.lock(), vec!["first:boom:1", "second:boom"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let manager = ErrorManager::default();
        let hits = Arc::new(Mutex::new(0));
        let a = hits.clone();
        let b = hits.clone();
        let first = manager.subscribe(move |_| *a.lock() += 1);
        let _second = manager.subscribe(move |_| *b.lock() += 10);

        first.unsubscribe();
        first.unsubscribe();
        assert_eq!(manager.subscriber_count(), 1);

        manager.report(ErrorRecord::new("x"));
        assert_eq!(*hits.lock(), 10);
    }

    #[tokio::test]
    async fn test_queries_and_statistics() {
        let manager = ErrorManager::default();
        manager.report(
            ErrorRecord::new("a")
                .with_category(ErrorCategory::Network)
                .with_severity(ErrorSeverity::High),
        );
        manager.report(ErrorRecord::new("b").with_category(ErrorCategory::Network));
        manager.report(ErrorRecord::new("c").with_severity(ErrorSeverity::High));

        assert_eq!(messages(&manager.by_category(&ErrorCategory::Network)), vec!["a", "b"]);
        assert_eq!(messages(&manager.by_severity(ErrorSeverity::High)), vec!["a", "c"]);
        assert_eq!(messages(&manager.recent(2)), vec!["c", "b"]);

        let stats = manager.statistics();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category[&ErrorCategory::Network], 2);
        assert_eq!(stats.by_category[&ErrorCategory::Unknown], 1);
        assert_eq!(stats.by_severity[&ErrorSeverity::High], 2);
        assert_eq!(stats.by_severity[&ErrorSeverity::Medium], 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_config_and_subscribers() {
        let manager = manager_with(ManagerConfigUpdate::new().max_errors_per_session(5));
        let _sub = manager.subscribe(|_| {});
        manager.report(ErrorRecord::new("x"));
        manager.report(ErrorRecord::new("x"));

        manager.clear();
        assert_eq!(manager.statistics(), ErrorStatistics::default());
        assert_eq!(manager.config().max_errors_per_session, 5);
        assert_eq!(manager.subscriber_count(), 1);

        // throttle memory is gone too
        assert_eq!(manager.report(ErrorRecord::new("x")), ReportOutcome::Recorded);
    }

    #[tokio::test]
    async fn test_capture_classifies_and_reports() {
        let manager = ErrorManager::default();
        let outcome = manager.capture(
            "socket closed",
            ClassifyHints::new()
                .category(ErrorCategory::Network)
                .attribution(Attribution::new("cart")),
        );
        assert_eq!(outcome, ReportOutcome::Recorded);

        let stored = manager.errors();
        assert_eq!(stored[0].component_id(), Some("cart"));
        assert_eq!(stored[0].category(), &ErrorCategory::Network);
    }
}
