//! Fingerprint-based grouping of recurring errors

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

use crate::manager::{ErrorManager, Subscription};
use crate::record::{ErrorCategory, ErrorRecord, ErrorSeverity};

/// How a record is reduced to its grouping fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintStrategy {
    /// Message text only
    #[default]
    Message,
    /// Message text qualified by category
    MessageAndCategory,
}

/// All records sharing one fingerprint
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorAggregation {
    pub fingerprint: String,
    pub message: String,
    pub category: ErrorCategory,
    pub max_severity: ErrorSeverity,
    pub count: usize,
    /// Component ids in first-seen order, without duplicates
    pub affected_components: Vec<String>,
    pub first_seen_at: Instant,
    pub last_seen_at: Instant,
}

impl ErrorAggregation {
    fn new(fingerprint: String, record: &ErrorRecord) -> Self {
        Self {
            fingerprint,
            message: record.message().to_string(),
            category: record.category().clone(),
            max_severity: record.severity(),
            count: 0,
            affected_components: Vec::new(),
            first_seen_at: record.timestamp(),
            last_seen_at: record.timestamp(),
        }
    }

    fn fold(&mut self, record: &ErrorRecord) {
        self.count += 1;
        self.max_severity = self.max_severity.max(record.severity());
        self.first_seen_at = self.first_seen_at.min(record.timestamp());
        self.last_seen_at = self.last_seen_at.max(record.timestamp());

        if let Some(component) = record.component_id() {
            if !self.affected_components.iter().any(|c| c == component) {
                self.affected_components.push(component.to_string());
            }
        }
    }
}

/// Groups records by fingerprint. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct ErrorAggregator {
    strategy: FingerprintStrategy,
    aggregations: Arc<Mutex<HashMap<String, ErrorAggregation>>>,
}

impl ErrorAggregator {
    pub fn new(strategy: FingerprintStrategy) -> Self {
        Self {
            strategy,
            aggregations: Arc::default(),
        }
    }

    pub fn strategy(&self) -> FingerprintStrategy {
        self.strategy
    }

    pub fn fingerprint(&self, record: &ErrorRecord) -> String {
        match self.strategy {
            FingerprintStrategy::Message => record.message().to_string(),
            FingerprintStrategy::MessageAndCategory => {
                format!("{}::{}", record.category(), record.message())
            }
        }
    }

    /// Fold `record` into its aggregation, returning the new count
    pub fn aggregate_error(&self, record: &ErrorRecord) -> usize {
        let fingerprint = self.fingerprint(record);
        let mut aggregations = self.aggregations.lock();
        let aggregation = aggregations
            .entry(fingerprint.clone())
            .or_insert_with(|| ErrorAggregation::new(fingerprint, record));
        aggregation.fold(record);
        aggregation.count
    }

    /// The `n` most frequent aggregations; ties go to the most recently seen
    pub fn get_top_errors(&self, n: usize) -> Vec<ErrorAggregation> {
        let mut all: Vec<_> = self.aggregations.lock().values().cloned().collect();
        all.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_seen_at.cmp(&a.last_seen_at))
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        all.truncate(n);
        all
    }

    pub fn get(&self, fingerprint: &str) -> Option<ErrorAggregation> {
        self.aggregations.lock().get(fingerprint).cloned()
    }

    pub fn len(&self) -> usize {
        self.aggregations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregations.lock().is_empty()
    }

    pub fn clear(&self) {
        self.aggregations.lock().clear();
    }

    /// Aggregate every record the manager stores from now on
    pub fn attach(&self, manager: &ErrorManager) -> Subscription {
        let aggregator = self.clone();
        manager.subscribe(move |record| {
            aggregator.aggregate_error(record);
        })
    }
}
