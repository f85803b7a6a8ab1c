//! Recurring-group and cascade detection over a set of records

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::PatternConfig;
use crate::record::ErrorRecord;

/// Attribute used to group records into recurring patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    #[default]
    Category,
    Severity,
    Component,
}

const UNATTRIBUTED: &str = "unattributed";

impl GroupingKey {
    fn key_for(&self, record: &ErrorRecord) -> String {
        match self {
            GroupingKey::Category => record.category().to_string(),
            GroupingKey::Severity => record.severity().to_string(),
            GroupingKey::Component => record.component_id().unwrap_or(UNATTRIBUTED).to_string(),
        }
    }
}

/// A group whose size reached the configured minimum
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringPattern {
    pub key: String,
    pub count: usize,
    pub record_ids: Vec<String>,
    pub first_seen_at: Instant,
    pub last_seen_at: Instant,
}

/// Maximal run of records each within the cascade gap of its predecessor
#[derive(Debug, Clone, PartialEq)]
pub struct Cascade {
    /// Record ids in time order
    pub record_ids: Vec<String>,
    pub started_at: Instant,
    pub ended_at: Instant,
}

impl Cascade {
    pub fn len(&self) -> usize {
        self.record_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_ids.is_empty()
    }

    pub fn duration(&self) -> Duration {
        self.ended_at.saturating_duration_since(self.started_at)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternReport {
    /// Sorted by count, largest first
    pub recurring: Vec<RecurringPattern>,
    /// In time order
    pub cascades: Vec<Cascade>,
}

#[derive(Debug, Clone, Default)]
pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    pub fn analyze_patterns(&self, records: &[ErrorRecord]) -> PatternReport {
        let mut ordered: Vec<&ErrorRecord> = records.iter().collect();
        ordered.sort_by_key(|record| record.timestamp());

        PatternReport {
            recurring: self.recurring(&ordered),
            cascades: self.cascades(&ordered),
        }
    }

    fn recurring(&self, ordered: &[&ErrorRecord]) -> Vec<RecurringPattern> {
        let mut groups: HashMap<String, RecurringPattern> = HashMap::new();
        for record in ordered {
            let key = self.config.grouping.key_for(record);
            let group = groups.entry(key.clone()).or_insert_with(|| RecurringPattern {
                key,
                count: 0,
                record_ids: Vec::new(),
                first_seen_at: record.timestamp(),
                last_seen_at: record.timestamp(),
            });
            group.count += 1;
            group.record_ids.push(record.id().to_string());
            group.last_seen_at = record.timestamp();
        }

        let mut recurring: Vec<_> = groups
            .into_values()
            .filter(|group| group.count >= self.config.min_occurrences)
            .collect();
        recurring.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        recurring
    }

    fn cascades(&self, ordered: &[&ErrorRecord]) -> Vec<Cascade> {
        let gap = self.config.cascade_gap;
        let mut cascades = Vec::new();
        let mut run: Vec<&ErrorRecord> = Vec::new();

        for &record in ordered {
            if let Some(previous) = run.last() {
                if record.timestamp().saturating_duration_since(previous.timestamp()) > gap {
                    push_run(&mut cascades, &run);
                    run.clear();
                }
            }
            run.push(record);
        }
        push_run(&mut cascades, &run);
        cascades
    }
}

fn push_run(cascades: &mut Vec<Cascade>, run: &[&ErrorRecord]) {
    if let [first, .., last] = run {
        cascades.push(Cascade {
            record_ids: run.iter().map(|r| r.id().to_string()).collect(),
            started_at: first.timestamp(),
            ended_at: last.timestamp(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Attribution, ErrorCategory, ErrorSeverity};
    use pretty_assertions::assert_eq;

    fn at(base: Instant, ms: u64, message: &str) -> ErrorRecord {
        ErrorRecord::new(message).with_timestamp(base + Duration::from_millis(ms))
    }

    #[test]
    fn test_single_cascade_of_three() {
        let base = Instant::now();
        let records = vec![at(base, 0, "a"), at(base, 500, "b"), at(base, 800, "c")];
        let report = PatternDetector::default().analyze_patterns(&records);

        assert_eq!(report.cascades.len(), 1);
        assert_eq!(report.cascades[0].len(), 3);
        assert_eq!(report.cascades[0].duration(), Duration::from_millis(800));
    }

    #[test]
    fn test_late_record_is_isolated() {
        let base = Instant::now();
        let records = vec![at(base, 0, "a"), at(base, 500, "b"), at(base, 5000, "c")];
        let report = PatternDetector::default().analyze_patterns(&records);

        assert_eq!(report.cascades.len(), 1);
        assert_eq!(
            report.cascades[0].record_ids,
            vec![records[0].id().to_string(), records[1].id().to_string()]
        );
    }

    #[test]
    fn test_unordered_input_and_exact_gap() {
        let base = Instant::now();
        let records = vec![at(base, 2000, "c"), at(base, 0, "a"), at(base, 1000, "b")];
        let report = PatternDetector::default().analyze_patterns(&records);

        assert_eq!(report.cascades.len(), 1);
        assert_eq!(report.cascades[0].len(), 3);
    }

    #[test]
    fn test_isolated_records_produce_no_cascade() {
        let base = Instant::now();
        let records = vec![at(base, 0, "a"), at(base, 3000, "b")];
        assert!(PatternDetector::default()
            .analyze_patterns(&records)
            .cascades
            .is_empty());
        assert_eq!(PatternDetector::default().analyze_patterns(&[]), PatternReport::default());
    }

    #[test]
    fn test_recurring_categories() {
        let records = vec![
            ErrorRecord::new("1").with_category(ErrorCategory::Network),
            ErrorRecord::new("2").with_category(ErrorCategory::Network),
            ErrorRecord::new("3").with_category(ErrorCategory::Network),
            ErrorRecord::new("4").with_category(ErrorCategory::State),
            ErrorRecord::new("5").with_category(ErrorCategory::Validation),
            ErrorRecord::new("6").with_category(ErrorCategory::Validation),
        ];
        let report = PatternDetector::default().analyze_patterns(&records);

        let summary: Vec<_> = report
            .recurring
            .iter()
            .map(|p| (p.key.as_str(), p.count))
            .collect();
        assert_eq!(summary, vec![("network", 3), ("validation", 2)]);
    }

    #[test]
    fn test_grouping_by_component_and_severity() {
        let records = vec![
            ErrorRecord::new("1").with_attribution(Attribution::new("cart")),
            ErrorRecord::new("2")
                .with_attribution(Attribution::new("cart"))
                .with_severity(ErrorSeverity::High),
            ErrorRecord::new("3"),
            ErrorRecord::new("4").with_severity(ErrorSeverity::High),
        ];

        let by_component = PatternDetector::new(PatternConfig {
            grouping: GroupingKey::Component,
            ..Default::default()
        })
        .analyze_patterns(&records);
        let keys: Vec<_> = by_component.recurring.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["cart", "unattributed"]);

        let by_severity = PatternDetector::new(PatternConfig {
            grouping: GroupingKey::Severity,
            min_occurrences: 1,
            ..Default::default()
        })
        .analyze_patterns(&records);
        let keys: Vec<_> = by_severity.recurring.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["HIGH", "MEDIUM"]);
    }
}
