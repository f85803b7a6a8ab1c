//! Structured, batched logging with context sanitization
//!
//! Entries below the configured level are discarded. Accepted entries have
//! their context sanitized at write time, are kept in a bounded history and
//! queued for delivery. The queue is flushed to every enabled
//! [`LogDestination`] when `batch_size` entries accumulate or `batch_timeout`
//! elapses after the first queued entry, whichever comes first.
//!
//! The timeout flush is a task on the current tokio runtime. Outside a
//! runtime there is no timer, and each entry is delivered as it is written.

mod destination;
mod sanitize;

pub use destination::{LogDestination, MemoryDestination, TracingDestination};
pub use sanitize::{is_sensitive_key, sanitize_context};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{trace, warn};

use crate::config::LoggerConfig;
use crate::error::AegisError;

/// Log levels, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = AegisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(AegisError::validation(
                "log_level",
                format!("unknown log level '{}'", other),
            )),
        }
    }
}

/// A single accepted log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Sanitized context
    pub context: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub component: Option<String>,
}

struct LoggerState {
    level: LogLevel,
    pending: Vec<LogEntry>,
    history: VecDeque<LogEntry>,
    /// Bumped whenever the pending queue is taken for delivery
    generation: u64,
}

struct LoggerInner {
    config: LoggerConfig,
    state: Mutex<LoggerState>,
    destinations: Mutex<Vec<Arc<dyn LogDestination>>>,
    // serializes deliveries so batches arrive in order
    delivery: tokio::sync::Mutex<()>,
}

impl LoggerInner {
    async fn flush(&self, expected_generation: Option<u64>) {
        let _delivery = self.delivery.lock().await;

        let batch = {
            let mut state = self.state.lock();
            let stale = expected_generation.is_some_and(|g| g != state.generation);
            if stale || state.pending.is_empty() {
                return;
            }
            state.generation += 1;
            std::mem::take(&mut state.pending)
        };

        let destinations = self.destinations.lock().clone();
        for destination in destinations {
            if !destination.is_enabled() {
                continue;
            }
            if let Err(e) = destination.send(&batch).await {
                warn!(
                    destination = destination.name(),
                    entries = batch.len(),
                    error = %e,
                    "log destination failed"
                );
            }
        }
    }
}

/// Leveled logger with batched delivery to pluggable destinations
#[derive(Clone)]
pub struct StructuredLogger {
    inner: Arc<LoggerInner>,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}

impl StructuredLogger {
    pub fn new(config: LoggerConfig) -> Self {
        let config = config.normalized();
        Self {
            inner: Arc::new(LoggerInner {
                state: Mutex::new(LoggerState {
                    level: config.level,
                    pending: Vec::new(),
                    history: VecDeque::new(),
                    generation: 0,
                }),
                config,
                destinations: Mutex::new(Vec::new()),
                delivery: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Register a destination. Delivery follows registration order.
    pub fn add_destination(&self, destination: Arc<dyn LogDestination>) {
        self.inner.destinations.lock().push(destination);
    }

    pub fn with_destination(self, destination: Arc<dyn LogDestination>) -> Self {
        self.add_destination(destination);
        self
    }

    pub fn level(&self) -> LogLevel {
        self.inner.state.lock().level
    }

    pub fn set_level(&self, level: LogLevel) {
        self.inner.state.lock().level = level;
    }

    pub async fn log(&self, level: LogLevel, message: impl Into<String>, context: Value) {
        self.write(level, None, message.into(), context).await;
    }

    /// Log on behalf of a named component
    pub async fn log_component(
        &self,
        level: LogLevel,
        component: impl Into<String>,
        message: impl Into<String>,
        context: Value,
    ) {
        self.write(level, Some(component.into()), message.into(), context)
            .await;
    }

    pub async fn debug(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Debug, message, context).await;
    }

    pub async fn info(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Info, message, context).await;
    }

    pub async fn warn(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Warn, message, context).await;
    }

    pub async fn error(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Error, message, context).await;
    }

    pub async fn fatal(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Fatal, message, context).await;
    }

    /// Deliver all queued entries now
    pub async fn flush(&self) {
        self.inner.flush(None).await;
    }

    /// Accepted entries still held in history, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.state.lock().history.iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn clear_history(&self) {
        self.inner.state.lock().history.clear();
    }

    async fn write(
        &self,
        level: LogLevel,
        component: Option<String>,
        message: String,
        context: Value,
    ) {
        let config = &self.inner.config;
        let (flush_now, schedule) = {
            let mut state = self.inner.state.lock();
            if level < state.level {
                return;
            }

            let entry = LogEntry {
                level,
                message,
                context: sanitize_context(into_map(context), &config.sensitive_keys),
                timestamp: Utc::now(),
                component,
            };
            trace!(level = %entry.level, "log entry accepted");

            state.history.push_back(entry.clone());
            while state.history.len() > config.max_entries {
                state.history.pop_front();
            }
            state.pending.push(entry);

            let flush_now = state.pending.len() >= config.batch_size;
            let schedule = (!flush_now && state.pending.len() == 1).then_some(state.generation);
            (flush_now, schedule)
        };

        if flush_now {
            self.inner.flush(None).await;
        } else if let Some(generation) = schedule {
            match Handle::try_current() {
                Ok(handle) => spawn_timeout_flush(
                    &handle,
                    Arc::clone(&self.inner),
                    generation,
                    config.batch_timeout,
                ),
                // no timer without a tokio runtime
                Err(_) => self.inner.flush(None).await,
            }
        }
    }
}

// The task keeps the logger alive until its batch is delivered, so entries
// queued before the last handle is dropped still reach the destinations.
fn spawn_timeout_flush(
    handle: &Handle,
    inner: Arc<LoggerInner>,
    generation: u64,
    timeout: std::time::Duration,
) {
    handle.spawn(async move {
        tokio::time::sleep(timeout).await;
        inner.flush(Some(generation)).await;
    });
}

fn into_map(context: Value) -> Map<String, Value> {
    match context {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
