//! Log destinations
//!
//! A destination receives flushed batches from the [`StructuredLogger`](super::StructuredLogger).

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use super::{LogEntry, LogLevel};
use crate::error::AegisResult;

/// Sink for batches of log entries
#[async_trait]
pub trait LogDestination: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, batch: &[LogEntry]) -> AegisResult<()>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Console sink that re-emits entries through `tracing`
#[derive(Debug)]
pub struct TracingDestination {
    name: String,
    enabled: AtomicBool,
}

impl TracingDestination {
    pub fn new() -> Self {
        Self {
            name: "console".to_string(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

impl Default for TracingDestination {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogDestination for TracingDestination {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, batch: &[LogEntry]) -> AegisResult<()> {
        for entry in batch {
            let context = Value::Object(entry.context.clone());
            let component = entry.component.as_deref().unwrap_or("-");
            match entry.level {
                LogLevel::Debug => {
                    debug!(target: "aegis::log", component, %context, "{}", entry.message)
                }
                LogLevel::Info => {
                    info!(target: "aegis::log", component, %context, "{}", entry.message)
                }
                LogLevel::Warn => {
                    warn!(target: "aegis::log", component, %context, "{}", entry.message)
                }
                LogLevel::Error | LogLevel::Fatal => error!(
                    target: "aegis::log",
                    component,
                    %context,
                    level = %entry.level,
                    "{}",
                    entry.message
                ),
            }
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

/// In-memory sink, mostly useful in tests
#[derive(Debug)]
pub struct MemoryDestination {
    name: String,
    enabled: AtomicBool,
    entries: Mutex<Vec<LogEntry>>,
    batches: Mutex<Vec<usize>>,
}

impl MemoryDestination {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(true),
            entries: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Every entry received so far, in delivery order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Sizes of the batches received so far
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl LogDestination for MemoryDestination {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, batch: &[LogEntry]) -> AegisResult<()> {
        self.batches.lock().push(batch.len());
        self.entries.lock().extend_from_slice(batch);
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}
