//! Failure containment for a delimited scope
//!
//! An [`ErrorBoundary`] wraps a render scope. While the boundary is ok the
//! scope runs and its output is returned as content. A scope that returns an
//! error or panics is caught: the failure is classified, reported to the
//! attached [`ErrorManager`], handed to `on_error` and run through the
//! configured [`RecoveryStrategy`] list. While failed the scope is not invoked
//! and the fallback is rendered instead.
//!
//! ```text
//!          render(scope) ok
//!        ┌──────────────────┐
//!        ▼                  │
//!     ┌────┐  scope fails ┌────────┐
//!     │ ok │ ───────────▶ │ failed │ ── render() ──▶ fallback
//!     └────┘ ◀─────────── └────────┘
//!               retry()
//! ```
//!
//! Containment is strict: a boundary only sees failures raised inside its own
//! scope. A nested boundary handles its own failures, so the enclosing scope
//! keeps rendering content.

use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::manager::ErrorManager;
use crate::record::{
    classify, Attribution, ClassifyHints, ErrorCategory, ErrorRecord, ErrorSeverity, RawFailure,
};

type FallbackRender<N> = Arc<dyn Fn(&ErrorRecord, &RetryHandle) -> N + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&ErrorRecord, &ErrorInfo) + Send + Sync>;
type RecoveryCallback = Arc<dyn Fn(&ErrorRecord, u32) -> bool + Send + Sync>;

/// What a boundary produced for one render
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryOutput<N> {
    /// Normal output of the scope
    Content(N),
    /// Configured fallback while failed
    Fallback(N),
    /// Generic failure placeholder when no fallback is configured
    Placeholder { message: String },
}

impl<N> BoundaryOutput<N> {
    pub fn is_content(&self) -> bool {
        matches!(self, BoundaryOutput::Content(_))
    }

    pub fn into_content(self) -> Option<N> {
        match self {
            BoundaryOutput::Content(node) => Some(node),
            _ => None,
        }
    }
}

/// Fallback rendered while the boundary is failed
pub struct BoundaryFallback<N> {
    render: FallbackRender<N>,
}

impl<N> Clone for BoundaryFallback<N> {
    fn clone(&self) -> Self {
        Self {
            render: Arc::clone(&self.render),
        }
    }
}

impl<N> BoundaryFallback<N> {
    /// Static fallback node
    pub fn node(node: N) -> Self
    where
        N: Clone + Send + Sync + 'static,
    {
        Self {
            render: Arc::new(move |_, _| node.clone()),
        }
    }

    /// Fallback built from the caught error and a retry handle
    pub fn render<F>(f: F) -> Self
    where
        F: Fn(&ErrorRecord, &RetryHandle) -> N + Send + Sync + 'static,
    {
        Self { render: Arc::new(f) }
    }
}

/// Strategy applied after a failure has been caught
#[derive(Clone)]
pub enum RecoveryStrategy {
    /// Ask `on_recovery` up to `max_retries` times whether the cause is gone;
    /// the first `true` clears the boundary via [`ErrorBoundary::retry`]
    Retry {
        max_retries: u32,
        on_recovery: Option<RecoveryCallback>,
    },
    /// Clear the failure immediately
    Ignore,
    /// Stay failed and render the fallback
    Fallback,
}

impl RecoveryStrategy {
    pub fn retry<F>(max_retries: u32, on_recovery: F) -> Self
    where
        F: Fn(&ErrorRecord, u32) -> bool + Send + Sync + 'static,
    {
        RecoveryStrategy::Retry {
            max_retries,
            on_recovery: Some(Arc::new(on_recovery)),
        }
    }
}

impl fmt::Debug for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryStrategy::Retry {
                max_retries,
                on_recovery,
            } => f
                .debug_struct("Retry")
                .field("max_retries", max_retries)
                .field("on_recovery", &on_recovery.is_some())
                .finish(),
            RecoveryStrategy::Ignore => write!(f, "Ignore"),
            RecoveryStrategy::Fallback => write!(f, "Fallback"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorInfo {
    pub retry_attempts: u32,
    /// Innermost component first
    pub component_stack: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BoundaryState {
    pub has_error: bool,
    pub error: Option<ErrorRecord>,
    pub error_info: ErrorInfo,
}

impl BoundaryState {
    fn retry(&mut self) -> bool {
        if !self.has_error {
            return false;
        }
        self.has_error = false;
        self.error = None;
        self.error_info.retry_attempts += 1;
        true
    }
}

/// Extra information supplied with a caught failure
#[derive(Debug, Clone, Default)]
pub struct CatchContext {
    pub component_stack: Vec<String>,
    pub category: Option<ErrorCategory>,
    pub severity: Option<ErrorSeverity>,
}

impl CatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component_stack(mut self, stack: Vec<String>) -> Self {
        self.component_stack = stack;
        self
    }

    pub fn category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = Some(severity);
        self
    }
}

/// Cloneable handle that retries the boundary it was created from
#[derive(Clone)]
pub struct RetryHandle {
    state: Arc<Mutex<BoundaryState>>,
}

impl RetryHandle {
    /// Same as [`ErrorBoundary::retry`]
    pub fn retry(&self) -> bool {
        self.state.lock().retry()
    }
}

impl fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandle").finish_non_exhaustive()
    }
}

/// Construction options for [`ErrorBoundary`]
pub struct BoundaryOptions<N> {
    pub name: String,
    pub fallback: Option<BoundaryFallback<N>>,
    pub on_error: Option<ErrorCallback>,
    pub recovery: Vec<RecoveryStrategy>,
    pub attribution: Option<Attribution>,
    pub manager: Option<Arc<ErrorManager>>,
}

impl<N> Default for BoundaryOptions<N> {
    fn default() -> Self {
        Self {
            name: "boundary".to_string(),
            fallback: None,
            on_error: None,
            recovery: Vec::new(),
            attribution: None,
            manager: None,
        }
    }
}

impl<N> BoundaryOptions<N> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn fallback(mut self, fallback: BoundaryFallback<N>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ErrorRecord, &ErrorInfo) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn recovery(mut self, strategy: RecoveryStrategy) -> Self {
        self.recovery.push(strategy);
        self
    }

    pub fn attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = Some(attribution);
        self
    }

    pub fn manager(mut self, manager: Arc<ErrorManager>) -> Self {
        self.manager = Some(manager);
        self
    }
}

pub struct ErrorBoundary<N> {
    options: BoundaryOptions<N>,
    state: Arc<Mutex<BoundaryState>>,
}

impl<N> ErrorBoundary<N> {
    pub fn new(options: BoundaryOptions<N>) -> Self {
        Self {
            options,
            state: Arc::new(Mutex::new(BoundaryState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Render the scope, or the fallback while failed
    pub fn render<F, E>(&self, scope: F) -> BoundaryOutput<N>
    where
        F: FnOnce() -> Result<N, E>,
        E: Into<RawFailure>,
    {
        if self.has_error() {
            return self.render_failed();
        }

        let failure = match catch_unwind(AssertUnwindSafe(scope)) {
            Ok(Ok(node)) => return BoundaryOutput::Content(node),
            Ok(Err(error)) => error.into(),
            Err(payload) => RawFailure::from_panic(payload),
        };
        let record = self.catch(failure, CatchContext::default());
        self.render_fallback(&record)
    }

    /// Async variant of [`render`](Self::render)
    pub async fn render_async<F, Fut, E>(&self, scope: F) -> BoundaryOutput<N>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<N, E>>,
        E: Into<RawFailure>,
    {
        if self.has_error() {
            return self.render_failed();
        }

        let failure = match AssertUnwindSafe(scope()).catch_unwind().await {
            Ok(Ok(node)) => return BoundaryOutput::Content(node),
            Ok(Err(error)) => error.into(),
            Err(payload) => RawFailure::from_panic(payload),
        };
        let record = self.catch(failure, CatchContext::default());
        self.render_fallback(&record)
    }

    /// Record a failure from this boundary's scope and run recovery.
    ///
    /// Returns the classified record, annotated with the recovery outcome.
    /// The stored error and the manager's copy carry the same annotations.
    pub fn catch(&self, failure: impl Into<RawFailure>, context: CatchContext) -> ErrorRecord {
        let mut hints = ClassifyHints::new()
            .category(context.category.unwrap_or(ErrorCategory::Component))
            .severity(context.severity.unwrap_or(ErrorSeverity::High));
        if let Some(attribution) = &self.options.attribution {
            hints = hints.attribution(attribution.clone());
        }
        let mut record = classify(failure, hints);

        let error_info = {
            let mut state = self.state.lock();
            state.has_error = true;
            state.error = Some(record.clone());
            state.error_info.component_stack = context.component_stack;
            state.error_info.clone()
        };
        warn!(
            boundary = %self.options.name,
            id = %record.id(),
            error = %record.message(),
            "boundary caught failure"
        );

        if let Some(on_error) = &self.options.on_error {
            on_error(&record, &error_info);
        }

        self.recover(&mut record);
        {
            let mut state = self.state.lock();
            if let Some(stored) = state.error.as_mut().filter(|e| e.id() == record.id()) {
                *stored = record.clone();
            }
        }

        if let Some(manager) = &self.options.manager {
            manager.report(record.clone());
        }
        record
    }

    fn recover(&self, record: &mut ErrorRecord) {
        for strategy in &self.options.recovery {
            match strategy {
                RecoveryStrategy::Retry {
                    max_retries,
                    on_recovery,
                } => {
                    let Some(on_recovery) = on_recovery else {
                        continue;
                    };
                    for attempt in 1..=*max_retries {
                        if on_recovery(&*record, attempt) {
                            self.retry();
                            record.annotate(format!("recovered by retry on attempt {}", attempt));
                            info!(boundary = %self.options.name, attempt, "boundary recovered");
                            return;
                        }
                    }
                    record.annotate(format!("retry exhausted after {} attempts", max_retries));
                }
                RecoveryStrategy::Ignore => {
                    let mut state = self.state.lock();
                    state.has_error = false;
                    state.error = None;
                    record.annotate("ignored");
                    debug!(boundary = %self.options.name, "failure ignored");
                    return;
                }
                RecoveryStrategy::Fallback => {
                    record.annotate("fallback");
                    return;
                }
            }
        }
    }

    /// Leave the failed state. No-op while ok.
    pub fn retry(&self) -> bool {
        self.state.lock().retry()
    }

    pub fn retry_handle(&self) -> RetryHandle {
        RetryHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Return to the initial state, forgetting retry attempts
    pub fn reset(&self) {
        *self.state.lock() = BoundaryState::default();
    }

    pub fn has_error(&self) -> bool {
        self.state.lock().has_error
    }

    pub fn error(&self) -> Option<ErrorRecord> {
        self.state.lock().error.clone()
    }

    pub fn retry_attempts(&self) -> u32 {
        self.state.lock().error_info.retry_attempts
    }

    pub fn state(&self) -> BoundaryState {
        self.state.lock().clone()
    }

    fn render_failed(&self) -> BoundaryOutput<N> {
        match self.error() {
            Some(record) => self.render_fallback(&record),
            None => BoundaryOutput::Placeholder {
                message: "Unknown error".to_string(),
            },
        }
    }

    // the frame that caught a failure renders the fallback even if recovery
    // already cleared the boundary
    fn render_fallback(&self, record: &ErrorRecord) -> BoundaryOutput<N> {
        match &self.options.fallback {
            Some(fallback) => BoundaryOutput::Fallback((fallback.render)(record, &self.retry_handle())),
            None => BoundaryOutput::Placeholder {
                message: record.message().to_string(),
            },
        }
    }
}
