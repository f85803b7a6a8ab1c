//! Circuit Breaker Pattern for Fault Tolerance
//!
//! The circuit breaker stops calling a persistently failing dependency and
//! periodically lets a single trial call through to probe for recovery.
//!
//! ## Pattern Implementation
//!
//! The circuit breaker has three states:
//! - **Closed**: Normal operation, every outcome is counted
//! - **Open**: Failing fast, calls are rejected without invoking the operation
//! - **Half-Open**: Exactly one trial call is in flight
//!
//! The breaker opens once at least `minimum_throughput` calls have been
//! observed and the failure rate reaches `failure_threshold`. After
//! `reset_timeout` the next call becomes the half-open trial: success closes
//! the breaker and resets the counters, failure reopens it with a fresh
//! `opened_at`.
//!
//! A call whose future is dropped before completing, or which resolves to
//! [`AegisError::Cancelled`], is recorded as neither a success nor a failure.
//!
//! ## Usage Example
//!
//! ```rust
//! use std::time::Duration;
//! use aegis_core::patterns::CircuitBreakerBuilder;
//!
//! # async fn example() -> aegis_core::error::AegisResult<()> {
//! let breaker = CircuitBreakerBuilder::new("profile-api")
//!     .failure_threshold(0.5)
//!     .minimum_throughput(4)
//!     .reset_timeout(Duration::from_secs(30))
//!     .build();
//!
//! let profile = breaker.execute(|| async { Ok::<_, aegis_core::error::AegisError>("alice") }).await?;
//! assert_eq!(profile, "alice");
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::defaults::{
    DEFAULT_BREAKER_FAILURE_THRESHOLD, DEFAULT_BREAKER_MINIMUM_THROUGHPUT,
    DEFAULT_BREAKER_RESET_TIMEOUT_MS,
};
use crate::error::{AegisError, AegisResult};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitBreakerState {
    /// Normal operation - requests pass through
    Closed,
    /// Failing fast - requests are rejected immediately
    Open,
    /// A single trial request is probing the dependency
    HalfOpen,
}

impl std::fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerState::Closed => write!(f, "closed"),
            CircuitBreakerState::Open => write!(f, "open"),
            CircuitBreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure ratio (0.0 - 1.0) at which the circuit opens
    pub failure_threshold: f64,
    /// Time to wait before transitioning from Open to Half-Open
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
    /// Minimum number of calls before the failure rate is considered
    pub minimum_throughput: u32,
    /// Enable automatic logging of state transitions
    pub enable_logging: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_BREAKER_FAILURE_THRESHOLD,
            reset_timeout: Duration::from_millis(DEFAULT_BREAKER_RESET_TIMEOUT_MS),
            minimum_throughput: DEFAULT_BREAKER_MINIMUM_THROUGHPUT,
            enable_logging: true,
        }
    }
}

impl CircuitBreakerConfig {
    fn normalized(mut self, name: &str) -> Self {
        if !(0.0..=1.0).contains(&self.failure_threshold) {
            let clamped = if self.failure_threshold.is_nan() {
                DEFAULT_BREAKER_FAILURE_THRESHOLD
            } else {
                self.failure_threshold.clamp(0.0, 1.0)
            };
            warn!(
                breaker = name,
                requested = self.failure_threshold,
                clamped,
                "failure_threshold out of range"
            );
            self.failure_threshold = clamped;
        }
        if self.minimum_throughput == 0 {
            warn!(breaker = name, "minimum_throughput of 0 clamped to 1");
            self.minimum_throughput = 1;
        }
        self
    }
}

/// Snapshot of circuit breaker metrics
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerMetrics {
    /// Current state of the circuit breaker
    pub state: CircuitBreakerState,
    /// Successful calls in the current window
    pub success_count: u64,
    /// Failed calls in the current window
    pub failure_count: u64,
    /// Always `success_count + failure_count`
    pub request_count: u64,
    /// Current failure rate (0.0 - 1.0)
    pub failure_rate: f64,
    /// Calls rejected without invoking the operation
    pub rejected_count: u64,
    /// Time when the last failure occurred
    pub last_failure_at: Option<Instant>,
    /// Time when the circuit was last opened
    pub opened_at: Option<Instant>,
}

/// Internal state for circuit breaker
struct BreakerInner {
    state: CircuitBreakerState,
    success_count: u64,
    failure_count: u64,
    rejected_count: u64,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            success_count: 0,
            failure_count: 0,
            rejected_count: 0,
            last_failure_at: None,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    fn request_count(&self) -> u64 {
        self.success_count + self.failure_count
    }

    fn failure_rate(&self) -> f64 {
        let requests = self.request_count();
        if requests == 0 {
            0.0
        } else {
            self.failure_count as f64 / requests as f64
        }
    }
}

/// Circuit breaker guarding a single call site
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker. Out-of-range settings are clamped.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        let config = config.normalized(&name);
        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    /// Get the name of this circuit breaker
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitBreakerState {
        self.inner.lock().state
    }

    /// Get current circuit breaker metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            success_count: inner.success_count,
            failure_count: inner.failure_count,
            request_count: inner.request_count(),
            failure_rate: inner.failure_rate(),
            rejected_count: inner.rejected_count,
            last_failure_at: inner.last_failure_at,
            opened_at: inner.opened_at,
        }
    }

    /// Execute an operation through the circuit breaker
    ///
    /// When the circuit is open this returns [`AegisError::CircuitOpen`]
    /// before the first poll suspends, and `operation` is never invoked.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> AegisResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AegisResult<T>>,
    {
        let mut permit = self.acquire()?;
        let result = operation().await;
        match &result {
            Ok(_) => permit.record(Outcome::Success),
            Err(err) if err.is_cancelled() => permit.record(Outcome::Cancelled),
            Err(_) => permit.record(Outcome::Failure),
        }
        result
    }

    /// Decide whether a call may proceed, moving Open to Half-Open if due
    fn acquire(&self) -> AegisResult<CallPermit<'_>> {
        let mut inner = self.inner.lock();
        let trial = match inner.state {
            CircuitBreakerState::Closed => false,
            CircuitBreakerState::Open => {
                let due = inner
                    .opened_at
                    .map_or(true, |opened| opened.elapsed() >= self.config.reset_timeout);
                if !due {
                    return Err(self.reject(&mut inner));
                }
                inner.state = CircuitBreakerState::HalfOpen;
                inner.trial_in_flight = true;
                if self.config.enable_logging {
                    info!(breaker = %self.name, "circuit breaker transitioning to half-open");
                }
                true
            }
            CircuitBreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(self.reject(&mut inner));
                }
                inner.trial_in_flight = true;
                true
            }
        };
        Ok(CallPermit {
            breaker: self,
            trial,
            done: false,
        })
    }

    fn reject(&self, inner: &mut BreakerInner) -> AegisError {
        inner.rejected_count += 1;
        if self.config.enable_logging {
            debug!(breaker = %self.name, state = %inner.state, "call rejected");
        }
        AegisError::CircuitOpen {
            name: self.name.clone(),
        }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.trial_in_flight = false;
            inner.state = CircuitBreakerState::Closed;
            inner.success_count = 0;
            inner.failure_count = 0;
            inner.opened_at = None;
            if self.config.enable_logging {
                info!(breaker = %self.name, "circuit breaker closed after successful trial");
            }
            return;
        }
        inner.success_count += 1;
    }

    fn on_failure(&self, trial: bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure_at = Some(now);

        if trial {
            inner.trial_in_flight = false;
            inner.state = CircuitBreakerState::Open;
            inner.opened_at = Some(now);
            if self.config.enable_logging {
                warn!(breaker = %self.name, "circuit breaker reopening after failed trial");
            }
            return;
        }

        if inner.state == CircuitBreakerState::Closed
            && inner.request_count() >= u64::from(self.config.minimum_throughput)
            && inner.failure_rate() >= self.config.failure_threshold
        {
            inner.state = CircuitBreakerState::Open;
            inner.opened_at = Some(now);
            if self.config.enable_logging {
                warn!(
                    breaker = %self.name,
                    failure_rate = inner.failure_rate(),
                    requests = inner.request_count(),
                    "circuit breaker opening"
                );
            }
        }
    }

    /// Trial abandoned without an outcome: back to open, keeping `opened_at`
    fn on_abandoned_trial(&self) {
        let mut inner = self.inner.lock();
        inner.trial_in_flight = false;
        if inner.state == CircuitBreakerState::HalfOpen {
            inner.state = CircuitBreakerState::Open;
        }
        if self.config.enable_logging {
            debug!(breaker = %self.name, "half-open trial cancelled");
        }
    }
}

enum Outcome {
    Success,
    Failure,
    Cancelled,
}

/// Admission for one call; releases a half-open trial slot if dropped early
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    done: bool,
}

impl CallPermit<'_> {
    fn record(&mut self, outcome: Outcome) {
        self.done = true;
        match outcome {
            Outcome::Success => self.breaker.on_success(self.trial),
            Outcome::Failure => self.breaker.on_failure(self.trial),
            Outcome::Cancelled if self.trial => self.breaker.on_abandoned_trial(),
            Outcome::Cancelled => {}
        }
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.done && self.trial {
            self.breaker.on_abandoned_trial();
        }
    }
}

/// Circuit breaker builder for easier configuration
pub struct CircuitBreakerBuilder {
    name: String,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerBuilder {
    /// Create a new circuit breaker builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig::default(),
        }
    }

    /// Set the failure ratio threshold
    pub fn failure_threshold(mut self, threshold: f64) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set the reset timeout
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    /// Set the minimum request count before tripping
    pub fn minimum_throughput(mut self, throughput: u32) -> Self {
        self.config.minimum_throughput = throughput;
        self
    }

    /// Enable or disable logging
    pub fn enable_logging(mut self, enable: bool) -> Self {
        self.config.enable_logging = enable;
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(self.name, self.config)
    }
}
