//! Retry and backoff patterns for handling transient failures
//!
//! A [`RetryPolicy`] re-executes a fallible operation up to `max_attempts`
//! times. The delay before attempt `n + 1` is
//! `base_delay * backoff_multiplier^(n - 1)`, optionally capped and jittered.
//!
//! Retryability is decided by the error's [`ErrorKind`]:
//! - a non-empty `non_retryable_errors` list vetoes matching kinds
//! - a non-empty `retryable_errors` list is exhaustive: anything not on it is
//!   surfaced immediately
//! - with both lists empty every error is retried
//!
//! Errors produced by the resilience layer itself (`CircuitOpen`,
//! `Cancelled`) are never retried.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::defaults::{
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MULTIPLIER,
};
use crate::error::{AegisError, AegisResult, ErrorKind};
use crate::patterns::cancellation::CancelToken;

/// Jitter strategy for retry delays
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum JitterStrategy {
    /// No jitter applied
    #[default]
    None,
    /// Scale the delay by a random factor in `min..max`
    Proportional { min: f64, max: f64 },
    /// Random delay between 0 and the calculated delay
    Full,
}

/// Configuration for retry operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial attempt)
    pub max_attempts: u32,
    /// Delay before the second attempt
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Growth factor applied per attempt
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Option<Duration>,
    pub jitter: JitterStrategy,
    /// If non-empty, only these kinds are retried
    pub retryable_errors: Vec<ErrorKind>,
    /// Kinds that are never retried
    pub non_retryable_errors: Vec<ErrorKind>,
    /// Per-operation identifier for better observability
    pub operation_name: Option<String>,
    /// Enable detailed retry logging
    pub enable_logging: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            backoff_multiplier: DEFAULT_RETRY_MULTIPLIER,
            max_delay: None,
            jitter: JitterStrategy::None,
            retryable_errors: Vec::new(),
            non_retryable_errors: Vec::new(),
            operation_name: None,
            enable_logging: true,
        }
    }
}

impl RetryConfig {
    /// Create a simple fixed delay retry config
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            base_delay: delay,
            backoff_multiplier: 1.0,
            ..Default::default()
        }
    }

    /// Create an exponential backoff retry config
    pub fn exponential(attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: attempts,
            base_delay,
            backoff_multiplier: multiplier,
            ..Default::default()
        }
    }

    /// Set operation name for better observability
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Enable or disable logging
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    pub fn retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable_errors = kinds.into_iter().collect();
        self
    }

    pub fn non_retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.non_retryable_errors = kinds.into_iter().collect();
        self
    }

    /// Clamp out-of-range values to usable ones
    fn normalized(mut self) -> Self {
        if self.max_attempts == 0 {
            warn!("retry max_attempts of 0 clamped to 1");
            self.max_attempts = 1;
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            warn!(
                multiplier = self.backoff_multiplier,
                "retry backoff_multiplier clamped to 1.0"
            );
            self.backoff_multiplier = 1.0;
        }
        self
    }
}

/// Per-invocation retry state handed to `on_retry` observers
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// 1-based number of the attempt that just failed
    pub attempt: u32,
    pub last_error: AegisError,
    /// Delay before the next attempt
    pub delay: Duration,
}

type RetryObserver = Arc<dyn Fn(&RetryContext) + Send + Sync>;

/// Retry policy bound to a fixed configuration
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    on_retry: Option<RetryObserver>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<closure>"))
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: config.normalized(),
            on_retry: None,
        }
    }

    /// Observe every scheduled retry
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&RetryContext) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether `error` may be retried under this policy
    pub fn is_retryable(&self, error: &AegisError) -> bool {
        let kind = error.kind();
        if kind.is_control() {
            return false;
        }
        if !self.config.non_retryable_errors.is_empty()
            && self.config.non_retryable_errors.contains(&kind)
        {
            return false;
        }
        if !self.config.retryable_errors.is_empty() {
            return self.config.retryable_errors.contains(&kind);
        }
        true
    }

    /// Backoff delay after `attempt` failed, before jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.config.backoff_multiplier.powi(exponent);
        let cap = self.config.max_delay.unwrap_or(Duration::MAX);
        scale(self.config.base_delay, factor).unwrap_or(cap).min(cap)
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        apply_jitter(self.backoff_delay(attempt), &self.config.jitter)
    }

    /// Execute `operation` with retries
    pub async fn execute<F, Fut, T>(&self, operation: F) -> AegisResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AegisResult<T>>,
    {
        self.run(operation, None).await
    }

    /// Execute with retries, aborting pending delays once `token` is cancelled
    pub async fn execute_with_cancel<F, Fut, T>(
        &self,
        operation: F,
        token: &CancelToken,
    ) -> AegisResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AegisResult<T>>,
    {
        self.run(operation, Some(token)).await
    }

    async fn run<F, Fut, T>(&self, mut operation: F, token: Option<&CancelToken>) -> AegisResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AegisResult<T>>,
    {
        let name = self.config.operation_name.as_deref().unwrap_or("operation");
        let mut attempt = 0;

        loop {
            attempt += 1;
            if token.map_or(false, CancelToken::is_cancelled) {
                return Err(AegisError::cancelled(name));
            }

            let outcome = match token {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(AegisError::cancelled(name)),
                    result = operation() => result,
                },
                None => operation().await,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 1 && self.config.enable_logging {
                        debug!(operation = name, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt >= self.config.max_attempts {
                if self.config.enable_logging {
                    warn!(
                        operation = name,
                        max_attempts = self.config.max_attempts,
                        error = %error,
                        "max retry attempts reached"
                    );
                }
                return Err(error);
            }

            if !self.is_retryable(&error) {
                if self.config.enable_logging {
                    debug!(operation = name, kind = %error.kind(), "error is not retryable");
                }
                return Err(error);
            }

            let delay = self.next_delay(attempt);
            if self.config.enable_logging {
                warn!(
                    operation = name,
                    attempt,
                    max_attempts = self.config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying after error"
                );
            }
            if let Some(observer) = &self.on_retry {
                observer(&RetryContext {
                    attempt,
                    last_error: error.clone(),
                    delay,
                });
            }

            match token {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(AegisError::cancelled(name)),
                    _ = sleep(delay) => {}
                },
                None => sleep(delay).await,
            }
        }
    }
}

/// Retry an async operation with the given configuration
pub async fn retry<F, Fut, T>(config: RetryConfig, operation: F) -> AegisResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AegisResult<T>>,
{
    RetryPolicy::new(config).execute(operation).await
}

/// Apply jitter to a base delay using the specified strategy
fn apply_jitter(base_delay: Duration, strategy: &JitterStrategy) -> Duration {
    use rand::Rng;

    match strategy {
        JitterStrategy::None => base_delay,

        JitterStrategy::Proportional { min, max } => {
            if *min < 0.0 || min >= max {
                return base_delay;
            }
            let factor = rand::thread_rng().gen_range(*min..*max);
            scale(base_delay, factor).unwrap_or(base_delay)
        }

        JitterStrategy::Full => {
            let max_delay_ms = base_delay.as_millis() as u64;
            if max_delay_ms == 0 {
                base_delay
            } else {
                Duration::from_millis(rand::thread_rng().gen_range(0..=max_delay_ms))
            }
        }
    }
}

/// Multiply a duration by `factor` at nanosecond precision. `None` on overflow.
fn scale(duration: Duration, factor: f64) -> Option<Duration> {
    let nanos = (duration.as_nanos() as f64 * factor).round();
    if nanos.is_finite() && nanos >= 0.0 && nanos < u64::MAX as f64 {
        Some(Duration::from_nanos(nanos as u64))
    } else {
        None
    }
}

/// Builder for retry policies
#[derive(Default)]
pub struct RetryBuilder {
    config: RetryConfig,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = Some(delay);
        self
    }

    pub fn jitter(mut self, strategy: JitterStrategy) -> Self {
        self.config.jitter = strategy;
        self
    }

    pub fn retryable_errors(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.config.retryable_errors = kinds.into_iter().collect();
        self
    }

    pub fn non_retryable_errors(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.config.non_retryable_errors = kinds.into_iter().collect();
        self
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.config.operation_name = Some(name.into());
        self
    }

    pub fn enable_logging(mut self, enable: bool) -> Self {
        self.config.enable_logging = enable;
        self
    }

    pub fn build(self) -> RetryPolicy {
        RetryPolicy::new(self.config)
    }
}
