//! Composition of recovery strategies
//!
//! A [`RobustFunction`] wraps an operation with up to three policies applied in
//! a fixed order: the circuit breaker wraps the retry policy, which wraps the
//! raw operation. If the fully wrapped call still fails and a [`Fallback`] is
//! configured, the fallback value is returned instead of the error.
//!
//! ```text
//!   call(args)
//!     └─ circuit breaker (optional)
//!          └─ retry policy (optional)
//!               └─ timeout per attempt (optional)
//!                    └─ operation(args)
//!   terminal failure ──▶ fallback (optional) ──▶ value
//! ```
//!
//! Cancellation is never masked by a fallback.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};

use crate::error::{AegisError, AegisResult};
use crate::observability::operation_span;
use crate::patterns::cancellation::CancelToken;
use crate::patterns::circuit_breaker::CircuitBreaker;
use crate::patterns::retry::RetryPolicy;

type Operation<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, AegisResult<T>> + Send + Sync>;

/// Substitute produced when the guarded operation ultimately fails
pub struct Fallback<T> {
    produce: Arc<dyn Fn(&AegisError) -> T + Send + Sync>,
}

impl<T> Clone for Fallback<T> {
    fn clone(&self) -> Self {
        Self {
            produce: Arc::clone(&self.produce),
        }
    }
}

impl<T> Fallback<T> {
    /// Precomputed fallback value, cloned on every use
    pub fn value(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self {
            produce: Arc::new(move |_| value.clone()),
        }
    }

    /// Fallback computed from the terminal error
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&AegisError) -> T + Send + Sync + 'static,
    {
        Self {
            produce: Arc::new(f),
        }
    }

    pub fn resolve(&self, error: &AegisError) -> T {
        (self.produce)(error)
    }
}

/// Policies for [`create_robust_function`]
pub struct RobustOptions<T> {
    pub retry_policy: Option<RetryPolicy>,
    pub circuit_breaker: Option<Arc<CircuitBreaker>>,
    pub fallback: Option<Fallback<T>>,
}

impl<T> Default for RobustOptions<T> {
    fn default() -> Self {
        Self {
            retry_policy: None,
            circuit_breaker: None,
            fallback: None,
        }
    }
}

/// An operation wrapped with resilience policies
pub struct RobustFunction<A, T> {
    name: String,
    operation: Operation<A, T>,
    retry_policy: Option<RetryPolicy>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    fallback: Option<Fallback<T>>,
    timeout: Option<Duration>,
}

impl<A, T> Clone for RobustFunction<A, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            operation: Arc::clone(&self.operation),
            retry_policy: self.retry_policy.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
            fallback: self.fallback.clone(),
            timeout: self.timeout,
        }
    }
}

impl<A, T> RobustFunction<A, T>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
{
    /// Wrap `operation` with no policies
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AegisResult<T>> + Send + 'static,
    {
        Self {
            name: "robust_function".to_string(),
            operation: Arc::new(move |args| Box::pin(operation(args))),
            retry_policy: None,
            circuit_breaker: None,
            fallback: None,
            timeout: None,
        }
    }

    /// Name used in logs and timeout errors
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    pub fn fallback(mut self, fallback: Fallback<T>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Bound each individual attempt
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the wrapped operation with all configured policies
    pub async fn call(&self, args: A) -> AegisResult<T> {
        self.invoke(args, None)
            .instrument(operation_span(&self.name))
            .await
    }

    /// Invoke, aborting retries and in-flight attempts once `token` is cancelled
    pub async fn call_with_cancel(&self, args: A, token: &CancelToken) -> AegisResult<T> {
        self.invoke(args, Some(token))
            .instrument(operation_span(&self.name))
            .await
    }

    async fn invoke(&self, args: A, token: Option<&CancelToken>) -> AegisResult<T> {
        let result = match &self.circuit_breaker {
            Some(breaker) => breaker.execute(|| self.run_retry(args, token)).await,
            None => self.run_retry(args, token).await,
        };

        match (result, &self.fallback) {
            (Ok(value), _) => Ok(value),
            (Err(error), Some(fallback)) if !error.is_cancelled() => {
                debug!(function = %self.name, error = %error, "returning fallback");
                Ok(fallback.resolve(&error))
            }
            (Err(error), _) => Err(error),
        }
    }

    async fn run_retry(&self, args: A, token: Option<&CancelToken>) -> AegisResult<T> {
        match (&self.retry_policy, token) {
            (Some(policy), Some(token)) => {
                policy
                    .execute_with_cancel(move || self.attempt(args.clone()), token)
                    .await
            }
            (Some(policy), None) => policy.execute(move || self.attempt(args.clone())).await,
            (None, Some(token)) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(AegisError::cancelled(self.name.clone())),
                    result = self.attempt(args) => result,
                }
            }
            (None, None) => self.attempt(args).await,
        }
    }

    async fn attempt(&self, args: A) -> AegisResult<T> {
        let fut = (self.operation)(args);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| AegisError::timeout(self.name.clone(), limit))?,
            None => fut.await,
        }
    }
}

/// Wrap `operation` with every policy present in `options`
pub fn create_robust_function<A, T, F, Fut>(
    operation: F,
    options: RobustOptions<T>,
) -> RobustFunction<A, T>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AegisResult<T>> + Send + 'static,
{
    let mut function = RobustFunction::new(operation);
    function.retry_policy = options.retry_policy;
    function.circuit_breaker = options.circuit_breaker;
    function.fallback = options.fallback;
    function
}

/// Apply only a retry policy
pub fn with_retry<A, T, F, Fut>(operation: F, policy: RetryPolicy) -> RobustFunction<A, T>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AegisResult<T>> + Send + 'static,
{
    RobustFunction::new(operation).retry_policy(policy)
}

/// Apply only a circuit breaker
pub fn with_circuit_breaker<A, T, F, Fut>(
    operation: F,
    breaker: Arc<CircuitBreaker>,
) -> RobustFunction<A, T>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AegisResult<T>> + Send + 'static,
{
    RobustFunction::new(operation).circuit_breaker(breaker)
}

/// Apply only a fallback
pub fn with_fallback<A, T, F, Fut>(operation: F, fallback: Fallback<T>) -> RobustFunction<A, T>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AegisResult<T>> + Send + 'static,
{
    RobustFunction::new(operation).fallback(fallback)
}
