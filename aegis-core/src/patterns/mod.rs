//! Resilience patterns for fallible async operations
//!
//! Retry with backoff, circuit breaking, cooperative cancellation and a
//! composer that stacks them around a single operation.

pub mod cancellation;
pub mod circuit_breaker;
pub mod recovery;
pub mod retry;

pub use cancellation::{cancellation, CancelHandle, CancelToken};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitBreakerState,
};
pub use recovery::{
    create_robust_function, with_circuit_breaker, with_fallback, with_retry, Fallback,
    RobustFunction, RobustOptions,
};
pub use retry::{retry, JitterStrategy, RetryBuilder, RetryConfig, RetryContext, RetryPolicy};
