//! End-to-end behaviour of retry, circuit breaking and composition

use aegis_core::error::{AegisError, AegisResult, ErrorKind};
use aegis_core::patterns::{
    cancellation, CircuitBreakerBuilder, CircuitBreakerState, Fallback, RetryConfig, RetryPolicy,
    RobustFunction,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn breaker(threshold: f64, minimum_throughput: u32, reset: Duration) -> Arc<aegis_core::CircuitBreaker> {
    Arc::new(
        CircuitBreakerBuilder::new("integration")
            .failure_threshold(threshold)
            .minimum_throughput(minimum_throughput)
            .reset_timeout(reset)
            .enable_logging(false)
            .build(),
    )
}

#[tokio::test]
async fn test_breaker_opens_when_rate_first_reaches_threshold() {
    let breaker = breaker(1.0, 3, Duration::from_secs(30));
    let invoked = AtomicU32::new(0);

    for n in 1..=3 {
        let result = breaker
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AegisError::network("down"))
            })
            .await;
        assert!(matches!(result, Err(AegisError::Network(_))));
        let expected = if n < 3 {
            CircuitBreakerState::Closed
        } else {
            CircuitBreakerState::Open
        };
        assert_eq!(breaker.state(), expected);
    }

    let rejected = breaker
        .execute(|| async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AegisError>(())
        })
        .await;
    assert!(rejected.unwrap_err().is_circuit_open());
    assert_eq!(invoked.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.metrics().rejected_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_probe_timing_and_recovery() {
    let reset = Duration::from_secs(10);
    let breaker = breaker(0.5, 1, reset);

    let _ = breaker
        .execute(|| async { Err::<(), _>(AegisError::network("down")) })
        .await;
    assert_eq!(breaker.state(), CircuitBreakerState::Open);

    tokio::time::advance(reset - Duration::from_millis(1)).await;
    let early = breaker.execute(|| async { Ok::<_, AegisError>(1) }).await;
    assert!(early.unwrap_err().is_circuit_open());

    tokio::time::advance(Duration::from_millis(1)).await;
    let probe = breaker.execute(|| async { Ok::<_, AegisError>(2) }).await;
    assert_eq!(probe.unwrap(), 2);

    let metrics = breaker.metrics();
    assert_eq!(metrics.state, CircuitBreakerState::Closed);
    assert_eq!(
        (metrics.success_count, metrics.failure_count, metrics.request_count),
        (0, 0, 0)
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_schedule_with_fractional_multiplier() {
    let delays = Arc::new(Mutex::new(Vec::new()));
    let observed = delays.clone();
    let policy = RetryPolicy::new(
        RetryConfig::exponential(3, Duration::from_millis(10), 1.5).with_logging(false),
    )
    .on_retry(move |ctx| observed.lock().push(ctx.delay));

    let calls = AtomicU32::new(0);
    let started = tokio::time::Instant::now();
    let value = policy
        .execute(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(AegisError::network(format!("attempt {}", n)))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *delays.lock(),
        vec![Duration::from_millis(10), Duration::from_millis(15)]
    );
    assert_eq!(started.elapsed(), Duration::from_millis(25));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retry_surfaces_last_error_unwrapped() {
    let policy = RetryPolicy::new(RetryConfig::fixed(2, Duration::from_millis(1)).with_logging(false));
    let calls = AtomicU32::new(0);

    let result: AegisResult<()> = policy
        .execute(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(AegisError::state(format!("stale {}", n)))
        })
        .await;

    match result {
        Err(AegisError::State(message)) => assert_eq!(message, "stale 2"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_allow_list_limits_retries() {
    let policy = RetryPolicy::new(
        RetryConfig::fixed(5, Duration::from_millis(1))
            .with_logging(false)
            .retryable([ErrorKind::Network]),
    );
    let calls = AtomicU32::new(0);

    let _ = policy
        .execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(AegisError::validation("email", "malformed"))
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_composed_function_falls_back_and_sheds_load() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let breaker = breaker(0.5, 2, Duration::from_secs(60));

    let lookup = RobustFunction::new(move |user: String| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Err::<String, _>(AegisError::network(format!("{} unreachable", user))) }
    })
    .named("profile_lookup")
    .retry_policy(RetryPolicy::new(
        RetryConfig::fixed(2, Duration::from_millis(5)).with_logging(false),
    ))
    .circuit_breaker(breaker.clone())
    .fallback(Fallback::function(|err: &AegisError| format!("cached ({})", err)));

    assert_eq!(
        lookup.call("ann".to_string()).await.unwrap(),
        "cached (Network error: ann unreachable)"
    );
    assert!(lookup.call("bob".to_string()).await.unwrap().starts_with("cached"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(breaker.state(), CircuitBreakerState::Open);

    // breaker now rejects without touching the operation
    let shed = lookup.call("cy".to_string()).await.unwrap();
    assert_eq!(shed, "cached (Circuit breaker 'integration' is open)");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_call_leaves_breaker_metrics_untouched() {
    let breaker = breaker(0.5, 1, Duration::from_secs(60));
    let function = RobustFunction::new(|_: ()| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<_, AegisError>(())
    })
    .circuit_breaker(breaker.clone());

    let (handle, token) = cancellation();
    let task = tokio::spawn(async move { function.call_with_cancel((), &token).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.cancel();

    assert!(task.await.unwrap().unwrap_err().is_cancelled());
    let metrics = breaker.metrics();
    assert_eq!(metrics.request_count, 0);
    assert_eq!(metrics.state, CircuitBreakerState::Closed);
}
