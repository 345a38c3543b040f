use mastodon_e2e::core::NoSnapshot;
use mastodon_e2e::resilience::{
    execute_with_circuit_breaker, execute_with_fallback, execute_with_retry, wait_until,
    CircuitBreaker, CircuitBreakerConfig, CircuitState, MockClock, RetryPolicy, WaitConfig,
};
use mastodon_e2e::{AutomationError, FailureKind, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn flaky_timeline() -> AutomationError {
    AutomationError::ElementNotFound("//div[contains(@class, 'item-list')]".into())
}

#[tokio::test]
async fn breaker_opens_short_circuits_and_recovers() {
    let clock = MockClock::new();
    let breaker = CircuitBreaker::with_clock(
        CircuitBreakerConfig::new(3, Duration::from_millis(5000)).unwrap(),
        clock.clone(),
    );
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
        let value = execute_with_circuit_breaker(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(flaky_timeline())
            },
            &breaker,
            "cached timeline".to_string(),
        )
        .await;
        assert_eq!(value, "cached timeline");
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let value = execute_with_circuit_breaker(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("live timeline".to_string())
        },
        &breaker,
        "cached timeline".to_string(),
    )
    .await;
    assert_eq!(value, "cached timeline");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    clock.advance_millis(5000);
    let value = execute_with_circuit_breaker(
        || async { Ok("live timeline".to_string()) },
        &breaker,
        "cached timeline".to_string(),
    )
    .await;
    assert_eq!(value, "live timeline");
    assert_eq!(breaker.failure_count(), 0);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn retry_spaces_three_attempts_one_second_apart() {
    let policy = RetryPolicy::new(3, Duration::from_secs(1))
        .unwrap()
        .retry_on(FailureKind::NotFound);
    let calls = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let counter = calls.clone();
    let result: Result<()> = execute_with_retry(
        || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(flaky_timeline())
            }
        },
        &policy,
        &CancellationToken::new(),
    )
    .await;

    let err = assert_err!(result);
    assert_eq!(err.kind(), FailureKind::RetriesExhausted);
    assert_eq!(err.root_cause().kind(), FailureKind::NotFound);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn retry_gives_up_immediately_on_unlisted_kind() {
    let policy = RetryPolicy::new(3, Duration::from_secs(1))
        .unwrap()
        .retry_on(FailureKind::NotFound);
    let start = Instant::now();

    let result: Result<()> = execute_with_retry(
        || async { Err(AutomationError::NotInteractable("publish button".into())) },
        &policy,
        &CancellationToken::new(),
    )
    .await;

    let err = assert_err!(result);
    assert_eq!(err.kind(), FailureKind::NonRetryable);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn fallback_covers_every_failure_kind() {
    let failures = vec![
        flaky_timeline(),
        AutomationError::StaleElement("display name".into()),
        AutomationError::JavaScriptFailed("syntax error".into()),
        AutomationError::Cancelled,
    ];
    for failure in failures {
        let name =
            execute_with_fallback(move || async move { Err(failure) }, "Unknown".to_string()).await;
        assert_eq!(name, "Unknown");
    }
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_long_wait() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(750)).await;
        trigger.cancel();
    });
    let start = Instant::now();

    let result = wait_until(
        || async { Ok(false) },
        &WaitConfig::new(Duration::from_secs(60), Duration::from_millis(500)).unwrap(),
        "timeline to load",
        &NoSnapshot,
        &cancel,
    )
    .await;

    assert!(assert_err!(result).is_cancelled());
    assert!(start.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn wait_succeeds_once_condition_flips() {
    let polls = AtomicU32::new(0);
    let counter = &polls;

    let result = wait_until(
        move || async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 4) },
        &WaitConfig::default(),
        "post published",
        &NoSnapshot,
        &CancellationToken::new(),
    )
    .await;

    assert_ok!(result);
    assert_eq!(polls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn breaker_scenario_failures_then_success() {
    let clock = MockClock::new();
    let breaker = CircuitBreaker::with_clock(
        CircuitBreakerConfig::new(3, Duration::from_millis(5000)).unwrap(),
        clock.clone(),
    );

    for _ in 0..3 {
        breaker.record_failure();
        clock.advance_millis(1);
    }
    assert!(breaker.is_open());

    breaker.record_success();
    assert!(!breaker.is_open());
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn retry_scenario_succeeds_on_third_attempt() {
    let policy = RetryPolicy::new(3, Duration::from_secs(1))
        .unwrap()
        .retry_on(FailureKind::NotFound);
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let start = Instant::now();

    let value = execute_with_retry(
        move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(flaky_timeline())
            } else {
                Ok("timeline")
            }
        },
        &policy,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(assert_ok!(value), "timeline");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(start.elapsed() >= Duration::from_secs(2));
}
