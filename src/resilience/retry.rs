use super::{ensure_not_cancelled, pause};
use crate::errors::{AutomationError, FailureKind, Result};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded, fixed-interval retry settings.
///
/// An empty retryable set retries nothing: the first failure is reported as
/// [`AutomationError::NonRetryable`]. Use [`RetryPolicy::retry_on_any`] to opt
/// into retrying every kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
    retryable: HashSet<FailureKind>,
    any: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(AutomationError::ConfigurationError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            interval,
            retryable: HashSet::new(),
            any: false,
        })
    }

    pub fn retry_on(mut self, kind: FailureKind) -> Self {
        self.retryable.insert(kind);
        self
    }

    pub fn retry_on_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = FailureKind>,
    {
        self.retryable.extend(kinds);
        self
    }

    /// Retry on "not found" and "stale", the kinds that clear up by themselves.
    pub fn retry_on_transient(self) -> Self {
        self.retry_on_kinds(FailureKind::TRANSIENT)
    }

    pub fn retry_on_any(mut self) -> Self {
        self.any = true;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_retryable(&self, kind: FailureKind) -> bool {
        // Cancellation always ends the loop, whatever the policy says.
        kind != FailureKind::Cancelled && (self.any || self.retryable.contains(&kind))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
            retryable: FailureKind::TRANSIENT.into_iter().collect(),
            any: false,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable kind, or the
/// policy's attempts are used up.
#[instrument(skip(operation, cancel), fields(max_attempts = policy.max_attempts))]
pub async fn execute_with_retry<T, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        ensure_not_cancelled(cancel)?;
        attempt += 1;

        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let kind = error.kind();
        if kind == FailureKind::Cancelled {
            return Err(error);
        }
        if !policy.is_retryable(kind) {
            warn!(attempt, %kind, error = %error, "Non-retryable failure");
            return Err(AutomationError::NonRetryable {
                context: format!("attempt {} of {}", attempt, policy.max_attempts),
                source: Box::new(error),
            });
        }

        warn!(
            attempt,
            max_attempts = policy.max_attempts,
            %kind,
            error = %error,
            "Retryable failure"
        );

        if attempt >= policy.max_attempts {
            return Err(AutomationError::RetriesExhausted {
                attempts: attempt,
                source: Box::new(error),
            });
        }

        pause(policy.interval, cancel).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn not_found() -> AutomationError {
        AutomationError::ElementNotFound("#compose".into())
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_operation_runs_max_attempts_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(4, Duration::from_millis(250))
            .unwrap()
            .retry_on(FailureKind::NotFound);

        let counter = calls.clone();
        let result: Result<()> = execute_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(AutomationError::ElementNotFound(format!("attempt {}", n)))
                }
            },
            &policy,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(AutomationError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert_eq!(source.to_string(), "Element not found: attempt 4");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(5, Duration::from_millis(10))
            .unwrap()
            .retry_on_transient();

        let counter = calls.clone();
        let value = execute_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 1 {
                        Err(AutomationError::StaleElement("#post".into()))
                    } else {
                        Ok("posted")
                    }
                }
            },
            &policy,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(value, "posted");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_kind_fails_after_one_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(10, Duration::from_secs(1))
            .unwrap()
            .retry_on(FailureKind::NotFound);

        let counter = calls.clone();
        let result: Result<()> = execute_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(AutomationError::JavaScriptFailed("boom".into()))
                }
            },
            &policy,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NonRetryable);
        assert_eq!(err.root_cause().kind(), FailureKind::Driver);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_retry_set_retries_nothing() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(1)).unwrap();

        let counter = calls.clone();
        let result: Result<()> = execute_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(not_found())
                }
            },
            &policy,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind(), FailureKind::NonRetryable);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_on_any_covers_every_kind() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(2, Duration::from_millis(1))
            .unwrap()
            .retry_on_any();

        let counter = calls.clone();
        let result: Result<()> = execute_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(AutomationError::ChromeError("websocket closed".into()))
                }
            },
            &policy,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.unwrap_err().kind(), FailureKind::RetriesExhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_interval_between_attempts_only() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_secs(1))
            .unwrap()
            .retry_on(FailureKind::NotFound);
        let start = Instant::now();

        let counter = calls.clone();
        let value = execute_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(not_found())
                    } else {
                        Ok(42)
                    }
                }
            },
            &policy,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_sleep_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(5, Duration::from_secs(10))
            .unwrap()
            .retry_on(FailureKind::NotFound);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let counter = calls.clone();
        let result: Result<()> = execute_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(not_found())
                }
            },
            &policy,
            &cancel,
        )
        .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    async fn run_until_success_at(max_attempts: u32, succeed_on: Option<u32>) -> (Result<u32>, u32) {
        let policy = RetryPolicy::new(max_attempts, Duration::from_millis(100))
            .unwrap()
            .retry_on_transient();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = execute_with_retry(
            move || async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                match succeed_on {
                    Some(k) if attempt >= k => Ok(attempt),
                    _ => Err(not_found()),
                }
            },
            &policy,
            &CancellationToken::new(),
        )
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_attempt_k_makes_exactly_k_calls() {
        for max_attempts in 1..=6 {
            for k in 1..=max_attempts {
                let start = Instant::now();
                let (result, calls) = run_until_success_at(max_attempts, Some(k)).await;

                assert_eq!(result.unwrap(), k, "N={} k={}", max_attempts, k);
                assert_eq!(calls, k, "N={} k={}", max_attempts, k);
                assert!(start.elapsed() >= Duration::from_millis(100) * (k - 1));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_makes_exactly_n_calls() {
        for max_attempts in 1..=6 {
            let (result, calls) = run_until_success_at(max_attempts, None).await;

            assert_eq!(calls, max_attempts);
            match result {
                Err(AutomationError::RetriesExhausted { attempts, source }) => {
                    assert_eq!(attempts, max_attempts);
                    assert_eq!(source.kind(), FailureKind::NotFound);
                }
                other => panic!("N={}: unexpected result {:?}", max_attempts, other),
            }
        }
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(RetryPolicy::new(0, Duration::ZERO).is_err());
    }

    #[test]
    fn default_policy_matches_documented_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.interval(), Duration::from_secs(1));
        assert!(policy.is_retryable(FailureKind::NotFound));
        assert!(policy.is_retryable(FailureKind::Stale));
        assert!(!policy.is_retryable(FailureKind::Driver));
    }
}
