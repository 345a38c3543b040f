//! Consecutive-failure circuit breaker with lazy, time-based reset.
//!
//! The breaker has two states. It opens once `failure_threshold` failures have
//! been recorded without an intervening success, and closes again by itself
//! the first time it is queried after `reset_timeout` has passed since the last
//! failure. There is no half-open probe: the next call after the cool-down is
//! a full call.

use crate::errors::{AutomationError, Result};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Source of monotonic time, swappable for deterministic tests.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock. Clones share the same elapsed time.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        let elapsed = self.elapsed.lock().map(|e| *e).unwrap_or(Duration::ZERO);
        self.start + elapsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Result<Self> {
        if failure_threshold == 0 {
            return Err(AutomationError::ConfigurationError(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            failure_threshold,
            reset_timeout,
        })
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// One breaker per protected dependency.
///
/// Counters sit behind a mutex so a breaker can be shared through an `Arc`;
/// each method call is atomic with respect to the counters.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    counters: Mutex<Counters>,
    clock: C,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("failure_count", &self.counters().failure_count)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> Self {
        Self {
            config,
            counters: Mutex::new(Counters::default()),
            clock,
        }
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Circuit breaker lock poisoned, recovering counters");
                poisoned.into_inner()
            }
        }
    }

    /// Whether calls should currently be short-circuited.
    ///
    /// Resets the failure count as a side effect when the breaker was open and
    /// the reset timeout has elapsed. The boundary is inclusive: at exactly
    /// `last_failure + reset_timeout` the breaker already reports closed.
    pub fn is_open(&self) -> bool {
        let mut counters = self.counters();
        if counters.failure_count < self.config.failure_threshold {
            return false;
        }

        let cooled_down = counters
            .last_failure
            .map(|at| self.clock.now().saturating_duration_since(at) >= self.config.reset_timeout)
            .unwrap_or(true);

        if cooled_down {
            info!(
                failures = counters.failure_count,
                "Circuit reset timeout elapsed, returning to CLOSED"
            );
            counters.failure_count = 0;
            return false;
        }
        true
    }

    pub fn record_success(&self) {
        self.counters().failure_count = 0;
    }

    pub fn record_failure(&self) {
        let mut counters = self.counters();
        counters.failure_count = counters.failure_count.saturating_add(1);
        counters.last_failure = Some(self.clock.now());

        if counters.failure_count == self.config.failure_threshold {
            warn!(
                failures = counters.failure_count,
                reset_timeout = ?self.config.reset_timeout,
                "Circuit breaker opened"
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        if self.is_open() {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.counters().failure_count
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.counters().last_failure
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Force the breaker closed and forget the last failure.
    pub fn reset(&self) {
        let mut counters = self.counters();
        counters.failure_count = 0;
        counters.last_failure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset_ms: u64) -> (CircuitBreaker<MockClock>, MockClock) {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::new(threshold, Duration::from_millis(reset_ms)).unwrap();
        (CircuitBreaker::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn starts_closed() {
        let (cb, _) = breaker(3, 5000);
        assert!(!cb.is_open());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.last_failure().is_none());
    }

    #[test]
    fn opens_on_threshold_failure() {
        let (cb, _) = breaker(3, 5000);
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());

        cb.record_failure();
        assert!(cb.is_open());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn success_closes_and_zeroes_count() {
        let (cb, clock) = breaker(3, 5000);
        for _ in 0..3 {
            cb.record_failure();
            clock.advance_millis(1);
        }
        assert!(cb.is_open());

        cb.record_success();
        assert!(!cb.is_open());
        assert_eq!(cb.failure_count(), 0);
        // the timestamp survives a success
        assert!(cb.last_failure().is_some());
    }

    #[test]
    fn stays_open_within_reset_timeout() {
        let (cb, clock) = breaker(1, 5000);
        cb.record_failure();
        clock.advance_millis(4999);
        assert!(cb.is_open());
        assert_eq!(cb.failure_count(), 1);
    }

    #[test]
    fn closes_exactly_at_reset_timeout() {
        let (cb, clock) = breaker(1, 5000);
        cb.record_failure();
        clock.advance_millis(4999);
        assert!(cb.is_open());
        clock.advance_millis(1);
        assert!(!cb.is_open());
    }

    #[test]
    fn query_after_reset_timeout_closes_and_resets_count() {
        let (cb, clock) = breaker(2, 5000);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());

        clock.advance_millis(5000);
        assert!(!cb.is_open());
        assert_eq!(cb.failure_count(), 0);

        // one more failure does not reopen a threshold-2 breaker
        cb.record_failure();
        assert!(!cb.is_open());
    }

    #[test]
    fn failures_keep_counting_while_open() {
        let (cb, _) = breaker(2, 5000);
        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.failure_count(), 5);
        assert!(cb.is_open());
    }

    #[test]
    fn manual_reset_clears_everything() {
        let (cb, _) = breaker(1, 5000);
        cb.record_failure();
        cb.reset();
        assert!(!cb.is_open());
        assert!(cb.last_failure().is_none());
    }

    #[test]
    fn shared_breaker_sees_the_same_counters() {
        let cb = Arc::new(CircuitBreaker::new(
            CircuitBreakerConfig::new(4, Duration::from_secs(60)).unwrap(),
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cb = cb.clone();
                std::thread::spawn(move || cb.record_failure())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cb.failure_count(), 4);
        assert!(cb.is_open());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(CircuitBreakerConfig::new(0, Duration::from_secs(1)).is_err());
    }
}
