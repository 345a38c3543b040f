//! Retry, polling, fallback and circuit-breaker primitives.
//!
//! Two families live here. [`execute_with_retry`] and [`wait_for`] surface the
//! failure once their budget is spent. [`execute_with_fallback`] and
//! [`execute_with_circuit_breaker`] swallow it and hand back a substitute value.
//!
//! All loops run one attempt at a time and observe a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) both before each
//! attempt and while sleeping.

pub mod circuit_breaker;
pub mod executor;
pub mod fallback;
pub mod retry;
pub mod wait;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, Clock, MockClock, SystemClock,
};
pub use executor::execute_with_circuit_breaker;
pub use fallback::execute_with_fallback;
pub use retry::{execute_with_retry, RetryPolicy};
pub use wait::{wait_for, wait_until, WaitConfig};

use crate::errors::{AutomationError, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless the token fires first.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AutomationError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(AutomationError::Cancelled)
    } else {
        Ok(())
    }
}
