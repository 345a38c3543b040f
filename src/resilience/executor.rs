use super::circuit_breaker::{CircuitBreaker, Clock};
use crate::errors::Result;
use std::future::Future;
use tracing::{debug, warn};

/// Guard an unreliable call with a breaker and a substitute value.
///
/// While the breaker is open the operation is not invoked at all. Outcomes of
/// invoked operations are recorded on the breaker; failures are swallowed and
/// replaced by `fallback`. A cancelled operation also yields `fallback` but is
/// not counted against the dependency.
pub async fn execute_with_circuit_breaker<T, F, Fut, C>(
    operation: F,
    breaker: &CircuitBreaker<C>,
    fallback: T,
) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Clock,
{
    if breaker.is_open() {
        debug!(
            failure_count = breaker.failure_count(),
            "Circuit is open, skipping operation and using fallback"
        );
        return fallback;
    }

    match operation().await {
        Ok(value) => {
            breaker.record_success();
            value
        }
        Err(error) if error.is_cancelled() => {
            debug!("Operation cancelled, breaker left untouched");
            fallback
        }
        Err(error) => {
            breaker.record_failure();
            warn!(
                kind = %error.kind(),
                error = %error,
                failure_count = breaker.failure_count(),
                "Operation failed, recorded failure in circuit breaker"
            );
            fallback
        }
    }
}
