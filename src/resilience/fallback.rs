use crate::errors::Result;
use std::future::Future;
use tracing::warn;

/// Run `operation` once; on any failure return `fallback` instead.
///
/// Meant for best-effort reads (a label, an attribute) where a missing element
/// is an acceptable answer. Callers still assert on the returned value.
pub async fn execute_with_fallback<T, F, Fut>(operation: F, fallback: T) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match operation().await {
        Ok(value) => value,
        Err(error) => {
            warn!(kind = %error.kind(), error = %error, "Operation failed, using fallback value");
            fallback
        }
    }
}
