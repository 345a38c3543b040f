use super::{ensure_not_cancelled, pause};
use crate::core::DiagnosticSnapshot;
use crate::errors::{AutomationError, FailureKind, Result};
use crate::types::sanitize_label;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Deadline and cadence of a polling wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    timeout: Duration,
    poll_interval: Duration,
    ignoring: HashSet<FailureKind>,
}

impl WaitConfig {
    /// A zero poll interval is rejected. An interval longer than the timeout is
    /// allowed: the sleep is cut short at the deadline, so the condition is
    /// evaluated once at the start and once more when the timeout is reached.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Result<Self> {
        if poll_interval.is_zero() {
            return Err(AutomationError::ConfigurationError(
                "poll interval must be at least 1ms".to_string(),
            ));
        }
        Ok(Self {
            timeout,
            poll_interval,
            ignoring: FailureKind::TRANSIENT.into_iter().collect(),
        })
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Treat failures of this kind as "not yet" rather than ending the wait.
    pub fn ignoring(mut self, kind: FailureKind) -> Self {
        self.ignoring.insert(kind);
        self
    }

    /// Stop ignoring any failure kind: every error ends the wait.
    pub fn ignoring_nothing(mut self) -> Self {
        self.ignoring.clear();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn ignores(&self, kind: FailureKind) -> bool {
        self.ignoring.contains(&kind)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ignoring: FailureKind::TRANSIENT.into_iter().collect(),
        }
    }
}

/// Poll `condition` until it yields `Some(value)` or the timeout elapses.
///
/// Errors of an ignored kind count as "not yet"; any other error ends the wait
/// immediately. On timeout a snapshot labelled after `description` is taken
/// before the error is returned.
#[instrument(skip(condition, config, snapshot, cancel), fields(timeout = ?config.timeout))]
pub async fn wait_for<T, F, Fut>(
    mut condition: F,
    config: &WaitConfig,
    description: &str,
    snapshot: &dyn DiagnosticSnapshot,
    cancel: &CancellationToken,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    let mut polls: u32 = 0;
    let mut last_error: Option<String> = None;

    loop {
        ensure_not_cancelled(cancel)?;
        polls += 1;

        match condition().await {
            Ok(Some(value)) => {
                debug!(polls, elapsed = ?start.elapsed(), "Condition satisfied");
                return Ok(value);
            }
            Ok(None) => {}
            Err(error) if config.ignores(error.kind()) => {
                debug!(polls, kind = %error.kind(), "Ignoring transient failure while polling");
                last_error = Some(error.to_string());
            }
            Err(error) => return Err(error),
        }

        if start.elapsed() >= config.timeout {
            warn!(polls, condition = description, "Wait timed out");
            let snapshot = snapshot.capture(&sanitize_label(description)).await;
            return Err(AutomationError::WaitTimeout {
                condition: description.to_string(),
                timeout: config.timeout,
                snapshot,
                last_error,
            });
        }

        let remaining = config.timeout.saturating_sub(start.elapsed());
        pause(config.poll_interval.min(remaining), cancel).await?;
    }
}

/// Boolean form of [`wait_for`].
pub async fn wait_until<F, Fut>(
    mut condition: F,
    config: &WaitConfig,
    description: &str,
    snapshot: &dyn DiagnosticSnapshot,
    cancel: &CancellationToken,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    wait_for(
        || {
            let check = condition();
            async move { Ok(check.await?.then_some(())) }
        },
        config,
        description,
        snapshot,
        cancel,
    )
    .await
}
