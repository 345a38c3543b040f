use crate::core::{Config, DiagnosticSnapshot, DriverTrait};
use crate::errors::{AutomationError, FailureKind, Result};
use crate::resilience::{
    execute_with_circuit_breaker, execute_with_fallback, execute_with_retry, CircuitBreaker,
    RetryPolicy, WaitConfig,
};
use crate::types::{ElementInfo, Locator};
use crate::utils::ScreenshotManager;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A driver wrapped with the run's retry, wait and breaker settings.
///
/// Page objects talk to the browser only through this type, so every
/// interaction gets the same failure handling and diagnostic snapshots.
pub struct ResilientSession<D: DriverTrait> {
    driver: Arc<D>,
    config: Config,
    retry_policy: RetryPolicy,
    wait_config: WaitConfig,
    breaker: CircuitBreaker,
    snapshots: Arc<dyn DiagnosticSnapshot>,
    cancel: CancellationToken,
    session_id: String,
}

impl<D: DriverTrait + 'static> ResilientSession<D> {
    /// Session whose failure snapshots are screenshots under the configured directory.
    pub fn new(driver: Arc<D>, config: Config) -> Result<Self> {
        let screenshots = Arc::new(ScreenshotManager::new(
            driver.clone(),
            config.artifacts.screenshot_dir.clone(),
        ));
        Self::with_snapshots(driver, config, screenshots)
    }
}

impl<D: DriverTrait> ResilientSession<D> {
    pub fn with_snapshots(
        driver: Arc<D>,
        config: Config,
        snapshots: Arc<dyn DiagnosticSnapshot>,
    ) -> Result<Self> {
        let retry_policy = config.retry_policy()?;
        let wait_config = config.wait_config()?;
        let breaker = CircuitBreaker::new(config.circuit_breaker_config()?);
        let session_id = uuid::Uuid::new_v4().to_string();

        info!(session_id = %session_id, "Resilient session created");
        Ok(Self {
            driver,
            config,
            retry_policy,
            wait_config,
            breaker,
            snapshots,
            cancel: CancellationToken::new(),
            session_id,
        })
    }

    /// Share an externally owned token, e.g. one cancelled on Ctrl-C.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn wait_config(&self) -> &WaitConfig {
        &self.wait_config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn snapshots(&self) -> &dyn DiagnosticSnapshot {
        self.snapshots.as_ref()
    }

    /// Navigate to a path relative to the configured instance.
    pub async fn open(&self, path: &str) -> Result<()> {
        let url = self.config.url_for(path)?;
        debug!(%url, "Opening page");
        self.driver.navigate(&url).await
    }

    pub async fn find_element_with_retry(&self, locator: &Locator) -> Result<ElementInfo> {
        self.find_element_with_retry_with(locator, &self.retry_policy)
            .await
    }

    pub async fn find_element_with_retry_with(
        &self,
        locator: &Locator,
        policy: &RetryPolicy,
    ) -> Result<ElementInfo> {
        let driver = self.driver.as_ref();
        let result = execute_with_retry(move || driver.find_element(locator), policy, &self.cancel).await;
        self.snapshot_on_failure(result, &format!("element_not_found_{}", locator.label()))
            .await
    }

    pub async fn click_with_retry(&self, locator: &Locator) -> Result<()> {
        self.click_with_retry_with(locator, &self.retry_policy).await
    }

    /// Click, falling back to a script click when the element refuses a native one.
    ///
    /// A failed script click consumes the attempt like any other retryable failure.
    pub async fn click_with_retry_with(&self, locator: &Locator, policy: &RetryPolicy) -> Result<()> {
        let driver = self.driver.as_ref();
        let policy = policy.clone().retry_on(FailureKind::NotInteractable);
        let result = execute_with_retry(
            move || async move {
                match driver.click(locator).await {
                    Err(e) if e.kind() == FailureKind::NotInteractable => {
                        debug!(%locator, "Native click refused, clicking via script");
                        driver
                            .click_via_script(locator)
                            .await
                            .map_err(|script_err| match script_err.kind() {
                                FailureKind::NotFound | FailureKind::Stale | FailureKind::Cancelled => {
                                    script_err
                                }
                                _ => AutomationError::NotInteractable(format!(
                                    "{}: script click failed: {}",
                                    locator, script_err
                                )),
                            })
                    }
                    other => other,
                }
            },
            &policy,
            &self.cancel,
        )
        .await;
        self.snapshot_on_failure(result, &format!("click_failed_{}", locator.label()))
            .await
    }

    /// Clear the field and type `text`, retrying the pair as one unit.
    pub async fn type_with_retry(&self, locator: &Locator, text: &str) -> Result<()> {
        let driver = self.driver.as_ref();
        let policy = self
            .retry_policy
            .clone()
            .retry_on_kinds([FailureKind::Stale, FailureKind::NotInteractable]);
        let result = execute_with_retry(
            move || async move {
                driver.clear(locator).await?;
                driver.type_text(locator, text).await
            },
            &policy,
            &self.cancel,
        )
        .await;
        self.snapshot_on_failure(result, &format!("type_failed_{}", locator.label()))
            .await
    }

    pub async fn text_with_fallback(&self, locator: &Locator, fallback: &str) -> String {
        let driver = self.driver.as_ref();
        execute_with_fallback(|| driver.text(locator), fallback.to_string()).await
    }

    /// Attribute value, or `fallback` when the element or the attribute is missing.
    pub async fn attribute_with_fallback(&self, locator: &Locator, name: &str, fallback: &str) -> String {
        let driver = self.driver.as_ref();
        execute_with_fallback(|| driver.attribute(locator, name), None)
            .await
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Run `operation` behind the session's circuit breaker.
    pub async fn guarded<T, F, Fut>(&self, operation: F, fallback: T) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        execute_with_circuit_breaker(operation, &self.breaker, fallback).await
    }

    /// Report a failure with whatever page context is still readable.
    pub async fn log_failure(&self, context: &str, failure: &AutomationError) {
        let url = self.driver.current_url().await.ok();
        let title = self.driver.title().await.ok();
        error!(
            session_id = %self.session_id,
            context,
            kind = %failure.kind(),
            root_cause = %failure.root_cause(),
            url = url.as_deref().unwrap_or("<unavailable>"),
            title = title.as_deref().unwrap_or("<unavailable>"),
            "{}",
            failure
        );
    }

    async fn snapshot_on_failure<T>(&self, result: Result<T>, label: &str) -> Result<T> {
        if let Err(e) = &result {
            if !e.is_cancelled() {
                self.snapshots.capture(label).await;
            }
        }
        result
    }
}
