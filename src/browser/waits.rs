use super::session::ResilientSession;
use crate::core::DriverTrait;
use crate::errors::{FailureKind, Result};
use crate::resilience::{wait_for, wait_until, WaitConfig};
use crate::types::{ElementInfo, Locator};
use std::time::Duration;

impl<D: DriverTrait> ResilientSession<D> {
    fn waits_for(&self, timeout: Option<Duration>) -> WaitConfig {
        match timeout {
            Some(timeout) => self.wait_config().with_timeout(timeout),
            None => self.wait_config().clone(),
        }
    }

    pub async fn wait_for_element_present(&self, locator: &Locator) -> Result<ElementInfo> {
        self.wait_for_element_present_within(locator, None).await
    }

    pub async fn wait_for_element_present_within(
        &self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<ElementInfo> {
        let driver = self.driver();
        wait_for(
            move || async move { driver.find_element(locator).await.map(Some) },
            &self.waits_for(timeout),
            &format!("wait_present {}", locator),
            self.snapshots(),
            self.cancel_token(),
        )
        .await
    }

    pub async fn wait_for_element_visible(&self, locator: &Locator) -> Result<ElementInfo> {
        self.wait_for_element_visible_within(locator, None).await
    }

    pub async fn wait_for_element_visible_within(
        &self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<ElementInfo> {
        let driver = self.driver();
        wait_for(
            move || async move {
                let info = driver.find_element(locator).await?;
                Ok(driver.is_displayed(locator).await?.then_some(info))
            },
            &self.waits_for(timeout),
            &format!("wait_visible {}", locator),
            self.snapshots(),
            self.cancel_token(),
        )
        .await
    }

    /// Visible and enabled.
    pub async fn wait_for_element_clickable(&self, locator: &Locator) -> Result<ElementInfo> {
        let driver = self.driver();
        wait_for(
            move || async move {
                let info = driver.find_element(locator).await?;
                let ready = driver.is_displayed(locator).await? && driver.is_enabled(locator).await?;
                Ok(ready.then_some(info))
            },
            self.wait_config(),
            &format!("wait_clickable {}", locator),
            self.snapshots(),
            self.cancel_token(),
        )
        .await
    }

    /// Hidden or gone from the page. A detached element counts as gone.
    pub async fn wait_for_element_invisible(&self, locator: &Locator) -> Result<()> {
        self.wait_for_element_invisible_within(locator, None).await
    }

    pub async fn wait_for_element_invisible_within(
        &self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let driver = self.driver();
        wait_until(
            move || async move {
                match driver.is_displayed(locator).await {
                    Ok(displayed) => Ok(!displayed),
                    Err(e) if matches!(e.kind(), FailureKind::NotFound | FailureKind::Stale) => Ok(true),
                    Err(e) => Err(e),
                }
            },
            &self.waits_for(timeout),
            &format!("wait_invisible {}", locator),
            self.snapshots(),
            self.cancel_token(),
        )
        .await
    }

    pub async fn wait_for_text_present(&self, locator: &Locator, text: &str) -> Result<()> {
        let driver = self.driver();
        wait_until(
            move || async move { Ok(driver.text(locator).await?.contains(text)) },
            self.wait_config(),
            &format!("wait_text {}", locator),
            self.snapshots(),
            self.cancel_token(),
        )
        .await
    }

    /// Returns the matching URL.
    pub async fn wait_for_url_contains(&self, fragment: &str) -> Result<String> {
        let driver = self.driver();
        wait_for(
            move || async move {
                let url = driver.current_url().await?;
                Ok(url.contains(fragment).then_some(url))
            },
            self.wait_config(),
            &format!("wait_url {}", fragment),
            self.snapshots(),
            self.cancel_token(),
        )
        .await
    }

    /// `document.readyState` reached `complete`.
    pub async fn wait_for_page_load(&self) -> Result<()> {
        let driver = self.driver();
        wait_until(
            move || async move {
                let state = driver.execute_script(READY_STATE_SCRIPT).await?;
                Ok(state.as_str() == Some("complete"))
            },
            self.wait_config(),
            "wait_page_load",
            self.snapshots(),
            self.cancel_token(),
        )
        .await
    }
}

pub(crate) const READY_STATE_SCRIPT: &str = "document.readyState";
