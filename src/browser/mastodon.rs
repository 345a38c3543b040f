//! Waits for Mastodon web UI states.
//!
//! These answer "did the page get there in time?" with a `bool`: a timeout or
//! any driver failure is `Ok(false)`. Cancellation is the one error that still
//! propagates, so an aborted run does not look like a slow page.

use super::session::ResilientSession;
use crate::core::DriverTrait;
use crate::errors::{FailureKind, Result};
use crate::resilience::wait_until;
use crate::types::Locator;
use std::time::Duration;
use tracing::debug;

pub const TIMELINE: &str = "//div[contains(@class, 'item-list')]";
pub const SUCCESS_NOTICE: &str = "//div[contains(@class, 'notification-success')]";
pub const STATUS: &str = "//div[contains(@class, 'status')]";
pub const ERROR_NOTICE: &str = "//div[contains(@class, 'error')]";
pub const NOTIFICATION: &str = "//div[contains(@class, 'notification')]";
pub const SEARCH_RESULTS: &str = "//div[contains(@class, 'search-results')]";
pub const MODAL: &str = "//div[contains(@class, 'modal')]";
pub const CONVERSATIONS: &str = "//div[contains(@class, 'conversations-list')]";
pub const MEDIA_GALLERY: &str = "//div[contains(@class, 'media-gallery')]";

fn reached(outcome: Result<()>, what: &str) -> Result<bool> {
    match outcome {
        Ok(()) => Ok(true),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            debug!(what, error = %e, "Page did not reach expected state");
            Ok(false)
        }
    }
}

impl<D: DriverTrait> ResilientSession<D> {
    async fn became_visible(&self, xpath: &str, timeout: Duration) -> Result<bool> {
        let locator = Locator::xpath(xpath);
        let outcome = self
            .wait_for_element_visible_within(&locator, Some(timeout))
            .await
            .map(|_| ());
        reached(outcome, xpath)
    }

    pub async fn wait_for_timeline_load(&self, timeout: Duration) -> Result<bool> {
        self.became_visible(TIMELINE, timeout).await
    }

    /// A success notice is shown or at least one status is on the page.
    pub async fn wait_for_post_published(&self, timeout: Duration) -> Result<bool> {
        let driver = self.driver();
        let notice = Locator::xpath(SUCCESS_NOTICE);
        let status = Locator::xpath(STATUS);
        let notice = &notice;
        let status = &status;
        let outcome = wait_until(
            move || async move {
                match driver.is_displayed(notice).await {
                    Ok(true) => return Ok(true),
                    Ok(false) => {}
                    Err(e) if e.kind() == FailureKind::NotFound => {}
                    Err(e) => return Err(e),
                }
                Ok(!driver.find_elements(status).await?.is_empty())
            },
            &self.wait_config().with_timeout(timeout),
            "post_published",
            self.snapshots(),
            self.cancel_token(),
        )
        .await;
        reached(outcome, "post published")
    }

    /// Waits for either the home timeline URL or an error notice, then reports
    /// whether login actually landed on `/home`.
    pub async fn wait_for_login_complete(&self, timeout: Duration) -> Result<bool> {
        let driver = self.driver();
        let error = Locator::xpath(ERROR_NOTICE);
        let error = &error;
        let outcome = wait_until(
            move || async move {
                if driver.current_url().await?.contains("/home") {
                    return Ok(true);
                }
                Ok(!driver.find_elements(error).await?.is_empty())
            },
            &self.wait_config().with_timeout(timeout),
            "login_complete",
            self.snapshots(),
            self.cancel_token(),
        )
        .await;
        if !reached(outcome, "login complete")? {
            return Ok(false);
        }
        Ok(driver
            .current_url()
            .await
            .map(|url| url.contains("/home"))
            .unwrap_or(false))
    }

    pub async fn wait_for_notification(&self, timeout: Duration) -> Result<bool> {
        self.became_visible(NOTIFICATION, timeout).await
    }

    pub async fn wait_for_search_results(&self, timeout: Duration) -> Result<bool> {
        self.became_visible(SEARCH_RESULTS, timeout).await
    }

    pub async fn wait_for_modal_dialog(&self, timeout: Duration) -> Result<bool> {
        self.became_visible(MODAL, timeout).await
    }

    pub async fn wait_for_modal_dialog_to_disappear(&self, timeout: Duration) -> Result<bool> {
        let outcome = self
            .wait_for_element_invisible_within(&Locator::xpath(MODAL), Some(timeout))
            .await;
        reached(outcome, MODAL)
    }

    pub async fn wait_for_messages_page_load(&self, timeout: Duration) -> Result<bool> {
        self.became_visible(CONVERSATIONS, timeout).await
    }

    pub async fn wait_for_image_upload_complete(&self, timeout: Duration) -> Result<bool> {
        self.became_visible(MEDIA_GALLERY, timeout).await
    }
}
