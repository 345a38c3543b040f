use crate::errors::Result;
use crate::types::{ElementInfo, Locator};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Everything the resilience layer needs from a browser.
///
/// Implementations classify their failures through
/// [`AutomationError`](crate::errors::AutomationError) variants so retry and
/// wait policies can decide on the [`FailureKind`](crate::errors::FailureKind).
#[async_trait]
pub trait DriverTrait: Send + Sync {
    /// Navigate to a URL and wait for the navigation to settle
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Locate a single element
    async fn find_element(&self, locator: &Locator) -> Result<ElementInfo>;

    /// Locate all matching elements; an empty result is not an error
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementInfo>>;

    /// Native click
    async fn click(&self, locator: &Locator) -> Result<()>;

    /// Click dispatched from page script, used when the native click is refused
    async fn click_via_script(&self, locator: &Locator) -> Result<()>;

    async fn clear(&self, locator: &Locator) -> Result<()>;

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()>;

    async fn text(&self, locator: &Locator) -> Result<String>;

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>>;

    async fn is_displayed(&self, locator: &Locator) -> Result<bool>;

    async fn is_enabled(&self, locator: &Locator) -> Result<bool>;

    /// Execute JavaScript in the page
    async fn execute_script(&self, script: &str) -> Result<Value>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// PNG bytes of the current viewport
    async fn take_screenshot(&self) -> Result<Vec<u8>>;
}

/// Best-effort capture of page state for post-mortem debugging.
///
/// Never fails: a capture that cannot be taken yields `None`.
#[async_trait]
pub trait DiagnosticSnapshot: Send + Sync {
    async fn capture(&self, label: &str) -> Option<PathBuf>;
}

/// Snapshot sink that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSnapshot;

#[async_trait]
impl DiagnosticSnapshot for NoSnapshot {
    async fn capture(&self, _label: &str) -> Option<PathBuf> {
        None
    }
}
