use crate::core::{DiagnosticSnapshot, DriverTrait};
use crate::errors::Result;
use crate::types::sanitize_label;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Saves failure screenshots as `<dir>/<label>_<YYYYmmdd_HHMMSS>.png`.
pub struct ScreenshotManager<D: DriverTrait> {
    driver: Arc<D>,
    dir: PathBuf,
}

impl<D: DriverTrait> ScreenshotManager<D> {
    pub fn new(driver: Arc<D>, dir: impl Into<PathBuf>) -> Self {
        Self {
            driver,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(label: &str) -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        format!("{}_{}.png", sanitize_label(label), timestamp)
    }

    pub async fn save(&self, label: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = self.driver.take_screenshot().await?;
        let destination = self.dir.join(Self::file_name(label));
        tokio::fs::write(&destination, bytes).await?;
        Ok(destination)
    }
}

#[async_trait]
impl<D: DriverTrait> DiagnosticSnapshot for ScreenshotManager<D> {
    async fn capture(&self, label: &str) -> Option<PathBuf> {
        match self.save(label).await {
            Ok(path) => {
                info!(path = %path.display(), "Screenshot saved");
                Some(path)
            }
            Err(e) => {
                warn!(label, error = %e, "Failed to save screenshot");
                None
            }
        }
    }
}
