use crate::errors::{AutomationError, Result};
use crate::resilience::{CircuitBreakerConfig, RetryPolicy, WaitConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Run-wide settings, loaded once at start-up and passed to whatever needs them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub waits: WaitSettings,
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub mastodon: MastodonConfig,
    pub artifacts: ArtifactConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub disable_images: bool,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MastodonConfig {
    pub base_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub screenshot_dir: PathBuf,
}

impl Config {
    /// Read a JSON config file. Missing sections fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::ConfigurationError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load from an optional file, apply environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        info!(
            base_url = %config.mastodon.base_url,
            headless = config.browser.headless,
            "Configuration ready"
        );
        Ok(config)
    }

    /// Overrides for values that differ per environment or must stay out of files.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MASTODON_BASE_URL") {
            self.mastodon.base_url = url;
        }
        if let Some(email) = lookup("MASTODON_EMAIL") {
            self.mastodon.email = Some(email);
        }
        if let Some(password) = lookup("MASTODON_PASSWORD") {
            self.mastodon.password = Some(password);
        }
        if let Some(headless) = lookup("HEADLESS") {
            self.browser.headless = !matches!(headless.as_str(), "0" | "false" | "no");
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.mastodon.base_url)?;
        self.wait_config()?;
        self.retry_policy()?;
        self.circuit_breaker_config()?;
        Ok(())
    }

    pub fn wait_config(&self) -> Result<WaitConfig> {
        WaitConfig::new(
            Duration::from_millis(self.waits.timeout_ms),
            Duration::from_millis(self.waits.poll_interval_ms),
        )
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        Ok(RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.interval_ms),
        )?
        .retry_on_transient())
    }

    pub fn circuit_breaker_config(&self) -> Result<CircuitBreakerConfig> {
        CircuitBreakerConfig::new(
            self.circuit_breaker.failure_threshold,
            Duration::from_millis(self.circuit_breaker.reset_timeout_ms),
        )
    }

    /// Absolute URL for a path under the configured instance.
    pub fn url_for(&self, path: &str) -> Result<String> {
        let base = url::Url::parse(&self.mastodon.base_url)?;
        Ok(base.join(path)?.to_string())
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            disable_images: false,
            args: vec![],
            timeout_ms: 30000,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            poll_interval_ms: 500,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval_ms: 1000,
        }
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 5000,
        }
    }
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mastodon.social/".to_string(),
            email: None,
            password: None,
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("test-screenshots"),
        }
    }
}
