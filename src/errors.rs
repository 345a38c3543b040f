use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Classification of a failure, independent of which layer produced it.
///
/// Retry and wait policies are expressed as sets of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Target not currently locatable.
    NotFound,
    /// A previously located target was invalidated by a page change.
    Stale,
    /// Target located but cannot receive the action right now.
    NotInteractable,
    /// A wait deadline elapsed.
    Timeout,
    NonRetryable,
    RetriesExhausted,
    Cancelled,
    Configuration,
    /// Any other driver, script or IO failure.
    Driver,
}

impl FailureKind {
    /// Kinds that usually clear up on their own if the caller waits a bit.
    pub const TRANSIENT: [FailureKind; 2] = [FailureKind::NotFound, FailureKind::Stale];
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::NotFound => "not_found",
            FailureKind::Stale => "stale",
            FailureKind::NotInteractable => "not_interactable",
            FailureKind::Timeout => "timeout",
            FailureKind::NonRetryable => "non_retryable",
            FailureKind::RetriesExhausted => "retries_exhausted",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Configuration => "configuration",
            FailureKind::Driver => "driver",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Timed out after {timeout:?} waiting for {condition}")]
    WaitTimeout {
        condition: String,
        timeout: Duration,
        snapshot: Option<PathBuf>,
        last_error: Option<String>,
    },

    #[error("Non-retryable failure during {context}")]
    NonRetryable {
        context: String,
        #[source]
        source: Box<AutomationError>,
    },

    #[error("Operation failed after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<AutomationError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chrome error: {0}")]
    ChromeError(String),
}

pub type Result<T> = std::result::Result<T, AutomationError>;

impl AutomationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AutomationError::ElementNotFound(_) => FailureKind::NotFound,
            AutomationError::StaleElement(_) => FailureKind::Stale,
            AutomationError::NotInteractable(_) => FailureKind::NotInteractable,
            AutomationError::WaitTimeout { .. } => FailureKind::Timeout,
            AutomationError::NonRetryable { .. } => FailureKind::NonRetryable,
            AutomationError::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
            AutomationError::Cancelled => FailureKind::Cancelled,
            AutomationError::ConfigurationError(_) => FailureKind::Configuration,
            AutomationError::LaunchFailed(_)
            | AutomationError::NavigationFailed(_)
            | AutomationError::JavaScriptFailed(_)
            | AutomationError::ScreenshotFailed(_)
            | AutomationError::SerializationError(_)
            | AutomationError::IoError(_)
            | AutomationError::ChromeError(_) => FailureKind::Driver,
        }
    }

    /// The innermost failure behind any retry/wrapping layers.
    pub fn root_cause(&self) -> &AutomationError {
        match self {
            AutomationError::NonRetryable { source, .. }
            | AutomationError::RetriesExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AutomationError::Cancelled)
    }
}

// headless_chrome reports everything through anyhow
impl From<anyhow::Error> for AutomationError {
    fn from(err: anyhow::Error) -> Self {
        AutomationError::ChromeError(err.to_string())
    }
}

impl From<url::ParseError> for AutomationError {
    fn from(err: url::ParseError) -> Self {
        AutomationError::ConfigurationError(format!("invalid url: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(
            AutomationError::ElementNotFound("x".into()).kind(),
            FailureKind::NotFound
        );
        assert_eq!(
            AutomationError::StaleElement("x".into()).kind(),
            FailureKind::Stale
        );
        assert_eq!(
            AutomationError::JavaScriptFailed("x".into()).kind(),
            FailureKind::Driver
        );
        assert_eq!(AutomationError::Cancelled.kind(), FailureKind::Cancelled);
    }

    #[test]
    fn root_cause_unwraps_nested_layers() {
        let err = AutomationError::NonRetryable {
            context: "outer".into(),
            source: Box::new(AutomationError::RetriesExhausted {
                attempts: 3,
                source: Box::new(AutomationError::StaleElement("#post".into())),
            }),
        };

        assert_eq!(err.kind(), FailureKind::NonRetryable);
        assert_eq!(err.root_cause().kind(), FailureKind::Stale);
    }

    #[test]
    fn wrapped_errors_expose_source() {
        use std::error::Error;

        let err = AutomationError::RetriesExhausted {
            attempts: 2,
            source: Box::new(AutomationError::ElementNotFound("#a".into())),
        };
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Element not found: #a"));
    }
}
