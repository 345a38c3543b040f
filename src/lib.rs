//! Resilient page-object automation for Mastodon end-to-end tests.
//!
//! Browser calls go through a [`DriverTrait`] implementation wrapped in a
//! [`ResilientSession`], which applies bounded retries, polling waits,
//! best-effort fallbacks and a circuit breaker from [`resilience`].

pub mod browser;
pub mod core;
pub mod errors;
pub mod pages;
pub mod resilience;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod utils;

pub use browser::ResilientSession;
#[cfg(feature = "chrome")]
pub use browser::ChromeDriver;
pub use crate::core::{Config, DiagnosticSnapshot, DriverTrait};
pub use errors::{AutomationError, FailureKind, Result};
pub use pages::{HomePage, LoginPage};
pub use types::*;
