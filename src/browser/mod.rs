#[cfg(feature = "chrome")]
pub mod chrome;
pub mod mastodon;
pub mod session;
pub mod waits;

#[cfg(feature = "chrome")]
pub use chrome::ChromeDriver;
pub use session::ResilientSession;
