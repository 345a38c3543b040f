pub mod config;
pub mod driver;

pub use config::Config;
pub use driver::{DiagnosticSnapshot, DriverTrait, NoSnapshot};
