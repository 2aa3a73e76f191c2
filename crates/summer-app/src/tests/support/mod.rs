//! Collaborator doubles for the bootstrap suites.

mod config_loader;
mod reporter;

pub use config_loader::{FailingConfigLoader, HelpConfigLoader, local_config};
pub use reporter::{HealthEvent, RecordingHealthReporter};
