//! Bootstrap, telemetry and lifecycle for Summer applications.
//!
//! [`bootstrap_with`] turns an [`Application`] into a [`RunningApplication`]:
//! configuration is layered from defaults, a TOML file, `SUMMER_*`
//! environment variables and the command line, telemetry is installed once per process, the container is
//! refreshed from the application's configuration roots and the dispatch
//! server starts serving the routes its controllers declare. Health hooks
//! emit structured events at each stage.
//!
//! The [`todo`] module is the sample application shipped as the `summer`
//! binary.

mod bootstrap;
mod health;
mod shutdown;
mod telemetry;
pub mod todo;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

pub use bootstrap::{
    Application, BootstrapError, ConfigLoader, RunError, RunningApplication, StaticConfigLoader,
    StopError, SystemConfigLoader, bootstrap_with, run,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle};

/// Runs the todo sample until `shutdown` fires and maps the outcome to an
/// exit code. Help and version requests print to `stderr` and succeed.
pub fn launch<W: Write>(
    loader: &dyn ConfigLoader,
    shutdown: &dyn ShutdownSignal,
    stderr: &mut W,
) -> ExitCode {
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
    match run(loader, reporter, todo::TodoApplication::application(), shutdown) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let (text, code) = display_request(&error).map_or_else(
                || (format!("summer: {error}\n"), ExitCode::FAILURE),
                |text| (text, ExitCode::SUCCESS),
            );
            report(stderr, &text, code)
        }
    }
}

fn display_request(error: &RunError) -> Option<String> {
    match error {
        RunError::Bootstrap(BootstrapError::Configuration { source }) => {
            source.display_request().map(ToString::to_string)
        }
        _ => None,
    }
}

fn report<W: Write>(stderr: &mut W, text: &str, code: ExitCode) -> ExitCode {
    match stderr.write_all(text.as_bytes()) {
        Ok(()) => code,
        Err(_) => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests;
