//! Entry point of the todo sample server.

use std::io;
use std::process::ExitCode;

use summer_app::{SystemConfigLoader, SystemShutdownSignal};

fn main() -> ExitCode {
    let mut stderr = io::stderr().lock();
    summer_app::launch(&SystemConfigLoader, &SystemShutdownSignal, &mut stderr)
}
