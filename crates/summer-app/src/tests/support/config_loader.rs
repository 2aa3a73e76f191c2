//! Configuration loaders covering success and failure paths.

use summer_config::{Config, ConfigError, ServerTuning};

use crate::bootstrap::ConfigLoader;

/// Loopback configuration on an ephemeral port with small pools.
pub fn local_config() -> Config {
    Config::default()
        .with_host("127.0.0.1")
        .with_port(0)
        .with_tuning(
            ServerTuning::builder()
                .core_threads(2)
                .max_threads(4)
                .build()
                .expect("valid tuning"),
        )
}

/// Loader that fails by passing an unparsable port on the command line.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load_from_iter(["summer", "--port", "not-a-port"])
    }
}

/// Loader that asks for `--help`.
pub struct HelpConfigLoader;

impl ConfigLoader for HelpConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load_from_iter(["summer", "--help"])
    }
}
