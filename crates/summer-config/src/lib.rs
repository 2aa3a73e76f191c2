//! Configuration for Summer applications.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a TOML file
//! (`--config-path`, `SUMMER_CONFIG_PATH` or a discovered `.summer.toml`),
//! then `SUMMER_*` environment variables, then command-line flags. The
//! dispatch server's worker pool, admission and socket settings live in
//! [`ServerTuning`], which is validated when built.

mod config;
mod defaults;
mod errors;
mod logging;
mod tuning;

pub use config::{Config, ConfigLayers};
pub use defaults::{
    DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT, ENV_PREFIX, default_log_filter,
    default_log_format,
};
pub use errors::ConfigError;
pub use logging::{LogFormat, LoggingSettings};
pub use tuning::{RejectionPolicy, ServerTuning, ServerTuningBuilder, TuningError};
