//! Layered configuration resolved through `ortho_config`.

use std::env;
use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_HOST, DEFAULT_PORT};
use crate::{ConfigError, LogFormat, LoggingSettings, RejectionPolicy, ServerTuning};

/// Raw values gathered from the file, environment and command-line layers.
///
/// Every field is optional; anything no layer sets keeps its built-in
/// default when [`Config::from_layers`] resolves the final configuration.
/// Flags are the kebab-case field names (`--port`, `--core-threads`) and
/// environment variables the upper-case names behind `SUMMER_`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SUMMER")]
pub struct ConfigLayers {
    /// Bind address.
    pub host: Option<String>,
    /// TCP port; 0 asks the OS for an ephemeral port.
    pub port: Option<u16>,
    /// `EnvFilter` expression for the tracing subscriber.
    pub log_filter: Option<String>,
    /// Log output format: `json` or `compact`.
    pub log_format: Option<LogFormat>,
    /// Worker pool core threads.
    pub core_threads: Option<usize>,
    /// Worker pool max threads.
    pub max_threads: Option<usize>,
    /// Worker pool queue capacity; 0 means direct handoff.
    pub queue_capacity: Option<usize>,
    /// Idle seconds before a pool thread retires; 0 keeps threads forever.
    pub keep_alive_seconds: Option<u64>,
    /// Requests admitted at once.
    pub max_concurrent_requests: Option<usize>,
    /// Handler deadline in milliseconds; 0 runs handlers inline.
    pub request_timeout_millis: Option<u64>,
    /// Listen backlog.
    pub socket_backlog: Option<u32>,
    /// `abort`, `caller-runs` or `discard-oldest`.
    pub rejection_policy: Option<RejectionPolicy>,
}

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    host: String,
    port: u16,
    logging: LoggingSettings,
    tuning: ServerTuning,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            logging: LoggingSettings::default(),
            tuning: ServerTuning::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from_iter`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(env::args_os())
    }

    /// Loads configuration from `args`, whose first item is the program name.
    ///
    /// # Errors
    ///
    /// Fails when a layer is unreadable or malformed, when the command line
    /// is rejected (help and version requests included) or when the tuning
    /// violates a constraint.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let arguments: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let layers = ConfigLayers::load_from_iter(arguments).map_err(ConfigError::Load)?;
        Self::from_layers(layers)
    }

    /// Resolves layered values over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Tuning`] when the tuning values are invalid.
    pub fn from_layers(layers: ConfigLayers) -> Result<Self, ConfigError> {
        let defaults = LoggingSettings::default();
        let logging = LoggingSettings::new(
            layers
                .log_filter
                .unwrap_or_else(|| defaults.filter().to_owned()),
            layers.log_format.unwrap_or(defaults.format()),
        );

        let mut builder = ServerTuning::builder();
        if let Some(value) = layers.core_threads {
            builder = builder.core_threads(value);
        }
        if let Some(value) = layers.max_threads {
            builder = builder.max_threads(value);
        }
        if let Some(value) = layers.queue_capacity {
            builder = builder.queue_capacity(value);
        }
        if let Some(value) = layers.keep_alive_seconds {
            builder = builder.keep_alive_seconds(value);
        }
        if let Some(value) = layers.max_concurrent_requests {
            builder = builder.max_concurrent_requests(value);
        }
        if let Some(value) = layers.request_timeout_millis {
            builder = builder.request_timeout_millis(value);
        }
        if let Some(value) = layers.socket_backlog {
            builder = builder.socket_backlog(value);
        }
        if let Some(value) = layers.rejection_policy {
            builder = builder.rejection_policy(value);
        }

        Ok(Self {
            host: layers.host.unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            port: layers.port.unwrap_or(DEFAULT_PORT),
            logging,
            tuning: builder.build()?,
        })
    }

    /// Bind address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port; 0 asks the OS for an ephemeral port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Logging settings.
    #[must_use]
    pub const fn logging(&self) -> &LoggingSettings {
        &self.logging
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.logging.filter()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.logging.format()
    }

    /// Dispatch server tuning.
    #[must_use]
    pub const fn tuning(&self) -> &ServerTuning {
        &self.tuning
    }

    /// Replaces the bind address.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replaces the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Replaces the tuning.
    #[must_use]
    pub fn with_tuning(mut self, tuning: ServerTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Replaces the logging settings.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingSettings) -> Self {
        self.logging = logging;
        self
    }
}
