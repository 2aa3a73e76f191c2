//! Built-in defaults, the lowest configuration layer.

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Prefix shared by the environment variables `SUMMER_PORT`,
/// `SUMMER_CORE_THREADS`, `SUMMER_CONFIG_PATH` and friends.
pub const ENV_PREFIX: &str = "SUMMER_";

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}
