//! Logging settings shared by the application binary and its telemetry.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::defaults::{default_log_filter, default_log_format};

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Single-line human-readable events.
    #[default]
    Compact,
}

/// Filter expression and output format for the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingSettings {
    filter: String,
    format: LogFormat,
}

impl LoggingSettings {
    /// Creates settings from an `EnvFilter`-style expression and a format.
    #[must_use]
    pub fn new(filter: impl Into<String>, format: LogFormat) -> Self {
        Self {
            filter: filter.into(),
            format,
        }
    }

    /// The filter expression, such as `info` or `summer_web=debug`.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// The output format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self::new(default_log_filter(), default_log_format())
    }
}
