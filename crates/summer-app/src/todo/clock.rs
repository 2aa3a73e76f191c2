//! Wall-clock source produced by a factory method on the application root.

use summer_container::Component;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Supplies the current time as RFC 3339 text.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> String;
}

/// [`Clock`] reading the system's UTC time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Component for SystemClock {}

impl Clock for SystemClock {
    fn now(&self) -> String {
        OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
    }
}
