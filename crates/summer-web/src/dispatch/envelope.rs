//! The JSON envelope wrapped around every response body.

use summer_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// `{success: true, path, timestamp, data}`.
#[must_use]
pub fn success(path: &str, data: Value) -> Value {
    Map::new()
        .with("success", true)
        .with("path", path)
        .with("timestamp", timestamp())
        .with("data", data)
        .into()
}

/// `{success: false, path, timestamp, status, error}`.
#[must_use]
pub fn failure(path: &str, status: u16, error: &str) -> Value {
    Map::new()
        .with("success", false)
        .with("path", path)
        .with("timestamp", timestamp())
        .with("status", i64::from(status))
        .with("error", error)
        .into()
}

/// Current UTC time in RFC 3339 form.
#[must_use]
pub fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_orders_members() {
        let envelope = success("/api/todos", Value::Integer(1));
        let keys: Vec<&str> = envelope.as_object().expect("object").keys().collect();
        assert_eq!(keys, ["success", "path", "timestamp", "data"]);
        assert_eq!(envelope.get("data"), Some(&Value::Integer(1)));
    }

    #[test]
    fn failure_envelope_carries_status_and_error() {
        let envelope = failure("/x", 404, "Route not found");
        assert_eq!(envelope.get("success"), Some(&Value::Bool(false)));
        assert_eq!(envelope.get("status"), Some(&Value::Integer(404)));
        assert_eq!(envelope.get("error").and_then(Value::as_str), Some("Route not found"));
    }

    #[test]
    fn timestamps_are_rfc3339_utc() {
        let stamp = timestamp();
        assert!(stamp.ends_with('Z'), "{stamp}");
        assert!(OffsetDateTime::parse(&stamp, &Rfc3339).is_ok());
    }
}
