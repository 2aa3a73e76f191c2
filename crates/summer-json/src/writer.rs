//! Compact JSON serialization.

use std::collections::{BTreeMap, HashMap};

use crate::value::{Map, Value};

/// Conversion of a Rust value into a JSON [`Value`].
pub trait ToJson {
    /// Builds the JSON representation of `self`.
    fn to_json(&self) -> Value;
}

/// Serializes `value` as compact JSON text.
#[must_use]
pub fn to_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Appends the compact JSON text of `value` to `out`.
///
/// Non-finite floats have no JSON spelling and are written as `null`.
pub fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Integer(number) => out.push_str(&number.to_string()),
        // Debug keeps a trailing ".0" on integral floats.
        Value::Float(number) if number.is_finite() => out.push_str(&format!("{number:?}")),
        Value::Float(_) => out.push_str("null"),
        Value::String(text) => write_string(text, out),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (index, (key, item)) in map.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_string(text: &str, out: &mut String) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            control if control < '\u{0020}' => {
                out.push_str(&format!("\\u{:04x}", u32::from(control)));
            }
            other => out.push(other),
        }
    }
    out.push('"');
}

impl ToJson for Value {
    fn to_json(&self) -> Value {
        self.clone()
    }
}

impl ToJson for Map {
    fn to_json(&self) -> Value {
        Value::Object(self.clone())
    }
}

impl ToJson for bool {
    fn to_json(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! integer_to_json {
    ($($ty:ty),*) => {
        $(impl ToJson for $ty {
            fn to_json(&self) -> Value {
                Value::Integer(i64::from(*self))
            }
        })*
    };
}

integer_to_json!(i8, i16, i32, i64, u8, u16, u32);

impl ToJson for u64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "values beyond i64 have no exact integer form"
    )]
    fn to_json(&self) -> Value {
        i64::try_from(*self).map_or_else(|_| Value::Float(*self as f64), Value::Integer)
    }
}

impl ToJson for usize {
    fn to_json(&self) -> Value {
        u64::try_from(*self).map_or(Value::Null, |wide| wide.to_json())
    }
}

impl ToJson for f32 {
    fn to_json(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl ToJson for f64 {
    fn to_json(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToJson for str {
    fn to_json(&self) -> Value {
        Value::String(self.to_owned())
    }
}

impl ToJson for String {
    fn to_json(&self) -> Value {
        Value::String(self.clone())
    }
}

impl<T: ToJson + ?Sized> ToJson for &T {
    fn to_json(&self) -> Value {
        (**self).to_json()
    }
}

impl<T: ToJson> ToJson for Option<T> {
    fn to_json(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToJson::to_json)
    }
}

impl<T: ToJson> ToJson for [T] {
    fn to_json(&self) -> Value {
        Value::Array(self.iter().map(ToJson::to_json).collect())
    }
}

impl<T: ToJson> ToJson for Vec<T> {
    fn to_json(&self) -> Value {
        self.as_slice().to_json()
    }
}

impl<T: ToJson> ToJson for BTreeMap<String, T> {
    fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl<T: ToJson, S> ToJson for HashMap<String, T, S> {
    fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::parse;

    #[rstest]
    #[case(Value::Integer(7), "7")]
    #[case(Value::Float(7.0), "7.0")]
    #[case(Value::Float(0.25), "0.25")]
    #[case(Value::Float(f64::NAN), "null")]
    #[case(Value::Float(f64::INFINITY), "null")]
    fn writes_numbers(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(to_string(&value), expected);
    }

    #[test]
    fn escapes_control_characters() {
        let value = Value::from("a\"b\\c\nd\u{0001}");
        assert_eq!(to_string(&value), r#""a\"b\\c\nd\u0001""#);
    }

    #[test]
    fn round_trips_compact_text() {
        let text = r#"{"a":1,"b":[true,null,"x"],"c":{"d":7.0}}"#;
        let value = parse(text).expect("valid document");
        assert_eq!(to_string(&value), text);
    }

    #[test]
    fn output_is_accepted_by_serde_json() {
        let value = Value::Object(
            Map::new()
                .with("title", "line\tbreak \u{1F600}")
                .with("done", false)
                .with("ratio", 0.5),
        );
        let reparsed: serde_json::Value =
            serde_json::from_str(&to_string(&value)).expect("serde_json parses our output");
        assert_eq!(reparsed["title"], "line\tbreak \u{1F600}");
        assert_eq!(reparsed["done"], false);
        assert_eq!(reparsed["ratio"], 0.5);
    }

    struct Todo {
        id: i64,
        title: String,
        tags: Vec<String>,
        due: Option<String>,
    }

    crate::impl_to_json!(Todo { id, title, tags, due });

    #[test]
    fn macro_renders_members_in_listed_order() {
        let todo = Todo {
            id: 3,
            title: "write".to_owned(),
            tags: vec!["home".to_owned()],
            due: None,
        };
        assert_eq!(
            to_string(&todo.to_json()),
            r#"{"id":3,"title":"write","tags":["home"],"due":null}"#
        );
    }
}
