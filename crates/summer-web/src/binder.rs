//! Conversion of raw request text and JSON values into handler arguments.
//!
//! Every type a handler can receive implements [`FromJson`]. Scalars accept
//! their native JSON kind and numeric or boolean strings; structured types
//! opt in through [`impl_from_json_record!`](crate::impl_from_json_record) or
//! [`impl_from_json_fields!`](crate::impl_from_json_fields).

use summer_json::{Map, ParseError, Value};
use thiserror::Error;

/// Failures while turning request input into a typed argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The body was not valid JSON.
    #[error("malformed JSON body: {0}")]
    Json(#[from] ParseError),
    /// A non-optional target received `null` or nothing at all.
    #[error("missing value for '{field}' of type {target}")]
    Missing {
        /// Field or parameter being bound.
        field: String,
        /// Target type name.
        target: String,
    },
    /// The value could not be converted to the target type.
    #[error("cannot convert {found} to {target} for '{field}'")]
    Mismatch {
        /// Field or parameter being bound.
        field: String,
        /// Target type name.
        target: String,
        /// Kind, or literal, of the offending value.
        found: String,
    },
}

impl BindError {
    /// Creates a missing-value error for `T`.
    #[must_use]
    pub fn missing<T: FromJson>(field: &str) -> Self {
        Self::Missing {
            field: field.to_owned(),
            target: T::type_name(),
        }
    }

    /// Creates a conversion error for `T`.
    #[must_use]
    pub fn mismatch<T: FromJson>(field: &str, value: &Value) -> Self {
        let found = match value {
            Value::String(text) => format!("string \"{text}\""),
            other => other.kind().to_owned(),
        };
        Self::Mismatch {
            field: field.to_owned(),
            target: T::type_name(),
            found,
        }
    }
}

/// Types that can be produced from request input.
pub trait FromJson: Sized + Send + 'static {
    /// `true` for sequence targets, which cannot bind a body or path variable.
    const SEQUENCE: bool = false;

    /// Name used in diagnostics.
    fn type_name() -> String;

    /// Coerces a parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] when the value has no conversion to `Self`.
    fn from_json(value: &Value, field: &str) -> Result<Self, BindError>;

    /// Binds a raw request body. A blank body counts as `null`.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or an unsupported conversion.
    fn from_body(raw: &str, field: &str) -> Result<Self, BindError> {
        let value = if raw.trim().is_empty() {
            Value::Null
        } else {
            summer_json::parse(raw)?
        };
        Self::from_json(&value, field)
    }

    /// Binds one textual value taken from a path, query string or header.
    ///
    /// # Errors
    ///
    /// Fails when the text does not convert to `Self`.
    fn from_text(raw: &str, field: &str) -> Result<Self, BindError> {
        Self::from_json(&Value::String(raw.to_owned()), field)
    }

    /// Value used when the input is absent entirely.
    ///
    /// # Errors
    ///
    /// Every target except `Option` fails with [`BindError::Missing`].
    fn from_absent(field: &str) -> Result<Self, BindError> {
        Err(BindError::missing::<Self>(field))
    }
}

/// Binds a raw body to `T`; string targets receive the text verbatim.
///
/// # Errors
///
/// See [`FromJson::from_body`].
pub fn bind<T: FromJson>(raw: &str) -> Result<T, BindError> {
    T::from_body(raw, "body")
}

/// Coerces an already parsed value to `T`.
///
/// # Errors
///
/// See [`FromJson::from_json`].
pub fn coerce<T: FromJson>(value: &Value, field: &str) -> Result<T, BindError> {
    T::from_json(value, field)
}

/// Views `value` as an object for a structured target.
///
/// # Errors
///
/// `null` is a missing value; any other non-object is a mismatch.
pub fn expect_object<'v, T: FromJson>(value: &'v Value, field: &str) -> Result<&'v Map, BindError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Err(BindError::missing::<T>(field)),
        other => Err(BindError::mismatch::<T>(field, other)),
    }
}

/// Reads and coerces one member of an object.
///
/// # Errors
///
/// An absent member fails unless `T` is an `Option`.
pub fn member<T: FromJson>(object: &Map, name: &str) -> Result<T, BindError> {
    object
        .get(name)
        .map_or_else(|| T::from_absent(name), |value| T::from_json(value, name))
}

/// The integer a float spells exactly, if any. Display never uses an
/// exponent, so fractional, non-finite and out-of-range values fail to parse.
fn integral(value: f64) -> Option<i64> {
    value.to_string().parse().ok()
}

macro_rules! integer_from_json {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromJson for $ty {
                fn type_name() -> String {
                    stringify!($ty).to_owned()
                }

                fn from_json(value: &Value, field: &str) -> Result<Self, BindError> {
                    let converted = match value {
                        Value::Integer(number) => <$ty>::try_from(*number).ok(),
                        Value::Float(number) => {
                            integral(*number).and_then(|whole| <$ty>::try_from(whole).ok())
                        }
                        Value::String(text) => text.trim().parse::<$ty>().ok(),
                        Value::Null => return Err(BindError::missing::<Self>(field)),
                        _ => None,
                    };
                    converted.ok_or_else(|| BindError::mismatch::<Self>(field, value))
                }
            }
        )*
    };
}

integer_from_json!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromJson for f64 {
    fn type_name() -> String {
        "f64".to_owned()
    }

    #[expect(clippy::cast_precision_loss, reason = "integers widen to f64")]
    fn from_json(value: &Value, field: &str) -> Result<Self, BindError> {
        let converted = match value {
            Value::Integer(number) => Some(*number as f64),
            Value::Float(number) => Some(*number),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            Value::Null => return Err(BindError::missing::<Self>(field)),
            _ => None,
        };
        converted.ok_or_else(|| BindError::mismatch::<Self>(field, value))
    }
}

impl FromJson for bool {
    fn type_name() -> String {
        "bool".to_owned()
    }

    fn from_json(value: &Value, field: &str) -> Result<Self, BindError> {
        match value {
            Value::Bool(flag) => Ok(*flag),
            Value::String(text) if text.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(text) if text.eq_ignore_ascii_case("false") => Ok(false),
            Value::Null => Err(BindError::missing::<Self>(field)),
            other => Err(BindError::mismatch::<Self>(field, other)),
        }
    }
}

impl FromJson for String {
    fn type_name() -> String {
        "String".to_owned()
    }

    fn from_json(value: &Value, field: &str) -> Result<Self, BindError> {
        match value {
            Value::String(text) => Ok(text.clone()),
            Value::Integer(_) | Value::Float(_) | Value::Bool(_) => {
                Ok(summer_json::to_string(value))
            }
            Value::Null => Err(BindError::missing::<Self>(field)),
            other => Err(BindError::mismatch::<Self>(field, other)),
        }
    }

    fn from_body(raw: &str, _field: &str) -> Result<Self, BindError> {
        Ok(raw.to_owned())
    }

    fn from_text(raw: &str, _field: &str) -> Result<Self, BindError> {
        Ok(raw.to_owned())
    }
}

impl FromJson for Value {
    fn type_name() -> String {
        "Value".to_owned()
    }

    fn from_json(value: &Value, _field: &str) -> Result<Self, BindError> {
        Ok(value.clone())
    }
}

impl<T: FromJson> FromJson for Option<T> {
    fn type_name() -> String {
        format!("Option<{}>", T::type_name())
    }

    fn from_json(value: &Value, field: &str) -> Result<Self, BindError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_json(other, field).map(Some),
        }
    }

    fn from_body(raw: &str, field: &str) -> Result<Self, BindError> {
        if raw.trim().is_empty() || matches!(summer_json::parse(raw), Ok(Value::Null)) {
            return Ok(None);
        }
        T::from_body(raw, field).map(Some)
    }

    fn from_text(raw: &str, field: &str) -> Result<Self, BindError> {
        T::from_text(raw, field).map(Some)
    }

    fn from_absent(_field: &str) -> Result<Self, BindError> {
        Ok(None)
    }
}

impl<T: FromJson> FromJson for Vec<T> {
    const SEQUENCE: bool = true;

    fn type_name() -> String {
        format!("Vec<{}>", T::type_name())
    }

    fn from_json(value: &Value, field: &str) -> Result<Self, BindError> {
        match value {
            Value::Array(items) => items.iter().map(|item| T::from_json(item, field)).collect(),
            Value::Null => Err(BindError::missing::<Self>(field)),
            other => Err(BindError::mismatch::<Self>(field, other)),
        }
    }
}

/// Implements [`FromJson`] for a struct built positionally from named
/// members, each read from the JSON object and coerced recursively.
///
/// Members of `Option` type may be absent or `null`; any other member must be
/// present.
#[macro_export]
macro_rules! impl_from_json_record {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::FromJson for $ty {
            fn type_name() -> String {
                stringify!($ty).to_owned()
            }

            fn from_json(
                value: &$crate::json::Value,
                field: &str,
            ) -> Result<Self, $crate::BindError> {
                let object = $crate::binder::expect_object::<Self>(value, field)?;
                Ok(Self {
                    $($field: $crate::binder::member(object, stringify!($field))?,)*
                })
            }
        }
    };
}

/// Implements [`FromJson`] for a `Default` struct by assigning each listed
/// member present in the JSON object; absent members keep their defaults.
#[macro_export]
macro_rules! impl_from_json_fields {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::FromJson for $ty {
            fn type_name() -> String {
                stringify!($ty).to_owned()
            }

            fn from_json(
                value: &$crate::json::Value,
                field: &str,
            ) -> Result<Self, $crate::BindError> {
                let object = $crate::binder::expect_object::<Self>(value, field)?;
                let mut target = <Self as Default>::default();
                $(
                    if let Some(member) = object.get(stringify!($field)) {
                        target.$field = $crate::FromJson::from_json(member, stringify!($field))?;
                    }
                )*
                Ok(target)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{impl_from_json_fields, impl_from_json_record};

    #[derive(Debug, PartialEq)]
    struct CreateTodo {
        title: String,
        note: Option<String>,
        priority: i32,
    }

    impl_from_json_record!(CreateTodo { title, note, priority });

    #[derive(Debug, Default, PartialEq)]
    struct Patch {
        title: String,
        completed: bool,
        tags: Vec<String>,
    }

    impl_from_json_fields!(Patch { title, completed, tags });

    #[rstest]
    #[case(Value::Integer(42), 42)]
    #[case(Value::Float(42.0), 42)]
    #[case(Value::from("42"), 42)]
    #[case(Value::from(" -7 "), -7)]
    fn coerces_integers(#[case] value: Value, #[case] expected: i64) {
        assert_eq!(coerce::<i64>(&value, "n").expect("integer"), expected);
    }

    #[rstest]
    #[case(Value::Float(1e20))]
    #[case(Value::Float(f64::NAN))]
    #[case(Value::Float(0.5))]
    fn rejects_floats_without_an_exact_i64(#[case] value: Value) {
        assert!(coerce::<i64>(&value, "n").is_err());
    }

    #[rstest]
    #[case(Value::Float(1.5))]
    #[case(Value::from("abc"))]
    #[case(Value::Bool(true))]
    #[case(Value::Integer(-1))]
    fn rejects_non_integral_or_out_of_range(#[case] value: Value) {
        let error = coerce::<u32>(&value, "n").expect_err("not a u32");
        assert!(matches!(error, BindError::Mismatch { .. }));
    }

    #[rstest]
    #[case(Value::Bool(true), true)]
    #[case(Value::from("TRUE"), true)]
    #[case(Value::from("False"), false)]
    fn coerces_booleans(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(coerce::<bool>(&value, "flag").expect("bool"), expected);
    }

    #[test]
    fn renders_scalars_as_strings() {
        assert_eq!(coerce::<String>(&Value::Integer(7), "s").expect("string"), "7");
        assert_eq!(coerce::<String>(&Value::Float(7.0), "s").expect("string"), "7.0");
    }

    #[test]
    fn string_bodies_are_verbatim() {
        assert_eq!(bind::<String>("  {not json").expect("raw"), "  {not json");
    }

    #[test]
    fn blank_body_is_null() {
        assert_eq!(bind::<Option<i64>>("   ").expect("none"), None);
        assert_eq!(bind::<Option<i64>>("null").expect("none"), None);
        let error = bind::<i64>("").expect_err("null for i64");
        assert_eq!(
            error,
            BindError::Missing {
                field: "body".into(),
                target: "i64".into()
            }
        );
    }

    #[test]
    fn malformed_body_reports_offset() {
        let error = bind::<Vec<i64>>("[1,").expect_err("malformed");
        assert!(matches!(error, BindError::Json(_)));
        assert!(error.to_string().contains("at position 3"));
    }

    #[test]
    fn binds_records_by_member_name() {
        let todo = bind::<CreateTodo>(r#"{"priority":"2","title":"buy milk"}"#).expect("record");
        assert_eq!(
            todo,
            CreateTodo {
                title: "buy milk".into(),
                note: None,
                priority: 2
            }
        );
    }

    #[test]
    fn record_requires_non_optional_members() {
        let error = bind::<CreateTodo>(r#"{"title":"x"}"#).expect_err("priority missing");
        assert_eq!(error.to_string(), "missing value for 'priority' of type i32");
    }

    #[test]
    fn field_style_keeps_defaults_for_absent_members() {
        let patch = bind::<Patch>(r#"{"completed":true,"tags":["a","b"]}"#).expect("fields");
        assert_eq!(
            patch,
            Patch {
                title: String::new(),
                completed: true,
                tags: vec!["a".into(), "b".into()]
            }
        );
    }

    #[test]
    fn structured_target_rejects_arrays() {
        let error = bind::<Patch>("[]").expect_err("not an object");
        assert_eq!(error.to_string(), "cannot convert array to Patch for 'body'");
    }
}
