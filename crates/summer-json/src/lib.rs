//! Hand-written JSON codec for the Summer runtime.
//!
//! The codec works over a small dynamically typed value tree ([`Value`]) and
//! keeps the distinction between integers and floating-point numbers through
//! a parse/serialize round trip: `7` stays `7` and `7.0` stays `7.0`. Objects
//! preserve key insertion order.
//!
//! Structured Rust values take part in serialization through [`ToJson`]. The
//! [`impl_to_json!`] macro derives it for plain structs by listing their
//! members, which replaces runtime field reflection with an explicit mapping.
//!
//! ```ignore
//! use summer_json::{impl_to_json, to_string, ToJson};
//!
//! struct Point { x: i64, y: i64 }
//! impl_to_json!(Point { x, y });
//!
//! assert_eq!(to_string(&Point { x: 1, y: 2 }.to_json()), r#"{"x":1,"y":2}"#);
//! ```

mod parser;
mod value;
mod writer;

pub use parser::{MAX_DEPTH, ParseError, parse};
pub use value::{Map, Value};
pub use writer::{ToJson, to_string, write_value};

/// Implements [`ToJson`] for a struct by listing its members.
///
/// Each listed member is rendered under its declared name, in the listed order.
#[macro_export]
macro_rules! impl_to_json {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::ToJson for $ty {
            fn to_json(&self) -> $crate::Value {
                let mut map = $crate::Map::new();
                $(map.insert(stringify!($field), $crate::ToJson::to_json(&self.$field));)*
                $crate::Value::Object(map)
            }
        }
    };
}
