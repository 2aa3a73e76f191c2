//! Handler parameter declarations and their bound values.

use std::any::{Any, type_name};

use strum::Display;

use crate::binder::{BindError, FromJson};
use crate::{HandlerError, RequestContext};

use super::path::PathVariables;

/// One bound argument, unpacked by [`Arguments::take`].
pub type Argument = Box<dyn Any + Send>;

type BodyBinder = fn(&str, &str) -> Result<Argument, BindError>;
type ValuesBinder = fn(&[String], &str) -> Result<Argument, BindError>;
type AbsentBinder = fn(&str) -> Result<Argument, BindError>;

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BindingKind {
    /// The whole request body.
    Body,
    /// A `{name}` segment of the route template.
    PathVariable,
    /// A query-string parameter.
    Query,
    /// A request header.
    Header,
}

/// Declaration of one handler parameter.
///
/// ```ignore
/// Param::of::<i64>("id").path_variable()
/// Param::of::<Option<bool>>("completed").query().optional()
/// Param::list::<String>("tag").query()
/// ```
#[derive(Clone)]
pub struct Param {
    name: String,
    alias: Option<String>,
    kinds: Vec<BindingKind>,
    required: bool,
    default: Option<String>,
    sequence: bool,
    target: String,
    from_body: BodyBinder,
    from_values: ValuesBinder,
    from_absent: AbsentBinder,
}

impl Param {
    /// A single value of type `T`, bound under `name` unless renamed.
    #[must_use]
    pub fn of<T: FromJson>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            kinds: Vec::new(),
            required: true,
            default: None,
            sequence: T::SEQUENCE,
            target: T::type_name(),
            from_body: body_value::<T>,
            from_values: first_value::<T>,
            from_absent: absent_value::<T>,
        }
    }

    /// Every value of a query parameter or header, coerced to `T`; the
    /// handler receives a `Vec<T>`.
    #[must_use]
    pub fn list<T: FromJson>(name: impl Into<String>) -> Self {
        Self {
            sequence: true,
            target: <Vec<T>>::type_name(),
            from_body: body_value::<Vec<T>>,
            from_values: all_values::<T>,
            from_absent: empty_list::<T>,
            ..Self::of::<Vec<T>>(name)
        }
    }

    /// Binds the request body.
    #[must_use]
    pub fn body(self) -> Self {
        self.kind(BindingKind::Body)
    }

    /// Binds a template variable.
    #[must_use]
    pub fn path_variable(self) -> Self {
        self.kind(BindingKind::PathVariable)
    }

    /// Binds a query parameter.
    #[must_use]
    pub fn query(self) -> Self {
        self.kind(BindingKind::Query)
    }

    /// Binds a header.
    #[must_use]
    pub fn header(self) -> Self {
        self.kind(BindingKind::Header)
    }

    /// Looks the value up under `key` instead of the parameter name.
    #[must_use]
    pub fn named(mut self, key: impl Into<String>) -> Self {
        self.alias = Some(key.into());
        self
    }

    /// Allows the value to be absent.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Uses `literal` when the value is absent; implies optional.
    #[must_use]
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self.required = false;
        self
    }

    fn kind(mut self, kind: BindingKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kinds(&self) -> &[BindingKind] {
        &self.kinds
    }

    pub(crate) fn is_sequence(&self) -> bool {
        self.sequence
    }

    /// Lookup key: the explicit name when given, else the parameter name.
    pub(crate) fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn into_binding(self, kind: BindingKind) -> ParameterBinding {
        ParameterBinding {
            key: self.key().to_owned(),
            kind,
            required: self.required,
            default: self.default,
            sequence: self.sequence,
            target: self.target,
            from_body: self.from_body,
            from_values: self.from_values,
            from_absent: self.from_absent,
        }
    }
}

fn boxed<T: Send + 'static>(value: T) -> Argument {
    Box::new(value)
}

fn body_value<T: FromJson>(raw: &str, field: &str) -> Result<Argument, BindError> {
    T::from_body(raw, field).map(boxed)
}

fn first_value<T: FromJson>(values: &[String], field: &str) -> Result<Argument, BindError> {
    values
        .first()
        .map_or_else(|| T::from_absent(field), |value| T::from_text(value, field))
        .map(boxed)
}

fn all_values<T: FromJson>(values: &[String], field: &str) -> Result<Argument, BindError> {
    values
        .iter()
        .map(|value| T::from_text(value, field))
        .collect::<Result<Vec<T>, _>>()
        .map(boxed)
}

fn absent_value<T: FromJson>(field: &str) -> Result<Argument, BindError> {
    T::from_absent(field).map(boxed)
}

fn empty_list<T: FromJson>(_field: &str) -> Result<Argument, BindError> {
    Ok(boxed(Vec::<T>::new()))
}

/// A validated parameter, classified once when the router is built.
#[derive(Clone)]
pub(crate) struct ParameterBinding {
    key: String,
    kind: BindingKind,
    required: bool,
    default: Option<String>,
    sequence: bool,
    target: String,
    from_body: BodyBinder,
    from_values: ValuesBinder,
    from_absent: AbsentBinder,
}

impl ParameterBinding {
    pub(crate) fn kind(&self) -> BindingKind {
        self.kind
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn target(&self) -> &str {
        &self.target
    }

    pub(crate) fn bind(
        &self,
        request: &RequestContext,
        variables: &PathVariables,
    ) -> Result<Argument, HandlerError> {
        match self.kind {
            BindingKind::Body => Ok((self.from_body)(request.body(), &self.key)?),
            BindingKind::PathVariable => {
                let raw = variables.get(&self.key).ok_or_else(|| {
                    HandlerError::bad_request(format!("Missing path variable '{}'", self.key))
                })?;
                Ok((self.from_values)(&[raw.to_owned()], &self.key)?)
            }
            BindingKind::Query => self.bind_values("request param", request.query(&self.key)),
            BindingKind::Header => self.bind_values("request header", request.header(&self.key)),
        }
    }

    fn bind_values(&self, source: &str, values: &[String]) -> Result<Argument, HandlerError> {
        if !values.is_empty() {
            return Ok((self.from_values)(values, &self.key)?);
        }
        if let Some(default) = &self.default {
            return Ok((self.from_values)(std::slice::from_ref(default), &self.key)?);
        }
        if self.required {
            return Err(HandlerError::bad_request(format!(
                "Missing {source} '{}'",
                self.key
            )));
        }
        if self.sequence {
            return Ok((self.from_absent)(&self.key)?);
        }
        (self.from_absent)(&self.key).map_err(|_| {
            HandlerError::bad_request(format!(
                "{source} '{}' cannot be absent for type {}",
                self.key, self.target
            ))
        })
    }
}

/// Arguments produced for one invocation, in declaration order.
pub struct Arguments {
    values: Vec<Option<Argument>>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Argument>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    /// Moves out the argument at `index` as a `T`.
    ///
    /// # Errors
    ///
    /// Fails as an internal error when the slot is empty, already taken, or
    /// holds another type.
    pub fn take<T: 'static>(&mut self, index: usize) -> Result<T, HandlerError> {
        let value = self
            .values
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| HandlerError::internal(format!("argument {index} is not available")))?;
        value.downcast::<T>().map(|value| *value).map_err(|_| {
            HandlerError::internal(format!("argument {index} is not a {}", type_name::<T>()))
        })
    }

    /// Number of declared arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` for parameterless handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMethod;

    fn binding(param: Param) -> ParameterBinding {
        let kind = param.kinds()[0];
        param.into_binding(kind)
    }

    fn request() -> RequestContext {
        RequestContext::new(HttpMethod::Get, "/")
    }

    #[test]
    fn scalar_query_takes_first_value() {
        let request = request().with_query("n", "3").with_query("n", "4");
        let bound = binding(Param::of::<i64>("n").query())
            .bind(&request, &PathVariables::default())
            .expect("bound");
        let mut arguments = Arguments::new(vec![bound]);
        assert_eq!(arguments.take::<i64>(0).expect("i64"), 3);
    }

    #[test]
    fn list_query_coerces_every_value() {
        let request = request().with_query("n", "3").with_query("n", "4");
        let bound = binding(Param::list::<u32>("n").query())
            .bind(&request, &PathVariables::default())
            .expect("bound");
        let mut arguments = Arguments::new(vec![bound]);
        assert_eq!(arguments.take::<Vec<u32>>(0).expect("list"), vec![3, 4]);
    }

    #[test]
    fn absent_values_follow_declared_fallbacks() {
        let none = PathVariables::default();
        let defaulted = binding(Param::of::<i64>("page").query().default_value("1"))
            .bind(&request(), &none)
            .expect("default applies");
        let optional = binding(Param::of::<Option<bool>>("done").query().optional())
            .bind(&request(), &none)
            .expect("none");
        let empty = binding(Param::list::<String>("tag").header().optional())
            .bind(&request(), &none)
            .expect("empty list");
        let mut arguments = Arguments::new(vec![defaulted, optional, empty]);
        assert_eq!(arguments.take::<i64>(0).expect("page"), 1);
        assert_eq!(arguments.take::<Option<bool>>(1).expect("done"), None);
        assert!(arguments.take::<Vec<String>>(2).expect("tags").is_empty());
    }

    #[test]
    fn required_absent_value_is_a_bad_request() {
        let error = binding(Param::of::<String>("X-Token").header())
            .bind(&request(), &PathVariables::default())
            .err()
            .expect("missing header");
        assert_eq!(
            error,
            HandlerError::bad_request("Missing request header 'X-Token'")
        );
    }

    #[test]
    fn optional_non_option_scalar_cannot_be_absent() {
        let error = binding(Param::of::<i64>("limit").query().optional())
            .bind(&request(), &PathVariables::default())
            .err()
            .expect("no value");
        assert_eq!(error.status_code(), 400);
    }

    #[test]
    fn alias_replaces_lookup_key() {
        let request = request().with_query("q", "milk");
        let bound = binding(Param::of::<String>("search").query().named("q"))
            .bind(&request, &PathVariables::default())
            .expect("aliased");
        let mut arguments = Arguments::new(vec![bound]);
        assert_eq!(arguments.take::<String>(0).expect("text"), "milk");
    }

    #[test]
    fn take_rejects_wrong_type_and_second_take() {
        let mut arguments = Arguments::new(vec![boxed(5_i64)]);
        assert!(arguments.take::<String>(0).is_err());
        let mut arguments = Arguments::new(vec![boxed(5_i64)]);
        assert_eq!(arguments.take::<i64>(0).expect("first"), 5);
        assert!(arguments.take::<i64>(0).is_err());
    }
}
