//! The parsed request handed to routing and argument binding.

use std::collections::HashMap;

use strum::{Display, EnumString};

/// Methods the router can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
}

/// One HTTP request: method, path, decoded query, headers and raw body.
///
/// Header names are stored lower-cased; query and header values keep their
/// arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    method: HttpMethod,
    path: String,
    query: HashMap<String, Vec<String>>,
    headers: HashMap<String, Vec<String>>,
    body: String,
}

impl RequestContext {
    /// Creates a request with no query, headers or body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Appends a query value.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_query(name, value);
        self
    }

    /// Appends a header value.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.push_header(name, value);
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn push_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query.entry(name.into()).or_default().push(value.into());
    }

    pub(crate) fn push_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub(crate) fn set_body(&mut self, body: String) {
        self.body = body;
    }

    /// Request method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Every value of a query parameter.
    #[must_use]
    pub fn query(&self, name: &str) -> &[String] {
        self.query.get(name).map_or(&[], Vec::as_slice)
    }

    /// Every value of a header, looked up case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Raw body text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("GET", HttpMethod::Get)]
    #[case("patch", HttpMethod::Patch)]
    #[case("Delete", HttpMethod::Delete)]
    fn parses_methods(#[case] input: &str, #[case] expected: HttpMethod) {
        assert_eq!(input.parse::<HttpMethod>().expect("method"), expected);
    }

    #[test]
    fn rejects_unknown_methods() {
        assert!("OPTIONS".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let request = RequestContext::new(HttpMethod::Get, "/")
            .with_header("X-Trace", "a")
            .with_header("x-trace", "b");
        assert_eq!(request.header("X-TRACE"), ["a", "b"]);
        assert!(request.query("missing").is_empty());
    }
}
