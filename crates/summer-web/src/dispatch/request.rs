//! HTTP/1.1 request framing: bounded head and body reads, query decoding.

use std::io::{self, BufRead, Read};

use percent_encoding::percent_decode_str;

use crate::RequestContext;
use crate::request::HttpMethod;

use super::errors::DispatchError;

/// Maximum size of the request line plus headers.
pub(crate) const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Maximum size of a request body.
pub(crate) const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Request line and headers, read before admission and routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestHead {
    method: String,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Method token exactly as sent.
    pub(crate) fn method(&self) -> &str {
        &self.method
    }

    /// Path without query or fragment, undecoded.
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Declared body length; absent means no body.
    pub(crate) fn content_length(&self) -> Result<usize, DispatchError> {
        if self
            .header("transfer-encoding")
            .is_some_and(|value| value.to_ascii_lowercase().contains("chunked"))
        {
            return Err(DispatchError::bad_request(
                "chunked request bodies are not supported",
            ));
        }
        self.header("content-length").map_or(Ok(0), |raw| {
            raw.trim()
                .parse::<usize>()
                .map_err(|_| DispatchError::bad_request(format!("invalid Content-Length: {raw}")))
        })
    }

    /// Builds the routing view once the method is known to be supported.
    pub(crate) fn into_context(self, method: HttpMethod, body: String) -> RequestContext {
        let mut request = RequestContext::new(method, self.path);
        for (name, value) in parse_query(self.query.as_deref().unwrap_or_default()) {
            request.push_query(name, value);
        }
        for (name, value) in &self.headers {
            request.push_header(name, value.clone());
        }
        request.set_body(body);
        request
    }
}

/// Reads the request line and headers.
///
/// Returns `Ok(None)` when the client disconnects before sending anything.
pub(crate) fn read_head<R: BufRead>(reader: &mut R) -> Result<Option<RequestHead>, DispatchError> {
    let mut consumed = 0_usize;
    let Some(request_line) = read_line(reader, &mut consumed)? else {
        return Ok(None);
    };

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(DispatchError::bad_request(format!(
            "malformed request line: {request_line}"
        )));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(DispatchError::bad_request(format!(
            "unsupported protocol version: {version}"
        )));
    }

    let mut headers = Vec::new();
    loop {
        let Some(line) = read_line(reader, &mut consumed)? else {
            return Err(DispatchError::bad_request("request head ended early"));
        };
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(DispatchError::bad_request(format!("malformed header: {line}")));
        };
        headers.push((name.trim().to_owned(), value.trim().to_owned()));
    }

    let resource = target.split_once('#').map_or(target, |(before, _)| before);
    let (path, query) = resource
        .split_once('?')
        .map_or((resource, None), |(route, raw)| (route, Some(raw.to_owned())));
    Ok(Some(RequestHead {
        method: method.to_owned(),
        path: path.to_owned(),
        query,
        headers,
    }))
}

/// Reads one CRLF- or LF-terminated line, enforcing the head limit.
fn read_line<R: BufRead>(
    reader: &mut R,
    consumed: &mut usize,
) -> Result<Option<String>, DispatchError> {
    let mut line = Vec::new();
    let remaining = MAX_HEAD_BYTES.saturating_sub(*consumed);
    let read = reader
        .by_ref()
        .take(u64::try_from(remaining).unwrap_or(u64::MAX).saturating_add(1))
        .read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    *consumed += read;
    if *consumed > MAX_HEAD_BYTES {
        return Err(DispatchError::request_too_large(*consumed, MAX_HEAD_BYTES));
    }
    while line.last().is_some_and(|byte| matches!(byte, b'\n' | b'\r')) {
        line.pop();
    }
    String::from_utf8(line)
        .map(Some)
        .map_err(|_| DispatchError::bad_request("request head is not valid UTF-8"))
}

/// Reads exactly `length` body bytes as UTF-8 text.
pub(crate) fn read_body<R: Read>(reader: &mut R, length: usize) -> Result<String, DispatchError> {
    if length > MAX_BODY_BYTES {
        return Err(DispatchError::request_too_large(length, MAX_BODY_BYTES));
    }
    let mut body = vec![0_u8; length];
    reader.read_exact(&mut body).map_err(|error| match error.kind() {
        io::ErrorKind::UnexpectedEof => DispatchError::bad_request("request body ended early"),
        _ => DispatchError::Io(error),
    })?;
    String::from_utf8(body).map_err(|_| DispatchError::bad_request("request body is not valid UTF-8"))
}

/// Splits and decodes a query string; `+` reads as a space.
pub(crate) fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(name), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    fn head(raw: &str) -> Result<Option<RequestHead>, DispatchError> {
        read_head(&mut Cursor::new(raw.as_bytes().to_vec()))
    }

    #[test]
    fn parses_request_line_and_headers() {
        let parsed = head("PATCH /api/todos/4%202/completed?completed=false HTTP/1.1\r\nHost: x\r\nContent-Length: 2\r\n\r\n{}")
            .expect("head")
            .expect("request");
        assert_eq!(parsed.method(), "PATCH");
        assert_eq!(parsed.path(), "/api/todos/4%202/completed");
        assert_eq!(parsed.content_length().expect("length"), 2);
        let request = parsed.into_context(HttpMethod::Patch, "{}".into());
        assert_eq!(request.query("completed"), ["false"]);
        assert_eq!(request.header("host"), ["x"]);
    }

    #[test]
    fn empty_connection_yields_nothing() {
        assert!(head("").expect("eof").is_none());
    }

    #[rstest]
    #[case("GARBAGE\r\n\r\n")]
    #[case("GET / SPDY/3\r\n\r\n")]
    #[case("GET / HTTP/1.1\r\nno-colon\r\n\r\n")]
    #[case("GET / HTTP/1.1\r\nHost: x\r\n")]
    fn rejects_malformed_heads(#[case] raw: &str) {
        let error = head(raw).expect_err("malformed");
        assert_eq!(error.status(), 400);
    }

    #[test]
    fn rejects_oversized_heads() {
        let raw = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "a".repeat(MAX_HEAD_BYTES));
        let error = head(&raw).expect_err("too large");
        assert!(error.to_string().contains("request too large"));
    }

    #[test]
    fn rejects_oversized_bodies_before_reading() {
        let error = read_body(&mut Cursor::new(Vec::new()), MAX_BODY_BYTES + 1).expect_err("too large");
        assert_eq!(error.status(), 400);
    }

    #[test]
    fn short_body_is_a_bad_request() {
        let error = read_body(&mut Cursor::new(b"{}".to_vec()), 5).expect_err("short");
        assert_eq!(error.to_string(), "request body ended early");
    }

    #[rstest]
    #[case("q=buy+milk", vec![("q", "buy milk")])]
    #[case("q=caf%C3%A9&q=tea", vec![("q", "café"), ("q", "tea")])]
    #[case("flag&&x=", vec![("flag", ""), ("x", "")])]
    #[case("a%2Bb=1%2B1", vec![("a+b", "1+1")])]
    fn decodes_query_strings(#[case] raw: &str, #[case] expected: Vec<(&str, &str)>) {
        let decoded = parse_query(raw);
        let pairs: Vec<(&str, &str)> = decoded
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn chunked_bodies_are_refused() {
        let parsed = head("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n")
            .expect("head")
            .expect("request");
        assert!(parsed.content_length().is_err());
    }
}
