//! Response serialization for the one-request-per-connection protocol.

use std::io::{self, Write};

use summer_json::Value;

use crate::Reply;

use super::envelope;
use super::errors::DispatchError;

/// Writes enveloped JSON responses, each followed by connection close.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Creates a writer over the client stream.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a handler's reply, enveloped unless it is `204`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_reply(&mut self, path: &str, reply: Reply) -> io::Result<()> {
        match reply {
            Reply::Data { status, body } => self.write_json(status, &envelope::success(path, body)),
            Reply::NoContent => self.write_no_content(),
        }
    }

    /// Writes a failure envelope for `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_error(&mut self, path: &str, error: &DispatchError) -> io::Result<()> {
        let status = error.status();
        self.write_json(status, &envelope::failure(path, status, &error.to_string()))
    }

    /// Writes `body` as a JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_json(&mut self, status: u16, body: &Value) -> io::Result<()> {
        let payload = summer_json::to_string(body);
        write!(
            self.writer,
            "HTTP/1.1 {status} {}\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            reason_phrase(status),
            payload.len()
        )?;
        self.writer.write_all(payload.as_bytes())?;
        self.writer.flush()
    }

    /// Writes `204 No Content` with an empty body.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_no_content(&mut self) -> io::Result<()> {
        self.writer
            .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")?;
        self.writer.flush()
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Status",
    }
}
