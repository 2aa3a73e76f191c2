//! Handler results: successful replies and application errors.

use summer_json::{ToJson, Value};
use thiserror::Error;

use crate::BindError;

/// What a handler returns on success.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A status and the value placed under `data` in the envelope.
    Data {
        /// HTTP status code.
        status: u16,
        /// Payload.
        body: Value,
    },
    /// `204 No Content` with an empty body.
    NoContent,
}

impl Reply {
    /// `200 OK` carrying `body`.
    #[must_use]
    pub fn ok(body: impl ToJson) -> Self {
        Self::with_status(200, body)
    }

    /// `201 Created` carrying `body`.
    #[must_use]
    pub fn created(body: impl ToJson) -> Self {
        Self::with_status(201, body)
    }

    /// An arbitrary status carrying `body`.
    #[must_use]
    pub fn with_status(status: u16, body: impl ToJson) -> Self {
        Self::Data {
            status,
            body: body.to_json(),
        }
    }

    /// `204 No Content`.
    #[must_use]
    pub fn no_content() -> Self {
        Self::NoContent
    }

    /// The HTTP status this reply is sent with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Data { status, .. } => *status,
            Self::NoContent => 204,
        }
    }
}

/// Errors a handler, or argument binding on its behalf, reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// An application error with its own status.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Client-facing message.
        message: String,
    },
    /// The request had the wrong shape for the handler.
    #[error("{0}")]
    BadRequest(String),
    /// Anything else; reported as 500.
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    /// An application error with an explicit status.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// A `404` application error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status(404, message)
    }

    /// A request-shape error (`400`).
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// An unexpected failure (`500`).
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Status code sent to the client.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Status { status, .. } => *status,
            Self::BadRequest(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

impl From<BindError> for HandlerError {
    fn from(error: BindError) -> Self {
        Self::BadRequest(error.to_string())
    }
}
