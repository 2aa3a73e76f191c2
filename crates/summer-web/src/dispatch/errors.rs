//! Error types for request dispatch failures.
//!
//! Every variant maps to exactly one HTTP status through
//! [`DispatchError::status`]; the message is what the client sees in the
//! envelope's `error` member.

use std::io;

use thiserror::Error;

use crate::HandlerError;
use crate::concurrency::PoolError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Errors surfaced while reading, routing or running a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request was malformed, too large, or did not bind.
    #[error("{message}")]
    BadRequest {
        /// Client-facing description.
        message: String,
    },

    /// The method is not one the router dispatches.
    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod {
        /// The method token as received.
        method: String,
    },

    /// No route matched.
    #[error("Route not found")]
    RouteNotFound,

    /// The admission guard had no permit left.
    #[error("Server is overloaded")]
    Overloaded,

    /// A worker pool refused the task.
    #[error("Server queue is full")]
    QueueFull,

    /// The handler missed its deadline.
    #[error("Request timed out after {millis} ms")]
    Timeout {
        /// The deadline that passed.
        millis: u64,
    },

    /// The handler reported an application error.
    #[error("{message}")]
    Application {
        /// Status chosen by the handler.
        status: u16,
        /// Client-facing description.
        message: String,
    },

    /// Anything unexpected, including handler panics.
    #[error("{message}")]
    Internal {
        /// Client-facing description.
        message: String,
    },

    /// Reading the request failed.
    #[error("failed to read request: {0}")]
    Io(#[from] io::Error),
}

impl DispatchError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } | Self::UnsupportedMethod { .. } | Self::Io(_) => 400,
            Self::RouteNotFound => 404,
            Self::Overloaded | Self::QueueFull => 503,
            Self::Timeout { .. } => 504,
            Self::Application { status, .. } => *status,
            Self::Internal { .. } => 500,
        }
    }

    /// Creates a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates an unsupported method error.
    #[must_use]
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(millis: u64) -> Self {
        Self::Timeout { millis }
    }

    /// Creates an internal error; a blank message becomes
    /// "Internal server error".
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        let text = message.into();
        Self::Internal {
            message: if text.trim().is_empty() {
                INTERNAL_MESSAGE.to_owned()
            } else {
                text
            },
        }
    }

    /// Creates a request too large error.
    #[must_use]
    pub fn request_too_large(size: usize, max_size: usize) -> Self {
        Self::bad_request(format!(
            "request too large: {size} bytes exceeds {max_size} byte limit"
        ))
    }
}

impl From<HandlerError> for DispatchError {
    fn from(error: HandlerError) -> Self {
        match error {
            HandlerError::Status { status, message } => Self::Application { status, message },
            HandlerError::BadRequest(message) => Self::BadRequest { message },
            HandlerError::Internal(message) => Self::internal(message),
        }
    }
}

impl From<PoolError> for DispatchError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Saturated { .. } | PoolError::Discarded { .. } => Self::QueueFull,
            other => Self::internal(other.to_string()),
        }
    }
}
