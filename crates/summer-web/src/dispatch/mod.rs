//! Request dispatch: framing, the per-connection cycle, envelopes and
//! error-to-status mapping.

pub mod envelope;
mod errors;
mod handler;
mod request;
mod response;

pub use self::errors::DispatchError;
pub(crate) use self::handler::{DispatchHandler, RouteExecution};
pub use self::response::ResponseWriter;

/// Tracing target for request dispatch.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
