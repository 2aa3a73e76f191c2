//! Socket listener plumbing for the dispatch server.

mod errors;
mod listener;

use std::net::TcpStream;

pub use self::errors::ListenerError;
pub(crate) use self::listener::{ListenerHandle, SocketListener};

use crate::concurrency::PoolError;

/// Tracing target for listener events.
pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Handles a single accepted client connection.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves the connection; runs on a transport worker.
    fn handle(&self, stream: TcpStream);

    /// Answers a connection the transport pool refused, evicted or dropped
    /// while it was still queued. Runs on the thread that let go of it.
    fn reject(&self, stream: TcpStream, error: &PoolError);
}
