//! The per-connection request cycle.

use std::io::{self, BufReader, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::concurrency::{OverloadGuard, PoolError, TaskError, WorkerPool};
use crate::routing::{RouteMatch, Router};
use crate::transport::ConnectionHandler;
use crate::{HttpMethod, Reply, RequestContext};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::{MAX_BODY_BYTES, RequestHead, read_body, read_head};
use super::response::ResponseWriter;

/// How long a client may stall while sending its request.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Handler deadline and the pool that enforces it.
#[derive(Debug, Clone)]
pub(crate) struct RouteExecution {
    pool: WorkerPool,
    timeout: Duration,
}

impl RouteExecution {
    pub(crate) fn new(pool: WorkerPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    fn run(&self, route: RouteMatch, request: RequestContext) -> Result<Reply, DispatchError> {
        let handle = self.pool.submit(move || route.invoke(&request))?;
        match handle.wait_timeout(self.timeout) {
            Ok(outcome) => outcome.map_err(DispatchError::from),
            Err(TaskError::TimedOut(_)) => Err(DispatchError::timeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
            Err(TaskError::Panicked(message)) => Err(DispatchError::internal(message)),
            Err(TaskError::Dropped) => Err(DispatchError::QueueFull),
        }
    }
}

/// Reads one request, runs it through the router and writes one response.
#[derive(Debug)]
pub(crate) struct DispatchHandler {
    router: Arc<Router>,
    guard: OverloadGuard,
    execution: Option<RouteExecution>,
}

impl DispatchHandler {
    pub(crate) fn new(
        router: Arc<Router>,
        guard: OverloadGuard,
        execution: Option<RouteExecution>,
    ) -> Self {
        Self {
            router,
            guard,
            execution,
        }
    }

    fn serve(&self, stream: &TcpStream) -> (String, Result<Reply, DispatchError>) {
        let mut reader = BufReader::new(stream);
        let head = match read_head(&mut reader) {
            Ok(Some(head)) => head,
            Ok(None) => return (String::new(), Err(DispatchError::bad_request("empty request"))),
            Err(error) => return (String::new(), Err(error)),
        };
        let path = head.path().to_owned();

        let Some(_permit) = self.guard.try_enter() else {
            return (path, Err(DispatchError::Overloaded));
        };
        let outcome = self.route(head, &mut reader);
        (path, outcome)
    }

    fn route(
        &self,
        head: RequestHead,
        reader: &mut BufReader<&TcpStream>,
    ) -> Result<Reply, DispatchError> {
        let method = head
            .method()
            .parse::<HttpMethod>()
            .map_err(|_| DispatchError::unsupported_method(head.method()))?;
        let route = self
            .router
            .resolve(method, head.path())
            .ok_or(DispatchError::RouteNotFound)?;
        let length = head.content_length()?;
        let body = read_body(reader, length)?;
        let request = head.into_context(method, body);
        match &self.execution {
            Some(execution) => execution.run(route, request),
            None => route.invoke(&request).map_err(DispatchError::from),
        }
    }
}

impl ConnectionHandler for DispatchHandler {
    fn handle(&self, stream: TcpStream) {
        if let Err(error) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
            warn!(target: DISPATCH_TARGET, %error, "failed to set read timeout");
        }
        if stream_is_idle(&stream) {
            return;
        }
        let (path, outcome) = self.serve(&stream);
        let mut writer = ResponseWriter::new(&stream);
        let written = match outcome {
            Ok(reply) => {
                debug!(target: DISPATCH_TARGET, path = %path, status = reply.status(), "request served");
                writer.write_reply(&path, reply)
            }
            Err(error) => {
                log_failure(&path, &error);
                writer.write_error(&path, &error)
            }
        };
        if let Err(error) = written {
            warn!(target: DISPATCH_TARGET, %error, path = %path, "failed to write response");
        }
        close(&stream);
    }

    fn reject(&self, stream: TcpStream, error: &PoolError) {
        let failure = if error.is_saturation() {
            DispatchError::QueueFull
        } else {
            DispatchError::internal(error.to_string())
        };
        log_failure("", &failure);
        if let Err(write_error) = ResponseWriter::new(&stream).write_error("", &failure) {
            warn!(target: DISPATCH_TARGET, error = %write_error, "failed to write rejection");
        }
        close(&stream);
    }
}

/// A client that connects and closes without sending anything gets no reply.
fn stream_is_idle(stream: &TcpStream) -> bool {
    let mut peeked = [0_u8; 1];
    matches!(stream.peek(&mut peeked), Ok(0))
}

/// Half-closes the stream and discards unread request bytes that already
/// arrived, so closing does not reset the connection before the client reads
/// the response.
fn close(stream: &TcpStream) {
    if let Err(error) = stream.shutdown(Shutdown::Write) {
        debug!(target: DISPATCH_TARGET, %error, "failed to half-close connection");
    }
    if stream.set_nonblocking(true).is_ok() {
        let mut reader = stream.take(u64::try_from(MAX_BODY_BYTES).unwrap_or(u64::MAX));
        match io::copy(&mut reader, &mut io::sink()) {
            Ok(discarded) => debug!(target: DISPATCH_TARGET, discarded, "connection drained"),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {}
            Err(error) => debug!(target: DISPATCH_TARGET, %error, "failed to drain connection"),
        }
    }
}

fn log_failure(path: &str, error: &DispatchError) {
    let status = error.status();
    if status >= 500 {
        warn!(target: DISPATCH_TARGET, path, status, %error, "request failed");
    } else {
        debug!(target: DISPATCH_TARGET, path, status, %error, "request rejected");
    }
}
