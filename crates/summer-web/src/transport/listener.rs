//! TCP listener with a non-blocking accept loop feeding the transport pool.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use crate::concurrency::{PoolError, WorkerPool};

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to a TCP address.
#[derive(Debug)]
pub(crate) struct SocketListener {
    addr: SocketAddr,
    listener: TcpListener,
}

impl SocketListener {
    pub(crate) fn bind(host: &str, port: u16, backlog: u32) -> Result<Self, ListenerError> {
        let listener = bind_tcp(host, port, backlog)?;
        let addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Resolve {
                host: host.to_owned(),
                port,
                source,
            })?;
        Ok(Self { addr, listener })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Starts the accept loop. Each connection runs on `pool`; a connection
    /// the pool refuses, evicts or drops is answered by the handler's
    /// rejection path on whichever thread lets go of it.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        pool: WorkerPool,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("summer-accept".to_owned())
            .spawn(move || run_accept_loop(&self, &shutdown_flag, &handler, &pool))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        self.handle.take().map_or(Ok(()), |handle| {
            handle.join().map_err(|_| ListenerError::ThreadPanic)
        })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn ConnectionHandler>,
    pool: &WorkerPool,
) {
    info!(
        target: LISTENER_TARGET,
        address = %listener.addr,
        "socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(listener) {
            Ok(Some(stream)) => {
                last_error = None;
                dispatch_connection(stream, handler, pool);
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: LISTENER_TARGET, address = %listener.addr, "socket listener stopped");
}

fn dispatch_connection(stream: TcpStream, handler: &Arc<dyn ConnectionHandler>, pool: &WorkerPool) {
    let connection = QueuedConnection::new(stream, Arc::clone(handler), pool.name());
    if let Err(error) = pool.execute(move || connection.serve()) {
        debug!(
            target: LISTENER_TARGET,
            error = %error,
            "transport pool refused connection"
        );
    }
}

/// A connection waiting for a transport worker.
///
/// Dropping it before [`QueuedConnection::serve`] runs (pool refusal,
/// `discard-oldest` eviction or a forced drain) answers the client through
/// [`ConnectionHandler::reject`].
struct QueuedConnection {
    stream: Option<TcpStream>,
    handler: Arc<dyn ConnectionHandler>,
    pool: String,
}

impl QueuedConnection {
    fn new(stream: TcpStream, handler: Arc<dyn ConnectionHandler>, pool: &str) -> Self {
        Self {
            stream: Some(stream),
            handler,
            pool: pool.to_owned(),
        }
    }

    fn serve(mut self) {
        if let Some(stream) = self.stream.take() {
            self.handler.handle(stream);
        }
    }
}

impl Drop for QueuedConnection {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let error = PoolError::Discarded {
                pool: std::mem::take(&mut self.pool),
            };
            self.handler.reject(stream, &error);
        }
    }
}

fn accept_connection(listener: &SocketListener) -> Result<Option<TcpStream>, io::Error> {
    match listener.listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_tcp(host: &str, port: u16, backlog: u32) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|source| ListenerError::Socket { addr, source })?;
    socket
        .set_reuse_address(true)
        .map_err(|source| ListenerError::Socket { addr, source })?;
    socket
        .bind(&addr.into())
        .map_err(|source| ListenerError::BindTcp { addr, source })?;
    socket
        .listen(i32::try_from(backlog).unwrap_or(i32::MAX))
        .map_err(|source| ListenerError::Listen {
            addr,
            backlog,
            source,
        })?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use summer_config::RejectionPolicy;

    use super::*;
    use crate::concurrency::PoolSettings;

    #[derive(Default)]
    struct CountingHandler {
        count: Arc<AtomicUsize>,
        rejected: Arc<AtomicUsize>,
    }

    impl ConnectionHandler for CountingHandler {
        fn handle(&self, _stream: TcpStream) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }

        fn reject(&self, _stream: TcpStream, error: &PoolError) {
            assert!(error.is_saturation(), "unexpected rejection: {error}");
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn connected_stream() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let client = TcpStream::connect(listener.local_addr().expect("addr")).expect("connect");
        let (server, _) = listener.accept().expect("accept");
        (client, server)
    }

    fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if count.load(Ordering::SeqCst) >= expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn tcp_listener_accepts_connections() {
        let listener = SocketListener::bind("127.0.0.1", 0, 16).expect("bind tcp listener");
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(CountingHandler {
            count: Arc::clone(&count),
            ..CountingHandler::default()
        });
        let pool = WorkerPool::new(
            "listener-test",
            PoolSettings {
                core_threads: 1,
                max_threads: 2,
                queue_capacity: 8,
                keep_alive: Duration::ZERO,
                rejection_policy: RejectionPolicy::CallerRuns,
            },
        );
        let handle = listener
            .start(handler, pool.clone())
            .expect("start listener");

        TcpStream::connect(addr).expect("connect first client");
        TcpStream::connect(addr).expect("connect second client");

        assert!(wait_for_count(&count, 2), "expected two connections");
        handle.shutdown();
        handle.join().expect("join listener");
        pool.shutdown();
    }

    #[test]
    fn served_connections_are_not_rejected() {
        let handler = Arc::new(CountingHandler::default());
        let (_client, server) = connected_stream();
        QueuedConnection::new(server, handler.clone(), "transport").serve();
        assert_eq!(handler.count.load(Ordering::SeqCst), 1);
        assert_eq!(handler.rejected.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_connections_are_rejected() {
        let handler = Arc::new(CountingHandler::default());
        let (_client, server) = connected_stream();
        drop(QueuedConnection::new(server, handler.clone(), "transport"));
        assert_eq!(handler.count.load(Ordering::SeqCst), 0);
        assert_eq!(handler.rejected.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forced_drain_rejects_queued_connections() {
        let handler: Arc<CountingHandler> = Arc::new(CountingHandler::default());
        let pool = WorkerPool::new(
            "drain-test",
            PoolSettings {
                core_threads: 1,
                max_threads: 1,
                queue_capacity: 4,
                keep_alive: Duration::ZERO,
                rejection_policy: RejectionPolicy::Abort,
            },
        );
        let (release, blocked) = std::sync::mpsc::channel::<()>();
        let (started, entered) = std::sync::mpsc::channel::<()>();
        pool.execute(move || {
            started.send(()).expect("signal start");
            blocked.recv().unwrap_or_default();
        })
        .expect("blocking task");
        entered.recv().expect("worker busy");

        let (_client, server) = connected_stream();
        let dynamic: Arc<dyn ConnectionHandler> = handler.clone();
        dispatch_connection(server, &dynamic, &pool);
        assert_eq!(pool.queued(), 1);

        assert_eq!(pool.shutdown_now(), 1);
        assert_eq!(handler.rejected.load(Ordering::SeqCst), 1);
        release.send(()).expect("release");
        assert!(pool.await_termination(Duration::from_secs(2)));
        assert_eq!(handler.count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejects_unresolvable_hosts() {
        let error = SocketListener::bind("host.invalid.", 0, 16).expect_err("resolve");
        assert!(matches!(
            error,
            ListenerError::Resolve { .. } | ListenerError::ResolveEmpty { .. }
        ));
    }
}
