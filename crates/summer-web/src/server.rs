//! The dispatch server: listener, transport pool, optional route pool and
//! admission guard wired around a [`Router`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use summer_config::ServerTuning;
use tracing::{info, warn};

use crate::concurrency::{OverloadGuard, PoolSettings, WorkerPool};
use crate::dispatch::{DispatchHandler, RouteExecution};
use crate::routing::Router;
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

/// Tracing target for server lifecycle events.
const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Time each pool gets to finish its work on stop.
const DRAIN_GRACE: Duration = Duration::from_secs(3);

const TRANSPORT_POOL: &str = "summer-http";
const ROUTE_POOL: &str = "summer-route";

/// A bound, not yet accepting, dispatch server.
#[derive(Debug)]
pub struct DispatchServer {
    listener: SocketListener,
    router: Arc<Router>,
    tuning: ServerTuning,
}

impl DispatchServer {
    /// Binds `host:port` with the tuning's backlog. Port `0` picks a free
    /// port; see [`DispatchServer::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the address cannot be resolved or bound.
    pub fn bind(
        host: &str,
        port: u16,
        router: Arc<Router>,
        tuning: ServerTuning,
    ) -> Result<Self, ListenerError> {
        let listener = SocketListener::bind(host, port, tuning.socket_backlog())?;
        Ok(Self {
            listener,
            router,
            tuning,
        })
    }

    /// The bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Creates the pools and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the accept thread cannot start.
    pub fn start(self) -> Result<ServerHandle, ListenerError> {
        let Self {
            listener,
            router,
            tuning,
        } = self;
        let local_addr = listener.local_addr();
        let settings = PoolSettings::from_tuning(&tuning);
        let transport_pool = WorkerPool::new(TRANSPORT_POOL, settings);
        let route_pool = tuning
            .request_timeout()
            .map(|timeout| (WorkerPool::new(ROUTE_POOL, settings), timeout));
        let execution = route_pool
            .as_ref()
            .map(|(pool, timeout)| RouteExecution::new(pool.clone(), *timeout));

        let handler = Arc::new(DispatchHandler::new(
            Arc::clone(&router),
            OverloadGuard::new(tuning.max_concurrent_requests()),
            execution,
        ));
        let listener = listener.start(handler, transport_pool.clone())?;

        info!(
            target: SERVER_TARGET,
            address = %local_addr,
            core_threads = tuning.core_threads(),
            max_threads = tuning.max_threads(),
            queue_capacity = tuning.queue_capacity(),
            keep_alive_seconds = tuning.keep_alive_seconds(),
            max_concurrent_requests = tuning.max_concurrent_requests(),
            request_timeout_millis = tuning.request_timeout_millis(),
            socket_backlog = tuning.socket_backlog(),
            rejection_policy = %tuning.rejection_policy(),
            "dispatch server started"
        );
        for route in router.routes() {
            info!(
                target: SERVER_TARGET,
                route = %route,
                controller = route.controller(),
                "mapped route"
            );
        }

        Ok(ServerHandle {
            local_addr,
            listener: Some(listener),
            route_pool: route_pool.map(|(pool, _)| pool),
            transport_pool,
        })
    }
}

/// A running server. Dropping the handle stops it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    listener: Option<ListenerHandle>,
    route_pool: Option<WorkerPool>,
    transport_pool: WorkerPool,
}

impl ServerHandle {
    /// The address clients connect to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, then drains the route pool and the transport pool,
    /// each for up to three seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the accept thread panicked;
    /// the pools are drained regardless.
    pub fn stop(mut self) -> Result<(), ListenerError> {
        self.stop_inner()
    }

    fn stop_inner(&mut self) -> Result<(), ListenerError> {
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        listener.shutdown();
        let joined = listener.join();
        let route_drained = self
            .route_pool
            .as_ref()
            .is_none_or(|pool| pool.drain(DRAIN_GRACE));
        let transport_drained = self.transport_pool.drain(DRAIN_GRACE);
        info!(
            target: SERVER_TARGET,
            address = %self.local_addr,
            route_drained,
            transport_drained,
            "dispatch server stopped"
        );
        joined
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Err(error) = self.stop_inner() {
            warn!(target: SERVER_TARGET, %error, "dispatch server stopped uncleanly");
        }
    }
}
