//! Application bootstrap orchestration.
//!
//! Bootstrap loads configuration, installs telemetry, builds the container
//! from an [`Application`]'s configuration roots, collects the route table
//! and starts the dispatch server. [`RunningApplication::stop`] undoes the
//! last two steps in reverse: server first, then the container.

use std::net::SocketAddr;
use std::sync::Arc;

use summer_config::{Config, ConfigError};
use summer_container::{ConfigurationRoot, Container, ContainerError, TypeCatalog};
use summer_web::{DispatchServer, ListenerError, Router, RouterError, ServerHandle};
use thiserror::Error;
use tracing::warn;

use crate::health::HealthReporter;
use crate::shutdown::{ShutdownError, ShutdownSignal};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a source is unreadable or invalid.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load()
    }
}

/// Loader returning a configuration resolved ahead of time.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.config.clone())
    }
}

/// The component graph an application is built from.
#[derive(Debug)]
pub struct Application {
    catalog: TypeCatalog,
    roots: Vec<ConfigurationRoot>,
}

impl Application {
    /// Starts an application whose roots scan `catalog`.
    #[must_use]
    pub fn new(catalog: TypeCatalog) -> Self {
        Self {
            catalog,
            roots: Vec::new(),
        }
    }

    /// Adds a configuration root.
    #[must_use]
    pub fn root(mut self, root: ConfigurationRoot) -> Self {
        self.roots.push(root);
        self
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The component graph could not be built.
    #[error("failed to build the component container: {source}")]
    Container {
        /// Underlying container error.
        #[source]
        source: ContainerError,
    },
    /// A controller declared an illegal route.
    #[error("failed to build the route table: {source}")]
    Routing {
        /// Underlying router error.
        #[source]
        source: RouterError,
    },
    /// The dispatch server could not bind or start.
    #[error("failed to start the dispatch server: {source}")]
    Server {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
}

/// Errors surfaced while stopping a running application.
#[derive(Debug, Error)]
pub enum StopError {
    /// The accept thread did not stop cleanly.
    #[error("failed to stop the dispatch server: {source}")]
    Server {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// One or more components failed to dispose.
    #[error("failed to close the component container: {source}")]
    Container {
        /// Underlying container error.
        #[source]
        source: ContainerError,
    },
}

/// Errors surfaced by [`run`].
#[derive(Debug, Error)]
pub enum RunError {
    /// Bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Waiting for the shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// Graceful stop failed.
    #[error(transparent)]
    Stop(#[from] StopError),
}

/// Result of a successful bootstrap: a refreshed container and a listening
/// server.
pub struct RunningApplication {
    config: Config,
    local_addr: SocketAddr,
    server: Option<ServerHandle>,
    container: Container,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl RunningApplication {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The address the server accepts connections on.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The application's container, for resolving components directly.
    pub const fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Stops the server, then closes the container.
    ///
    /// # Errors
    ///
    /// Returns the server failure if there was one, otherwise the container
    /// teardown failure. The container is closed in either case.
    pub fn stop(mut self) -> Result<(), StopError> {
        self.stop_inner()
    }

    fn stop_inner(&mut self) -> Result<(), StopError> {
        let Some(server) = self.server.take() else {
            return Ok(());
        };
        let stopped = server
            .stop()
            .map_err(|source| StopError::Server { source });
        let closed = self
            .container
            .close()
            .map_err(|source| StopError::Container { source });
        self.reporter.server_stopped(self.local_addr);
        match (stopped, closed) {
            (Err(error), Err(close_error)) => {
                warn!(target: BOOTSTRAP_TARGET, error = %close_error, "container teardown failed");
                Err(error)
            }
            (Err(error), Ok(())) | (Ok(()), Err(error)) => Err(error),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

impl Drop for RunningApplication {
    fn drop(&mut self) {
        if let Err(error) = self.stop_inner() {
            warn!(target: BOOTSTRAP_TARGET, %error, "application did not stop cleanly");
        }
    }
}

/// Bootstraps `application` using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first step that fails; the reporter
/// sees the same error.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    application: Application,
) -> Result<RunningApplication, BootstrapError> {
    reporter.bootstrap_starting();
    match start(loader, &reporter, application) {
        Ok(running) => {
            reporter.bootstrap_succeeded(&running.config);
            reporter.server_listening(running.local_addr);
            Ok(running)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn start(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn HealthReporter>,
    application: Application,
) -> Result<RunningApplication, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let mut container = Container::bootstrap(&application.catalog, application.roots)
        .map_err(|source| BootstrapError::Container { source })?;

    let server = match serve(&config, &mut container) {
        Ok(server) => server,
        Err(error) => {
            if let Err(close_error) = container.close() {
                warn!(target: BOOTSTRAP_TARGET, error = %close_error, "container teardown failed");
            }
            return Err(error);
        }
    };

    Ok(RunningApplication {
        local_addr: server.local_addr(),
        config,
        server: Some(server),
        container,
        telemetry,
        reporter: Arc::clone(reporter),
    })
}

fn serve(config: &Config, container: &mut Container) -> Result<ServerHandle, BootstrapError> {
    let router =
        Router::build_from(container).map_err(|source| BootstrapError::Routing { source })?;
    DispatchServer::bind(config.host(), config.port(), Arc::new(router), *config.tuning())
        .and_then(DispatchServer::start)
        .map_err(|source| BootstrapError::Server { source })
}

/// Bootstraps `application`, blocks until `shutdown` fires, then stops it.
///
/// # Errors
///
/// Returns [`RunError`] when bootstrap, signal handling or stop fails. A
/// failed signal wait still stops the application.
pub fn run(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    application: Application,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), RunError> {
    let running = bootstrap_with(loader, reporter, application)?;
    let waited = shutdown.wait();
    running.stop()?;
    waited.map_err(RunError::from)
}
