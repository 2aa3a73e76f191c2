//! Unit tests for bootstrap, stop and launch.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::process::ExitCode;
use std::sync::Arc;

use rstest::rstest;
use summer_container::{Component, ComponentDefinition, ConfigurationRoot, Constructor, TypeCatalog};
use summer_web::{Controller, Reply, RouteSet};

use crate::bootstrap::{Application, BootstrapError, StaticConfigLoader, bootstrap_with, run};
use crate::shutdown::{ShutdownError, ShutdownSignal};
use crate::todo::{LoggingPostProcessor, TodoApplication};
use crate::{RunError, launch};

use super::support::{
    FailingConfigLoader, HealthEvent, HelpConfigLoader, RecordingHealthReporter, local_config,
};

struct Immediate;

impl ShutdownSignal for Immediate {
    fn wait(&self) -> Result<(), ShutdownError> {
        Ok(())
    }
}

fn get(addr: std::net::SocketAddr, target: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect");
    write!(stream, "GET {target} HTTP/1.1\r\nHost: test\r\n\r\n").expect("write");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read");
    response
}

#[rstest]
fn bootstrap_serves_the_sample_and_reports_health() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let mut running = bootstrap_with(
        &StaticConfigLoader::new(local_config()),
        reporter.clone(),
        TodoApplication::application(),
    )
    .expect("bootstrap should succeed");
    let addr = running.local_addr();

    let response = get(addr, "/api/health");
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.contains(r#""service":"todo-sample-app""#));

    let container = running.container_mut();
    for name in [
        "todoApplication",
        "clock",
        "todoService",
        "todoController",
        "loggingPostProcessor",
    ] {
        assert!(container.contains(name), "missing {name}");
    }
    let processor = container
        .resolve::<LoggingPostProcessor>()
        .expect("post-processor");
    assert!(processor.initialized() >= 3);

    running.stop().expect("stop");
    assert_eq!(
        reporter.events(),
        vec![
            HealthEvent::BootstrapStarting,
            HealthEvent::BootstrapSucceeded,
            HealthEvent::ServerListening(addr),
            HealthEvent::ServerStopped(addr),
        ]
    );
}

#[rstest]
fn configuration_failures_are_reported() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let Err(error) = bootstrap_with(
        &FailingConfigLoader,
        reporter.clone(),
        TodoApplication::application(),
    ) else {
        panic!("bootstrap should fail");
    };
    assert!(matches!(error, BootstrapError::Configuration { .. }));
    let events = reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert!(matches!(events.last(), Some(HealthEvent::BootstrapFailed(_))));
}

#[rstest]
fn applications_need_a_root() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let Err(error) = bootstrap_with(
        &StaticConfigLoader::new(local_config()),
        reporter,
        Application::new(TodoApplication::catalog()),
    ) else {
        panic!("bootstrap should fail");
    };
    assert!(matches!(error, BootstrapError::Container { .. }));
}

struct Clashing;

impl Component for Clashing {}

impl Controller for Clashing {
    fn routes(self: Arc<Self>, routes: &mut RouteSet) {
        routes
            .get("/twice", Vec::new(), |_| Ok(Reply::no_content()))
            .get("/twice", Vec::new(), |_| Ok(Reply::no_content()));
    }
}

struct ClashingRoot;

impl Component for ClashingRoot {}

fn clashing() -> ComponentDefinition {
    ComponentDefinition::builder::<Clashing>()
        .constructor(Constructor::nullary(|| Clashing))
        .implements::<dyn Controller>(|controller| controller)
        .build()
}

#[rstest]
fn illegal_routes_fail_bootstrap() {
    let root = ConfigurationRoot::new(
        ComponentDefinition::builder::<ClashingRoot>()
            .constructor(Constructor::nullary(|| ClashingRoot))
            .build(),
        module_path!(),
    );
    let application =
        Application::new(TypeCatalog::new().with(module_path!(), clashing)).root(root);
    let Err(error) = bootstrap_with(
        &StaticConfigLoader::new(local_config()),
        Arc::new(RecordingHealthReporter::default()),
        application,
    ) else {
        panic!("bootstrap should fail");
    };
    assert!(matches!(error, BootstrapError::Routing { .. }));
}

#[rstest]
fn run_stops_once_the_signal_fires() {
    run(
        &StaticConfigLoader::new(local_config()),
        Arc::new(RecordingHealthReporter::default()),
        TodoApplication::application(),
        &Immediate,
    )
    .expect("run should stop cleanly");
}

#[rstest]
fn run_surfaces_bootstrap_failures() {
    let error = run(
        &FailingConfigLoader,
        Arc::new(RecordingHealthReporter::default()),
        TodoApplication::application(),
        &Immediate,
    )
    .expect_err("run should fail");
    assert!(matches!(error, RunError::Bootstrap(_)));
}

#[rstest]
fn launch_prints_failures() {
    let mut stderr = Vec::new();
    let code = launch(&FailingConfigLoader, &Immediate, &mut stderr);
    assert_eq!(code, ExitCode::FAILURE);
    let message = String::from_utf8(stderr).expect("utf-8");
    assert!(message.starts_with("summer: failed to load configuration"), "{message}");
}

#[rstest]
fn launch_prints_help_and_succeeds() {
    let mut stderr = Vec::new();
    let code = launch(&HelpConfigLoader, &Immediate, &mut stderr);
    assert_eq!(code, ExitCode::SUCCESS);
    let message = String::from_utf8(stderr).expect("utf-8");
    assert!(message.contains("--max-concurrent-requests"), "{message}");
    assert!(!message.starts_with("summer:"), "{message}");
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
        Err(std::io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[rstest]
fn unwritable_help_is_a_failure() {
    let code = launch(&HelpConfigLoader, &Immediate, &mut BrokenPipe);
    assert_eq!(code, ExitCode::FAILURE);
}
