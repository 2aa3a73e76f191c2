//! Route registration, matching and handler invocation.
//!
//! Controllers declare handlers against a [`RouteSet`]; the [`Router`]
//! classifies every parameter once, when the table is built, so illegal
//! declarations fail at startup instead of on the first request.

mod errors;
mod params;
mod path;
mod route;
mod router;

pub use self::errors::RouterError;
pub use self::params::{Argument, Arguments, BindingKind, Param};
pub use self::path::{PathTemplate, PathVariables, join, normalize, segments};
pub use self::route::{Controller, Handler, RouteDefinition, RouteSet};
pub use self::router::{RouteMatch, Router};

/// Tracing target for route table events.
pub(crate) const ROUTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::router");
