//! HTTP dispatch for the Summer runtime.
//!
//! Controllers registered in a [`summer_container::Container`] declare their
//! handlers against a [`RouteSet`]; [`Router::build_from`] collects them into
//! an immutable table. [`DispatchServer`] serves that table over HTTP/1.1,
//! one request per connection, behind an admission guard and tunable worker
//! pools. Responses are wrapped in a JSON envelope produced by the
//! hand-written codec re-exported as [`json`].

pub mod binder;
pub mod concurrency;
pub mod dispatch;
mod reply;
mod request;
pub mod routing;
mod server;
mod transport;

pub use summer_json as json;

pub use binder::{BindError, FromJson, bind, coerce};
pub use dispatch::{DispatchError, ResponseWriter, envelope};
pub use reply::{HandlerError, Reply};
pub use request::{HttpMethod, RequestContext};
pub use routing::{Arguments, Controller, Param, RouteSet, Router, RouterError};
pub use server::{DispatchServer, ServerHandle};
pub use transport::{ConnectionHandler, ListenerError};
