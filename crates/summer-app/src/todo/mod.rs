//! The todo sample application.
//!
//! [`TodoApplication`] is the configuration root: it scans this module for
//! the store, the controller and the logging post-processor, and produces the
//! [`Clock`] through its `clock` factory method.

mod clock;
mod controller;
mod logging;
mod service;

use summer_container::{
    Component, ComponentDefinition, ConfigurationRoot, Constructor, TypeCatalog,
};

pub use self::clock::{Clock, SystemClock};
pub use self::controller::TodoController;
pub use self::logging::LoggingPostProcessor;
pub use self::service::{TodoItem, TodoService};

use crate::bootstrap::Application;

const TODO_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::todo");

/// Configuration root of the todo sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct TodoApplication;

impl Component for TodoApplication {}

impl TodoApplication {
    /// The root with its factory methods; scans its own module.
    #[must_use]
    pub fn root() -> ConfigurationRoot {
        let definition = ComponentDefinition::builder::<Self>()
            .constructor(Constructor::nullary(|| Self))
            .build();
        ConfigurationRoot::new(definition, module_path!()).factory(
            ComponentDefinition::factory_method::<Self, SystemClock, (), _>("clock", |_, ()| {
                SystemClock
            })
            .implements::<dyn Clock>(|clock| clock)
            .build(),
        )
    }

    /// Every component type of the sample, keyed by its module.
    #[must_use]
    pub fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with(concat!(module_path!(), "::service"), service::definition)
            .with(concat!(module_path!(), "::controller"), controller::definition)
            .with(concat!(module_path!(), "::logging"), logging::definition)
    }

    /// The sample as a bootstrappable application.
    #[must_use]
    pub fn application() -> Application {
        Application::new(Self::catalog()).root(Self::root())
    }
}
