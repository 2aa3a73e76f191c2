//! Component container for the Summer runtime.
//!
//! Components are described by [`ComponentDefinition`]s carrying typed
//! constructor closures and declared capabilities, registered in a
//! [`Container`] either directly or through [`ConfigurationRoot`]s that scan a
//! [`TypeCatalog`]. `refresh` creates post-processors first, then every
//! singleton; dependencies are resolved by type, with circular dependencies
//! among components under construction reported as errors.

mod catalog;
mod component;
mod container;
mod definition;
mod errors;
mod registry;
mod scope;

pub use catalog::{ConfigurationRoot, TypeCatalog};
pub use component::{Component, ComponentPostProcessor, Instance, TypeInfo};
pub use container::{Container, Resolver};
pub use definition::{
    ComponentDefinition, Constructor, DefinitionBuilder, Dependencies, Origin, decapitalize,
};
pub use errors::{ContainerError, DisposalFailure, HookError, LifecyclePhase};
pub use registry::ComponentRegistry;
pub use scope::Scope;

/// Tracing target for container lifecycle events.
pub(crate) const CONTAINER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::container");
