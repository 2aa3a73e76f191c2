//! Error types raised by the component container.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error returned by component lifecycle hooks.
pub type HookError = Box<dyn StdError + Send + Sync>;

/// Lifecycle step during which a component hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecyclePhase {
    /// Running the component's initialization hook.
    Initialization,
    /// Running a post-processor hook before initialization.
    BeforeInitialization,
    /// Running a post-processor hook after initialization.
    AfterInitialization,
    /// Running the component's disposal hook.
    Destruction,
}

/// A disposal hook failure recorded during [`crate::Container::close`].
#[derive(Debug)]
pub struct DisposalFailure {
    /// Name of the component whose disposal hook failed.
    pub name: String,
    /// Error returned by the hook.
    pub source: HookError,
}

/// Errors surfaced while registering, creating or disposing components.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Two definitions share the same name.
    #[error("duplicate component name detected: {name}")]
    DuplicateName {
        /// The clashing name.
        name: String,
    },
    /// No definition carries the requested name.
    #[error("no component named '{name}' is defined")]
    NotDefined {
        /// The requested name.
        name: String,
    },
    /// No definition is assignable to the requested type.
    #[error("no component of type {type_name} is defined")]
    NoMatchingType {
        /// The requested type.
        type_name: &'static str,
    },
    /// Several definitions are assignable to the requested type.
    #[error(
        "expected a single component of type {type_name} but found {}: {}",
        .candidates.len(),
        .candidates.join(", ")
    )]
    AmbiguousType {
        /// The requested type.
        type_name: &'static str,
        /// Names of every matching definition, in declaration order.
        candidates: Vec<String>,
    },
    /// A component depends on itself, directly or transitively.
    #[error("circular dependency detected while creating '{name}': {}", .chain.join(" -> "))]
    CircularDependency {
        /// The component that was requested while already in construction.
        name: String,
        /// Creation chain, ending with the re-entered component.
        chain: Vec<String>,
    },
    /// No constructor can be selected for a directly constructed component.
    #[error("no suitable constructor for {type_name}: {reason}")]
    NoSuitableConstructor {
        /// The component type.
        type_name: &'static str,
        /// Why selection failed.
        reason: &'static str,
    },
    /// A scope string names neither `singleton` nor `prototype`.
    #[error("unsupported scope: {value}")]
    UnsupportedScope {
        /// The declared scope value.
        value: String,
    },
    /// A named component cannot be viewed as the requested type.
    #[error("component '{name}' is not assignable to {expected}")]
    TypeMismatch {
        /// The component name.
        name: String,
        /// The requested type.
        expected: &'static str,
    },
    /// A fallible constructor or factory method returned an error.
    #[error("failed to construct {type_name}: {source}")]
    Construction {
        /// The component type.
        type_name: &'static str,
        /// Error returned by the constructor.
        #[source]
        source: HookError,
    },
    /// A lifecycle hook returned an error.
    #[error("component '{name}' failed during {phase}: {source}")]
    Lifecycle {
        /// The component name.
        name: String,
        /// The failing lifecycle step.
        phase: LifecyclePhase,
        /// Error returned by the hook.
        #[source]
        source: HookError,
    },
    /// Bootstrap was attempted without a configuration root.
    #[error("at least one configuration root is required")]
    NoConfigurationRoot,
    /// One or more disposal hooks failed while closing the container.
    #[error(
        "{} component(s) failed to dispose: {}",
        .failures.len(),
        .failures.iter().map(|failure| failure.name.as_str()).collect::<Vec<_>>().join(", ")
    )]
    Teardown {
        /// Every disposal failure, in disposal order.
        failures: Vec<DisposalFailure>,
    },
    /// The container has been closed.
    #[error("container is closed")]
    Closed,
}

impl ContainerError {
    pub(crate) fn not_defined(name: impl Into<String>) -> Self {
        Self::NotDefined { name: name.into() }
    }

    pub(crate) fn type_mismatch(name: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected,
        }
    }

    pub(crate) fn lifecycle(name: &str, phase: LifecyclePhase, source: HookError) -> Self {
        Self::Lifecycle {
            name: name.to_owned(),
            phase,
            source,
        }
    }
}
