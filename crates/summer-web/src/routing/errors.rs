//! Route table construction failures.

use summer_container::ContainerError;
use thiserror::Error;

/// Illegal route declarations, detected while the router is built.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A parameter declares no binding kind.
    #[error("parameter '{parameter}' of {route} declares no binding kind")]
    MissingBindingKind {
        /// Route in `METHOD /path` form.
        route: String,
        /// Parameter name.
        parameter: String,
    },
    /// A parameter declares more than one binding kind.
    #[error("parameter '{parameter}' of {route} declares several binding kinds")]
    MultipleBindingKinds {
        /// Route in `METHOD /path` form.
        route: String,
        /// Parameter name.
        parameter: String,
    },
    /// More than one parameter binds the body.
    #[error("{route} binds the request body more than once")]
    MultipleBodies {
        /// Route in `METHOD /path` form.
        route: String,
    },
    /// A body parameter has a sequence type.
    #[error("body parameter '{parameter}' of {route} cannot be a sequence")]
    CollectionBody {
        /// Route in `METHOD /path` form.
        route: String,
        /// Parameter name.
        parameter: String,
    },
    /// A path variable parameter has a sequence type.
    #[error("path variable '{parameter}' of {route} cannot be a sequence")]
    CollectionPathVariable {
        /// Route in `METHOD /path` form.
        route: String,
        /// Parameter name.
        parameter: String,
    },
    /// A path variable parameter names a variable the template lacks.
    #[error("path variable '{variable}' is not present in route template {route}")]
    UnknownPathVariable {
        /// Route in `METHOD /path` form.
        route: String,
        /// Requested variable.
        variable: String,
    },
    /// A template repeats a variable name.
    #[error("route template {path} repeats variable '{variable}'")]
    DuplicateTemplateVariable {
        /// Normalized template.
        path: String,
        /// Repeated name.
        variable: String,
    },
    /// Two handlers claim the same method and path shape.
    #[error("duplicate route {route} declared by '{controller}'")]
    DuplicateRoute {
        /// Route in `METHOD /path` form.
        route: String,
        /// Controller declaring the second handler.
        controller: String,
    },
    /// Controllers could not be resolved from the container.
    #[error(transparent)]
    Container(#[from] ContainerError),
}
