//! Controllers, their handler declarations and validated route definitions.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::concurrency::panic_message;
use crate::{HandlerError, HttpMethod, Reply, RequestContext};

use super::params::{Arguments, BindingKind, Param, ParameterBinding};
use super::path::{PathTemplate, PathVariables, join};
use super::RouterError;

/// Handler body shared by every request matched to a route.
pub type Handler = Arc<dyn Fn(Arguments) -> Result<Reply, HandlerError> + Send + Sync>;

/// A component that contributes routes.
///
/// Register controllers in the container with the `dyn Controller`
/// capability; [`Router::build_from`](super::Router::build_from) collects
/// them in declaration order.
pub trait Controller: Send + Sync {
    /// Prefix joined in front of every handler path.
    fn base_path(&self) -> &str {
        ""
    }

    /// Declares this controller's handlers.
    fn routes(self: Arc<Self>, routes: &mut RouteSet);
}

pub(crate) struct RouteDeclaration {
    pub(crate) method: HttpMethod,
    pub(crate) path: String,
    pub(crate) params: Vec<Param>,
    pub(crate) handler: Handler,
}

/// Handler declarations collected from one controller.
pub struct RouteSet {
    base_path: String,
    declarations: Vec<RouteDeclaration>,
}

impl RouteSet {
    pub(crate) fn new(base_path: &str) -> Self {
        Self {
            base_path: base_path.to_owned(),
            declarations: Vec::new(),
        }
    }

    /// Declares a handler for `method` at `path`, relative to the base path.
    pub fn route<F>(
        &mut self,
        method: HttpMethod,
        path: &str,
        params: Vec<Param>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Arguments) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.declarations.push(RouteDeclaration {
            method,
            path: join(&self.base_path, path),
            params,
            handler: Arc::new(handler),
        });
        self
    }

    /// Declares a `GET` handler.
    pub fn get<F>(&mut self, path: &str, params: Vec<Param>, handler: F) -> &mut Self
    where
        F: Fn(Arguments) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Get, path, params, handler)
    }

    /// Declares a `POST` handler.
    pub fn post<F>(&mut self, path: &str, params: Vec<Param>, handler: F) -> &mut Self
    where
        F: Fn(Arguments) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Post, path, params, handler)
    }

    /// Declares a `PUT` handler.
    pub fn put<F>(&mut self, path: &str, params: Vec<Param>, handler: F) -> &mut Self
    where
        F: Fn(Arguments) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Put, path, params, handler)
    }

    /// Declares a `PATCH` handler.
    pub fn patch<F>(&mut self, path: &str, params: Vec<Param>, handler: F) -> &mut Self
    where
        F: Fn(Arguments) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Patch, path, params, handler)
    }

    /// Declares a `DELETE` handler.
    pub fn delete<F>(&mut self, path: &str, params: Vec<Param>, handler: F) -> &mut Self
    where
        F: Fn(Arguments) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Delete, path, params, handler)
    }

    pub(crate) fn into_declarations(self) -> Vec<RouteDeclaration> {
        self.declarations
    }
}

/// A route with its parameters classified and validated.
pub struct RouteDefinition {
    method: HttpMethod,
    template: PathTemplate,
    controller: String,
    bindings: Vec<ParameterBinding>,
    handler: Handler,
}

impl RouteDefinition {
    pub(crate) fn new(
        controller: &str,
        declaration: RouteDeclaration,
    ) -> Result<Self, RouterError> {
        let RouteDeclaration {
            method,
            path,
            params,
            handler,
        } = declaration;
        let template = PathTemplate::parse(&path)?;
        let route = format!("{method} {template}");

        let mut bindings = Vec::with_capacity(params.len());
        let mut bodies = 0_usize;
        for param in params {
            let kind = match param.kinds() {
                [] => {
                    return Err(RouterError::MissingBindingKind {
                        route,
                        parameter: param.name().to_owned(),
                    });
                }
                [kind] => *kind,
                _ => {
                    return Err(RouterError::MultipleBindingKinds {
                        route,
                        parameter: param.name().to_owned(),
                    });
                }
            };
            match kind {
                BindingKind::Body => {
                    bodies += 1;
                    if bodies > 1 {
                        return Err(RouterError::MultipleBodies { route });
                    }
                    if param.is_sequence() {
                        return Err(RouterError::CollectionBody {
                            route,
                            parameter: param.name().to_owned(),
                        });
                    }
                }
                BindingKind::PathVariable => {
                    if param.is_sequence() {
                        return Err(RouterError::CollectionPathVariable {
                            route,
                            parameter: param.name().to_owned(),
                        });
                    }
                    if !template.has_variable(param.key()) {
                        return Err(RouterError::UnknownPathVariable {
                            route,
                            variable: param.key().to_owned(),
                        });
                    }
                }
                BindingKind::Query | BindingKind::Header => {}
            }
            bindings.push(param.into_binding(kind));
        }

        Ok(Self {
            method,
            template,
            controller: controller.to_owned(),
            bindings,
            handler,
        })
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Normalized path template.
    #[must_use]
    pub fn path(&self) -> &str {
        self.template.as_str()
    }

    /// Name of the declaring controller component.
    #[must_use]
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Parameter count.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.bindings.len()
    }

    pub(crate) fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Binds every parameter, then runs the handler. A panicking handler
    /// yields [`HandlerError::Internal`] with the panic message.
    pub(crate) fn invoke(
        &self,
        request: &RequestContext,
        variables: &PathVariables,
    ) -> Result<Reply, HandlerError> {
        let arguments = self
            .bindings
            .iter()
            .map(|binding| binding.bind(request, variables))
            .collect::<Result<Vec<_>, _>>()?;
        catch_unwind(AssertUnwindSafe(|| (self.handler)(Arguments::new(arguments))))
            .unwrap_or_else(|payload| Err(HandlerError::internal(panic_message(payload.as_ref()))))
    }
}

impl fmt::Display for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.template.as_str())
            .field("controller", &self.controller)
            .field(
                "parameters",
                &self
                    .bindings
                    .iter()
                    .map(|binding| format!("{}:{}:{}", binding.kind(), binding.key(), binding.target()))
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
