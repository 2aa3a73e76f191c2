//! The route table and request matching.

use std::any::TypeId;
use std::sync::Arc;

use summer_container::Container;
use tracing::{debug, info};

use crate::{HandlerError, HttpMethod, Reply, RequestContext};

use super::path::{PathVariables, normalize, segments};
use super::route::{Controller, RouteDefinition, RouteSet};
use super::{ROUTER_TARGET, RouterError};

/// A matched route and the template variables it captured.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    route: Arc<RouteDefinition>,
    variables: PathVariables,
}

impl RouteMatch {
    /// The matched route.
    #[must_use]
    pub fn route(&self) -> &RouteDefinition {
        &self.route
    }

    /// Captured variables, raw.
    #[must_use]
    pub const fn variables(&self) -> &PathVariables {
        &self.variables
    }

    /// Binds arguments from `request` and runs the handler.
    ///
    /// # Errors
    ///
    /// Binding failures are [`HandlerError::BadRequest`]; handler errors
    /// propagate unchanged; a handler panic becomes
    /// [`HandlerError::Internal`].
    pub fn invoke(&self, request: &RequestContext) -> Result<Reply, HandlerError> {
        self.route.invoke(request, &self.variables)
    }
}

/// Ordered route table; the first matching route wins.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Arc<RouteDefinition>>,
}

impl Router {
    /// Collects every component registered with the `dyn Controller`
    /// capability, in declaration order, and builds its routes.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] for illegal declarations and
    /// [`RouterError::Container`] when a controller cannot be resolved.
    pub fn build_from(container: &mut Container) -> Result<Self, RouterError> {
        let capability = TypeId::of::<dyn Controller>();
        let names: Vec<String> = container
            .names()
            .into_iter()
            .filter(|name| {
                container
                    .definition(name)
                    .is_some_and(|definition| definition.is_assignable_to(capability))
            })
            .map(str::to_owned)
            .collect();

        let mut controllers = Vec::with_capacity(names.len());
        for name in names {
            let controller = container.resolve_named::<dyn Controller>(&name)?;
            controllers.push((name, controller));
        }
        Self::from_controllers(controllers)
    }

    /// Builds a table from already resolved controllers.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] for illegal declarations.
    pub fn from_controllers<I>(controllers: I) -> Result<Self, RouterError>
    where
        I: IntoIterator<Item = (String, Arc<dyn Controller>)>,
    {
        let mut router = Self::default();
        for (name, controller) in controllers {
            let mut routes = RouteSet::new(controller.base_path());
            Arc::clone(&controller).routes(&mut routes);
            for declaration in routes.into_declarations() {
                router.add(RouteDefinition::new(&name, declaration)?)?;
            }
        }
        info!(
            target: ROUTER_TARGET,
            routes = router.routes.len(),
            "route table built"
        );
        Ok(router)
    }

    fn add(&mut self, route: RouteDefinition) -> Result<(), RouterError> {
        let clash = self.routes.iter().any(|existing| {
            existing.method() == route.method() && existing.template().overlaps(route.template())
        });
        if clash {
            return Err(RouterError::DuplicateRoute {
                route: route.to_string(),
                controller: route.controller().to_owned(),
            });
        }
        info!(
            target: ROUTER_TARGET,
            method = %route.method(),
            path = route.path(),
            controller = route.controller(),
            parameters = route.arity(),
            "route registered"
        );
        self.routes.push(Arc::new(route));
        Ok(())
    }

    /// Finds the first route with `method` whose template matches `path`.
    #[must_use]
    pub fn resolve(&self, method: HttpMethod, path: &str) -> Option<RouteMatch> {
        let normalized = normalize(path);
        let requested = segments(&normalized);
        let found = self.routes.iter().find_map(|route| {
            (route.method() == method)
                .then(|| route.template().matches(&requested))
                .flatten()
                .map(|variables| RouteMatch {
                    route: Arc::clone(route),
                    variables,
                })
        });
        if found.is_none() {
            debug!(target: ROUTER_TARGET, %method, path, "no route matched");
        }
        found
    }

    /// Invokes a previously resolved route.
    ///
    /// # Errors
    ///
    /// See [`RouteMatch::invoke`].
    pub fn invoke(
        &self,
        route: &RouteMatch,
        request: &RequestContext,
    ) -> Result<Reply, HandlerError> {
        route.invoke(request)
    }

    /// Routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.iter().map(AsRef::as_ref)
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` when no controller declared a route.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
