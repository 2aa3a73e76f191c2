//! The instantiation engine: singleton cache, creation pipeline and teardown.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::component::{ComponentPostProcessor, Instance, TypeInfo};
use crate::errors::{DisposalFailure, LifecyclePhase};
use crate::{
    CONTAINER_TARGET, ComponentDefinition, ComponentRegistry, ConfigurationRoot, ContainerError,
    Scope, TypeCatalog,
};

/// Owns component definitions and the instances created from them.
///
/// Singletons are cached for the container's lifetime and disposed, in
/// reverse creation order, by [`Container::close`].
#[derive(Default)]
pub struct Container {
    registry: ComponentRegistry,
    singletons: HashMap<String, Instance>,
    creation_order: Vec<String>,
    in_creation: Vec<String>,
    post_processors: Vec<Arc<dyn ComponentPostProcessor>>,
    closed: bool,
}

impl Container {
    /// Creates an empty, open container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the given configuration roots, the factory definitions they
    /// declare and every catalog entry beneath their scan namespaces, then
    /// refreshes the container.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NoConfigurationRoot`] when `roots` is empty,
    /// and any registration or creation failure otherwise.
    pub fn bootstrap(
        catalog: &TypeCatalog,
        roots: Vec<ConfigurationRoot>,
    ) -> Result<Self, ContainerError> {
        if roots.is_empty() {
            return Err(ContainerError::NoConfigurationRoot);
        }

        let mut container = Self::new();
        for root in roots {
            let (definition, factories, namespaces) = root.into_parts();
            container.register(definition)?;
            for factory in factories {
                container.register(factory)?;
            }
            for namespace in &namespaces {
                for definition in catalog.scan(namespace) {
                    container.register(definition)?;
                }
            }
        }
        container.refresh()?;
        Ok(container)
    }

    /// Adds a definition.
    ///
    /// # Errors
    ///
    /// Fails when the name is taken or the container is closed.
    pub fn register(&mut self, definition: ComponentDefinition) -> Result<(), ContainerError> {
        self.ensure_open()?;
        debug!(
            target: CONTAINER_TARGET,
            name = definition.name(),
            component_type = %definition.type_info(),
            scope = %definition.scope(),
            "component definition registered"
        );
        self.registry.register(definition)
    }

    /// Instantiates post-processors, then every singleton, in declaration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns the first creation failure.
    pub fn refresh(&mut self) -> Result<(), ContainerError> {
        self.ensure_open()?;
        self.post_processors.clear();

        let processor_id = TypeId::of::<dyn ComponentPostProcessor>();
        let processors = self.registry.assignable_to(processor_id);
        for definition in processors {
            let instance = self.instance_of(&definition)?;
            let processor = definition
                .cast::<dyn ComponentPostProcessor>(&instance)
                .ok_or_else(|| {
                    ContainerError::type_mismatch(
                        definition.name(),
                        type_name::<dyn ComponentPostProcessor>(),
                    )
                })?;
            self.post_processors.push(processor);
        }

        let singletons: Vec<_> = self
            .registry
            .iter()
            .filter(|definition| definition.scope() == Scope::Singleton)
            .cloned()
            .collect();
        for definition in singletons {
            self.instance_of(&definition)?;
        }

        info!(
            target: CONTAINER_TARGET,
            definitions = self.registry.len(),
            singletons = self.singletons.len(),
            post_processors = self.post_processors.len(),
            "container refreshed"
        );
        Ok(())
    }

    /// Resolves the single component assignable to `I`.
    ///
    /// # Errors
    ///
    /// Fails when no definition, or more than one, is assignable to `I`, or
    /// when creating the instance fails.
    pub fn resolve<I>(&mut self) -> Result<Arc<I>, ContainerError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let candidates = self.registry.assignable_to(TypeId::of::<I>());
        let definition = match candidates.as_slice() {
            [] => {
                return Err(ContainerError::NoMatchingType {
                    type_name: type_name::<I>(),
                });
            }
            [only] => Arc::clone(only),
            many => {
                return Err(ContainerError::AmbiguousType {
                    type_name: type_name::<I>(),
                    candidates: many
                        .iter()
                        .map(|definition| definition.name().to_owned())
                        .collect(),
                });
            }
        };
        self.typed_instance(&definition)
    }

    /// Resolves every component assignable to `I`, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first creation failure.
    pub fn resolve_all<I>(&mut self) -> Result<Vec<Arc<I>>, ContainerError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let candidates = self.registry.assignable_to(TypeId::of::<I>());
        candidates
            .iter()
            .map(|definition| self.typed_instance(definition))
            .collect()
    }

    /// Resolves a component by name.
    ///
    /// # Errors
    ///
    /// Fails when the name is undefined or creation fails.
    pub fn resolve_by_name(&mut self, name: &str) -> Result<Instance, ContainerError> {
        self.ensure_open()?;
        let definition = self.definition_arc(name)?;
        self.instance_of(&definition)
    }

    /// Resolves a component by name and views it as `I`.
    ///
    /// # Errors
    ///
    /// Fails when the name is undefined, the component is not assignable to
    /// `I`, or creation fails.
    pub fn resolve_named<I>(&mut self, name: &str) -> Result<Arc<I>, ContainerError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let definition = self.definition_arc(name)?;
        self.typed_instance(&definition)
    }

    /// Returns `true` when a definition carries `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Definition names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.registry
            .iter()
            .map(|definition| definition.name())
            .collect()
    }

    /// Declared type of the named component.
    #[must_use]
    pub fn type_of(&self, name: &str) -> Option<TypeInfo> {
        self.registry.get(name).map(|definition| definition.type_info())
    }

    /// The named definition.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&ComponentDefinition> {
        self.registry.get(name).map(|definition| &**definition)
    }

    /// Returns `true` once [`Container::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Runs disposal hooks on cached singletons in reverse creation order,
    /// then clears all state. Later resolutions fail with
    /// [`ContainerError::Closed`]. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// A failing hook does not stop teardown; every failure is collected and
    /// reported as [`ContainerError::Teardown`].
    pub fn close(&mut self) -> Result<(), ContainerError> {
        if self.closed {
            return Ok(());
        }

        let mut failures = Vec::new();
        for name in self.creation_order.iter().rev() {
            let (Some(definition), Some(instance)) =
                (self.registry.get(name), self.singletons.get(name))
            else {
                continue;
            };
            let Some(component) = definition.component(instance) else {
                continue;
            };
            match component.destroy() {
                Ok(()) => debug!(target: CONTAINER_TARGET, name = %name, "component disposed"),
                Err(source) => {
                    warn!(
                        target: CONTAINER_TARGET,
                        name = %name,
                        phase = %LifecyclePhase::Destruction,
                        error = %source,
                        "component disposal failed"
                    );
                    failures.push(DisposalFailure {
                        name: name.clone(),
                        source,
                    });
                }
            }
        }

        self.singletons.clear();
        self.creation_order.clear();
        self.post_processors.clear();
        self.registry.clear();
        self.closed = true;
        info!(
            target: CONTAINER_TARGET,
            failures = failures.len(),
            "container closed"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::Teardown { failures })
        }
    }

    fn ensure_open(&self) -> Result<(), ContainerError> {
        if self.closed {
            Err(ContainerError::Closed)
        } else {
            Ok(())
        }
    }

    fn definition_arc(&self, name: &str) -> Result<Arc<ComponentDefinition>, ContainerError> {
        self.registry
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::not_defined(name))
    }

    fn typed_instance<I>(
        &mut self,
        definition: &Arc<ComponentDefinition>,
    ) -> Result<Arc<I>, ContainerError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let instance = self.instance_of(definition)?;
        definition
            .cast::<I>(&instance)
            .ok_or_else(|| ContainerError::type_mismatch(definition.name(), type_name::<I>()))
    }

    fn instance_of(
        &mut self,
        definition: &Arc<ComponentDefinition>,
    ) -> Result<Instance, ContainerError> {
        self.ensure_open()?;
        let name = definition.name();
        let singleton = definition.scope() == Scope::Singleton;
        if singleton {
            if let Some(instance) = self.singletons.get(name) {
                return Ok(Arc::clone(instance));
            }
        }

        if self.in_creation.iter().any(|pending| pending == name) {
            let mut chain = self.in_creation.clone();
            chain.push(name.to_owned());
            return Err(ContainerError::CircularDependency {
                name: name.to_owned(),
                chain,
            });
        }

        self.in_creation.push(name.to_owned());
        let created = self.create(definition);
        self.in_creation.pop();
        let instance = created?;

        if singleton {
            self.singletons
                .insert(name.to_owned(), Arc::clone(&instance));
            self.creation_order.push(name.to_owned());
        }
        debug!(
            target: CONTAINER_TARGET,
            name,
            scope = %definition.scope(),
            "component created"
        );
        Ok(instance)
    }

    fn create(&mut self, definition: &ComponentDefinition) -> Result<Instance, ContainerError> {
        let name = definition.name();
        let mut instance = definition.instantiate(&mut Resolver::new(self))?;

        let processors = self.post_processors.clone();
        for processor in &processors {
            instance = processor
                .before_initialization(instance, name)
                .map_err(|source| {
                    ContainerError::lifecycle(name, LifecyclePhase::BeforeInitialization, source)
                })?;
            ensure_declared_type(definition, &instance)?;
        }

        if let Some(component) = definition.component(&instance) {
            component.after_properties_set().map_err(|source| {
                ContainerError::lifecycle(name, LifecyclePhase::Initialization, source)
            })?;
        }

        for processor in &processors {
            instance = processor
                .after_initialization(instance, name)
                .map_err(|source| {
                    ContainerError::lifecycle(name, LifecyclePhase::AfterInitialization, source)
                })?;
            ensure_declared_type(definition, &instance)?;
        }
        Ok(instance)
    }
}

/// Post-processors may swap an instance, but only for one of the declared
/// type; lifecycle hooks and typed lookups depend on it.
fn ensure_declared_type(
    definition: &ComponentDefinition,
    instance: &Instance,
) -> Result<(), ContainerError> {
    if definition.component(instance).is_some() {
        Ok(())
    } else {
        Err(ContainerError::type_mismatch(
            definition.name(),
            definition.type_info().name(),
        ))
    }
}

/// Resolution handle passed to constructors and injection hooks while a
/// component is being created.
pub struct Resolver<'a> {
    container: &'a mut Container,
}

impl<'a> Resolver<'a> {
    fn new(container: &'a mut Container) -> Self {
        Self { container }
    }

    /// See [`Container::resolve`].
    ///
    /// # Errors
    ///
    /// Propagates resolution and creation failures, including circular
    /// dependencies.
    pub fn resolve<I>(&mut self) -> Result<Arc<I>, ContainerError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.container.resolve::<I>()
    }

    /// See [`Container::resolve_all`].
    ///
    /// # Errors
    ///
    /// Propagates creation failures.
    pub fn resolve_all<I>(&mut self) -> Result<Vec<Arc<I>>, ContainerError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.container.resolve_all::<I>()
    }

    /// See [`Container::resolve_named`].
    ///
    /// # Errors
    ///
    /// Propagates resolution and creation failures.
    pub fn resolve_named<I>(&mut self, name: &str) -> Result<Arc<I>, ContainerError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.container.resolve_named::<I>(name)
    }
}
