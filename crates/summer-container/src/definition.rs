//! Component definitions and their typed constructors.
//!
//! A definition is built once, from a [`DefinitionBuilder`], and is immutable
//! afterwards. It erases the component type behind closures: one that creates
//! and wires an instance, and one per declared capability that views an
//! instance as a trait object.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use crate::component::{Component, Instance, TypeInfo};
use crate::{ContainerError, HookError, Resolver, Scope};

type Build<T> = Box<dyn Fn(&mut Resolver<'_>) -> Result<T, ContainerError> + Send + Sync>;
type Instantiate =
    Box<dyn Fn(&mut Resolver<'_>, &str) -> Result<Instance, ContainerError> + Send + Sync>;
type Cast = Box<dyn Fn(&Instance) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;
type ComponentView = fn(&(dyn Any + Send + Sync)) -> Option<&dyn Component>;

/// Constructor parameters resolved by type before a constructor runs.
///
/// Implemented for `()` and for tuples of up to six `Arc<Dep>` values, where
/// each `Dep` may be a concrete type or a capability trait object.
pub trait Dependencies: Sized {
    /// Number of parameters.
    const ARITY: usize;

    /// Resolves every parameter through `resolver`.
    ///
    /// # Errors
    ///
    /// Propagates the first resolution failure.
    fn resolve(resolver: &mut Resolver<'_>) -> Result<Self, ContainerError>;
}

impl Dependencies for () {
    const ARITY: usize = 0;

    fn resolve(_resolver: &mut Resolver<'_>) -> Result<Self, ContainerError> {
        Ok(())
    }
}

macro_rules! tuple_dependencies {
    ($arity:literal => $($dep:ident),+) => {
        impl<$($dep),+> Dependencies for ($(Arc<$dep>,)+)
        where
            $($dep: ?Sized + Send + Sync + 'static,)+
        {
            const ARITY: usize = $arity;

            fn resolve(resolver: &mut Resolver<'_>) -> Result<Self, ContainerError> {
                Ok(($(resolver.resolve::<$dep>()?,)+))
            }
        }
    };
}

tuple_dependencies!(1 => A);
tuple_dependencies!(2 => A, B);
tuple_dependencies!(3 => A, B, C);
tuple_dependencies!(4 => A, B, C, D);
tuple_dependencies!(5 => A, B, C, D, E);
tuple_dependencies!(6 => A, B, C, D, E, F);

/// A way of constructing `T` from dependencies resolved by type.
pub struct Constructor<T> {
    arity: usize,
    autowired: bool,
    build: Build<T>,
}

impl<T: 'static> Constructor<T> {
    /// Wraps an infallible constructor.
    ///
    /// ```ignore
    /// Constructor::new(|(repository,): (Arc<TodoRepository>,)| TodoService::new(repository))
    /// ```
    #[must_use]
    pub fn new<D, F>(build: F) -> Self
    where
        D: Dependencies + 'static,
        F: Fn(D) -> T + Send + Sync + 'static,
    {
        Self {
            arity: D::ARITY,
            autowired: false,
            build: Box::new(move |resolver: &mut Resolver<'_>| D::resolve(resolver).map(&build)),
        }
    }

    /// Wraps a constructor that may fail.
    #[must_use]
    pub fn try_new<D, F, E>(build: F) -> Self
    where
        D: Dependencies + 'static,
        F: Fn(D) -> Result<T, E> + Send + Sync + 'static,
        E: Into<HookError>,
    {
        Self {
            arity: D::ARITY,
            autowired: false,
            build: Box::new(move |resolver: &mut Resolver<'_>| {
                let dependencies = D::resolve(resolver)?;
                build(dependencies).map_err(|error| ContainerError::Construction {
                    type_name: type_name::<T>(),
                    source: error.into(),
                })
            }),
        }
    }

    /// Wraps a constructor without parameters.
    #[must_use]
    pub fn nullary(build: fn() -> T) -> Self {
        Self::new(move |(): ()| build())
    }

    /// Marks this constructor as the injection target.
    #[must_use]
    pub fn autowired(mut self) -> Self {
        self.autowired = true;
        self
    }

    /// Number of parameters the constructor takes.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }
}

impl<T> fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("arity", &self.arity)
            .field("autowired", &self.autowired)
            .finish_non_exhaustive()
    }
}

fn select_constructor<T>(
    constructors: &[Constructor<T>],
) -> Result<&Constructor<T>, ContainerError> {
    let unsuitable = |reason| ContainerError::NoSuitableConstructor {
        type_name: type_name::<T>(),
        reason,
    };

    let mut marked = constructors.iter().filter(|constructor| constructor.autowired);
    match (marked.next(), marked.next()) {
        (Some(_), Some(_)) => {
            return Err(unsuitable("more than one constructor is marked for injection"));
        }
        (Some(constructor), None) => return Ok(constructor),
        _ => {}
    }

    match constructors {
        [] => Err(unsuitable("no constructor is declared")),
        [only] => Ok(only),
        _ => constructors
            .iter()
            .find(|constructor| constructor.arity == 0)
            .ok_or_else(|| unsuitable("no constructor is marked for injection and none takes no arguments")),
    }
}

/// How instances of a definition come into existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Built by one of the definition's constructors.
    Constructed,
    /// Produced by a factory method on a configuration root.
    FactoryMethod {
        /// Type of the configuration root owning the method.
        root: TypeInfo,
        /// Name of the factory method.
        method: &'static str,
    },
}

struct Capability {
    type_info: TypeInfo,
    cast: Cast,
}

/// Immutable, type-erased description of a component.
pub struct ComponentDefinition {
    name: String,
    type_info: TypeInfo,
    scope: Scope,
    origin: Origin,
    instantiate: Instantiate,
    capabilities: Vec<Capability>,
    view: ComponentView,
}

impl ComponentDefinition {
    /// Starts a definition for a directly constructed component.
    ///
    /// The default name is the decapitalized simple type name.
    #[must_use]
    pub fn builder<T: Component>() -> DefinitionBuilder<T> {
        DefinitionBuilder {
            name: decapitalize(TypeInfo::of::<T>().simple_name()),
            scope: Scope::Singleton,
            origin: Origin::Constructed,
            constructors: Vec::new(),
            capabilities: Vec::new(),
        }
    }

    /// Starts a definition produced by `method` on the configuration root `R`.
    ///
    /// The root instance is resolved by type, then `factory` runs with the
    /// remaining parameters resolved by type. The default name is `method`.
    #[must_use]
    pub fn factory_method<R, T, D, F>(method: &'static str, factory: F) -> DefinitionBuilder<T>
    where
        R: Send + Sync + 'static,
        T: Component,
        D: Dependencies + 'static,
        F: Fn(&R, D) -> T + Send + Sync + 'static,
    {
        let constructor = Constructor {
            arity: D::ARITY,
            autowired: false,
            build: Box::new(move |resolver: &mut Resolver<'_>| {
                let root = resolver.resolve::<R>()?;
                let dependencies = D::resolve(resolver)?;
                Ok(factory(&root, dependencies))
            }),
        };
        DefinitionBuilder {
            name: method.to_owned(),
            scope: Scope::Singleton,
            origin: Origin::FactoryMethod {
                root: TypeInfo::of::<R>(),
                method,
            },
            constructors: vec![constructor],
            capabilities: Vec::new(),
        }
    }

    /// Unique component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared component type.
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// Instance lifetime policy.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// How instances are produced.
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The declared type followed by every declared capability.
    pub fn capabilities(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.capabilities.iter().map(|capability| capability.type_info)
    }

    /// Returns `true` when instances can be viewed as the type `id`.
    #[must_use]
    pub fn is_assignable_to(&self, id: TypeId) -> bool {
        self.capabilities
            .iter()
            .any(|capability| capability.type_info.id() == id)
    }

    pub(crate) fn instantiate(
        &self,
        resolver: &mut Resolver<'_>,
    ) -> Result<Instance, ContainerError> {
        (self.instantiate)(resolver, &self.name)
    }

    pub(crate) fn cast<I>(&self, instance: &Instance) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let id = TypeId::of::<I>();
        let capability = self
            .capabilities
            .iter()
            .find(|capability| capability.type_info.id() == id)?;
        let erased = (capability.cast)(instance)?;
        erased.downcast::<Arc<I>>().ok().map(|typed| *typed)
    }

    pub(crate) fn component<'a>(&self, instance: &'a Instance) -> Option<&'a dyn Component> {
        (self.view)(&**instance)
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("type", &self.type_info)
            .field("scope", &self.scope)
            .field("origin", &self.origin)
            .field("capabilities", &self.capabilities().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`ComponentDefinition`] of type `T`.
pub struct DefinitionBuilder<T> {
    name: String,
    scope: Scope,
    origin: Origin,
    constructors: Vec<Constructor<T>>,
    capabilities: Vec<Capability>,
}

impl<T: Component> DefinitionBuilder<T> {
    /// Overrides the default component name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the instance lifetime policy.
    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Adds a constructor candidate.
    #[must_use]
    pub fn constructor(mut self, constructor: Constructor<T>) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Declares that instances can be viewed as `I`, usually a trait object.
    ///
    /// ```ignore
    /// builder.implements::<dyn Controller>(|controller| controller)
    /// ```
    #[must_use]
    pub fn implements<I>(mut self, cast: fn(Arc<T>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.capabilities.push(Capability {
            type_info: TypeInfo::of::<I>(),
            cast: Box::new(move |instance: &Instance| {
                Arc::clone(instance)
                    .downcast::<T>()
                    .ok()
                    .map(|typed| Box::new(cast(typed)) as Box<dyn Any + Send + Sync>)
            }),
        });
        self
    }

    /// Finishes the definition.
    #[must_use]
    pub fn build(self) -> ComponentDefinition {
        let own = Capability {
            type_info: TypeInfo::of::<T>(),
            cast: Box::new(|instance: &Instance| {
                Arc::clone(instance)
                    .downcast::<T>()
                    .ok()
                    .map(|typed| Box::new(typed) as Box<dyn Any + Send + Sync>)
            }),
        };
        let mut capabilities = Vec::with_capacity(self.capabilities.len() + 1);
        capabilities.push(own);
        capabilities.extend(self.capabilities);

        let constructors = self.constructors;
        let instantiate: Instantiate = Box::new(move |resolver: &mut Resolver<'_>, name: &str| {
            let constructor = select_constructor(&constructors)?;
            let mut component = (constructor.build)(resolver)?;
            component.inject_dependencies(resolver)?;
            component.set_component_name(name);
            Ok(Arc::new(component) as Instance)
        });

        ComponentDefinition {
            name: self.name,
            type_info: TypeInfo::of::<T>(),
            scope: self.scope,
            origin: self.origin,
            instantiate,
            capabilities,
            view: component_view::<T>,
        }
    }
}

fn component_view<T: Component>(instance: &(dyn Any + Send + Sync)) -> Option<&dyn Component> {
    instance
        .downcast_ref::<T>()
        .map(|component| component as &dyn Component)
}

/// Derives a bean-style name from a simple type name.
///
/// The first character is lower-cased unless the first two characters are
/// both upper case, in which case the name is kept as is (`URLParser`).
#[must_use]
pub fn decapitalize(simple_name: &str) -> String {
    let mut chars = simple_name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    if first.is_uppercase() && chars.clone().next().is_some_and(char::is_uppercase) {
        return simple_name.to_owned();
    }
    first.to_lowercase().chain(chars).collect()
}
