//! Component capabilities and the type-erased instance handle.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::{ContainerError, HookError, Resolver};

/// Type-erased component instance owned by the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Runtime identity of a component type or capability.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Describes `T`, which may be a trait object.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The type identifier.
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The last path segment of the type name, without generic arguments.
    #[must_use]
    pub fn simple_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Lifecycle hooks implemented by every container-managed type.
///
/// All hooks default to no-ops, so plain types only need an empty impl.
pub trait Component: Send + Sync + 'static {
    /// Field injection: resolve collaborators that were not constructor
    /// parameters, including those needed by composed parts.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures from `resolver`.
    fn inject_dependencies(&mut self, _resolver: &mut Resolver<'_>) -> Result<(), ContainerError> {
        Ok(())
    }

    /// Receives the definition name the instance was created under.
    fn set_component_name(&mut self, _name: &str) {}

    /// Initialization hook, run between the post-processor passes.
    ///
    /// # Errors
    ///
    /// Any error aborts creation of the component.
    fn after_properties_set(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Disposal hook, run for cached singletons when the container closes.
    ///
    /// # Errors
    ///
    /// Errors are collected and reported once teardown completes.
    fn destroy(&self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Hooks that observe or replace every instance the container creates.
///
/// Definitions declare this capability with
/// `implements::<dyn ComponentPostProcessor>(..)`; `refresh` instantiates them
/// before any other component.
pub trait ComponentPostProcessor: Send + Sync {
    /// Runs before the instance's initialization hook.
    ///
    /// # Errors
    ///
    /// Any error aborts creation of the component.
    fn before_initialization(
        &self,
        instance: Instance,
        _name: &str,
    ) -> Result<Instance, HookError> {
        Ok(instance)
    }

    /// Runs after the instance's initialization hook.
    ///
    /// # Errors
    ///
    /// Any error aborts creation of the component.
    fn after_initialization(&self, instance: Instance, _name: &str) -> Result<Instance, HookError> {
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod nested {
        pub struct TodoService;
        pub struct Wrapper<T>(pub T);
    }

    #[test]
    fn simple_name_strips_module_path() {
        assert_eq!(TypeInfo::of::<nested::TodoService>().simple_name(), "TodoService");
    }

    #[test]
    fn simple_name_ignores_generic_arguments() {
        let info = TypeInfo::of::<nested::Wrapper<nested::TodoService>>();
        assert_eq!(info.simple_name(), "Wrapper");
    }

    #[test]
    fn trait_objects_have_distinct_identity() {
        assert_ne!(
            TypeInfo::of::<dyn ComponentPostProcessor>(),
            TypeInfo::of::<dyn Component>()
        );
    }
}
