//! Name-indexed store of component definitions.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{ComponentDefinition, ContainerError};

/// Definitions in declaration order, indexed by unique name.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    definitions: Vec<Arc<ComponentDefinition>>,
    index: HashMap<String, usize>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `definition`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::DuplicateName`] when the name is taken.
    pub fn register(&mut self, definition: ComponentDefinition) -> Result<(), ContainerError> {
        let name = definition.name().to_owned();
        if self.index.contains_key(&name) {
            return Err(ContainerError::DuplicateName { name });
        }
        self.index.insert(name, self.definitions.len());
        self.definitions.push(Arc::new(definition));
        Ok(())
    }

    /// Looks up a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ComponentDefinition>> {
        self.index
            .get(name)
            .and_then(|position| self.definitions.get(*position))
    }

    /// Returns `true` when a definition carries `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates over definitions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ComponentDefinition>> {
        self.definitions.iter()
    }

    /// Definitions assignable to the type `id`, in declaration order.
    #[must_use]
    pub fn assignable_to(&self, id: TypeId) -> Vec<Arc<ComponentDefinition>> {
        self.definitions
            .iter()
            .filter(|definition| definition.is_assignable_to(id))
            .cloned()
            .collect()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.definitions.clear();
        self.index.clear();
    }
}
