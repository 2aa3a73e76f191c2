//! In-memory todo storage.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use summer_container::{Component, ComponentDefinition, Constructor, HookError};
use summer_web::json::impl_to_json;
use tracing::debug;

use super::TODO_TARGET;

/// A stored todo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoItem {
    /// Identifier, assigned from 1 upwards.
    pub id: i64,
    /// Short description.
    pub title: String,
    /// Optional free text.
    pub note: Option<String>,
    /// Whether the todo is done.
    pub completed: bool,
}

impl_to_json!(TodoItem { id, title, note, completed });

/// Thread-safe todo store keyed by id.
#[derive(Debug, Default)]
pub struct TodoService {
    sequence: AtomicI64,
    todos: Mutex<BTreeMap<i64, TodoItem>>,
    name: String,
}

impl TodoService {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new, open todo.
    #[must_use]
    pub fn create(&self, title: impl Into<String>, note: Option<String>) -> TodoItem {
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let item = TodoItem {
            id,
            title: title.into(),
            note,
            completed: false,
        };
        self.todos().insert(id, item.clone());
        item
    }

    /// Todos in id order, optionally filtered by completion.
    #[must_use]
    pub fn list(&self, completed: Option<bool>) -> Vec<TodoItem> {
        self.todos()
            .values()
            .filter(|item| completed.is_none_or(|wanted| item.completed == wanted))
            .cloned()
            .collect()
    }

    /// Looks up one todo.
    #[must_use]
    pub fn find(&self, id: i64) -> Option<TodoItem> {
        self.todos().get(&id).cloned()
    }

    /// Marks a todo as done or open.
    #[must_use]
    pub fn set_completed(&self, id: i64, completed: bool) -> Option<TodoItem> {
        self.todos().get_mut(&id).map(|item| {
            item.completed = completed;
            item.clone()
        })
    }

    /// Removes a todo; `false` when it did not exist.
    #[must_use]
    pub fn delete(&self, id: i64) -> bool {
        self.todos().remove(&id).is_some()
    }

    fn todos(&self) -> MutexGuard<'_, BTreeMap<i64, TodoItem>> {
        self.todos.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Component for TodoService {
    fn set_component_name(&mut self, name: &str) {
        name.clone_into(&mut self.name);
    }

    fn after_properties_set(&self) -> Result<(), HookError> {
        debug!(target: TODO_TARGET, component = %self.name, "todo store ready");
        Ok(())
    }

    fn destroy(&self) -> Result<(), HookError> {
        debug!(
            target: TODO_TARGET,
            component = %self.name,
            remaining = self.todos().len(),
            "todo store disposed"
        );
        Ok(())
    }
}

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::builder::<TodoService>()
        .constructor(Constructor::nullary(TodoService::new))
        .build()
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use summer_web::json::{ToJson, to_string};

    use super::*;

    #[fixture]
    fn service() -> TodoService {
        let service = TodoService::new();
        let first = service.create("buy milk", None);
        let second = service.create("walk dog", Some("before noon".to_owned()));
        assert_eq!((first.id, second.id), (1, 2));
        service
    }

    #[rstest]
    fn assigns_sequential_ids(service: TodoService) {
        let third = service.create("water plants", None);
        assert_eq!(third.id, 3);
        assert_eq!(service.find(2).map(|item| item.title), Some("walk dog".to_owned()));
    }

    #[rstest]
    fn filters_by_completion(service: TodoService) {
        service.set_completed(2, true).expect("todo 2 exists");
        let done: Vec<i64> = service.list(Some(true)).iter().map(|item| item.id).collect();
        let open: Vec<i64> = service.list(Some(false)).iter().map(|item| item.id).collect();
        assert_eq!(done, [2]);
        assert_eq!(open, [1]);
        assert_eq!(service.list(None).len(), 2);
    }

    #[rstest]
    fn deletes_once(service: TodoService) {
        assert!(service.delete(1));
        assert!(!service.delete(1));
        assert!(service.find(1).is_none());
        assert!(service.set_completed(1, true).is_none());
    }

    #[test]
    fn serializes_with_null_notes() {
        let item = TodoService::new().create("buy milk", None);
        assert_eq!(
            to_string(&item.to_json()),
            r#"{"id":1,"title":"buy milk","note":null,"completed":false}"#
        );
    }
}
