//! HTTP surface of the todo sample.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use summer_container::{Component, ComponentDefinition, Constructor};
use summer_web::json::{Map, ToJson};
use summer_web::{Controller, HandlerError, Param, Reply, RouteSet, impl_from_json_record};

use super::clock::Clock;
use super::service::TodoService;

/// How long `/api/slow` blocks.
const SLOW_DELAY: Duration = Duration::from_millis(1500);

const TODO_NOT_FOUND: &str = "todo not found";

struct CreateTodo {
    title: Option<String>,
    note: Option<String>,
}

impl_from_json_record!(CreateTodo { title, note });

struct UpdateCompleted {
    completed: bool,
}

impl_from_json_record!(UpdateCompleted { completed });

/// Routes under `/api`.
pub struct TodoController {
    service: Arc<TodoService>,
    clock: Arc<dyn Clock>,
}

impl TodoController {
    /// Creates the controller over its collaborators.
    #[must_use]
    pub fn new(service: Arc<TodoService>, clock: Arc<dyn Clock>) -> Self {
        Self { service, clock }
    }

    fn health(&self) -> Reply {
        Reply::ok(
            Map::new()
                .with("service", "todo-sample-app")
                .with("status", "UP")
                .with("time", self.clock.now()),
        )
    }

    fn create(&self, request: CreateTodo) -> Result<Reply, HandlerError> {
        let title = request
            .title
            .filter(|title| !title.trim().is_empty())
            .ok_or_else(|| HandlerError::bad_request("title is required"))?;
        Ok(Reply::created(self.service.create(title, request.note)))
    }

    fn list(&self, completed: Option<bool>) -> Reply {
        let items = self.service.list(completed);
        let count = i64::try_from(items.len()).unwrap_or(i64::MAX);
        Reply::ok(Map::new().with("count", count).with("items", items.to_json()))
    }

    fn find(&self, id: i64) -> Result<Reply, HandlerError> {
        self.service
            .find(id)
            .map(Reply::ok)
            .ok_or_else(|| HandlerError::not_found(TODO_NOT_FOUND))
    }

    fn set_completed(&self, id: i64, update: &UpdateCompleted) -> Result<Reply, HandlerError> {
        self.service
            .set_completed(id, update.completed)
            .map(Reply::ok)
            .ok_or_else(|| HandlerError::not_found(TODO_NOT_FOUND))
    }

    fn delete(&self, id: i64) -> Result<Reply, HandlerError> {
        if self.service.delete(id) {
            Ok(Reply::no_content())
        } else {
            Err(HandlerError::not_found(TODO_NOT_FOUND))
        }
    }
}

impl Component for TodoController {}

impl Controller for TodoController {
    fn base_path(&self) -> &str {
        "/api"
    }

    fn routes(self: Arc<Self>, routes: &mut RouteSet) {
        let health = Arc::clone(&self);
        routes.get("/health", Vec::new(), move |_| Ok(health.health()));

        let creator = Arc::clone(&self);
        routes.post(
            "/todos",
            vec![Param::of::<CreateTodo>("request").body()],
            move |mut args| creator.create(args.take(0)?),
        );

        let lister = Arc::clone(&self);
        routes.get(
            "/todos",
            vec![Param::of::<Option<bool>>("completed").query().optional()],
            move |mut args| Ok(lister.list(args.take(0)?)),
        );

        let finder = Arc::clone(&self);
        routes.get(
            "/todos/{id}",
            vec![Param::of::<i64>("id").path_variable()],
            move |mut args| finder.find(args.take(0)?),
        );

        let completer = Arc::clone(&self);
        routes.patch(
            "/todos/{id}/completed",
            vec![
                Param::of::<i64>("id").path_variable(),
                Param::of::<UpdateCompleted>("request").body(),
            ],
            move |mut args| {
                let id = args.take(0)?;
                let update: UpdateCompleted = args.take(1)?;
                completer.set_completed(id, &update)
            },
        );

        let remover = self;
        routes.delete(
            "/todos/{id}",
            vec![Param::of::<i64>("id").path_variable()],
            move |mut args| remover.delete(args.take(0)?),
        );

        routes.get("/slow", Vec::new(), |_| {
            thread::sleep(SLOW_DELAY);
            Ok(Reply::ok(Map::new().with("status", "done")))
        });
    }
}

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::builder::<TodoController>()
        .constructor(Constructor::new(
            |(service, clock): (Arc<TodoService>, Arc<dyn Clock>)| {
                TodoController::new(service, clock)
            },
        ))
        .implements::<dyn Controller>(|controller| controller)
        .build()
}
