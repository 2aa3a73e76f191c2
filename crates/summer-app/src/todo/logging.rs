//! Post-processor tracing every component the container initializes.

use std::sync::atomic::{AtomicUsize, Ordering};

use summer_container::{
    Component, ComponentDefinition, ComponentPostProcessor, Constructor, HookError, Instance,
};
use tracing::debug;

use super::TODO_TARGET;

/// Logs each component around its initialization hook.
#[derive(Debug, Default)]
pub struct LoggingPostProcessor {
    initialized: AtomicUsize,
}

impl LoggingPostProcessor {
    /// Components seen by the after-initialization pass.
    #[must_use]
    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::Relaxed)
    }
}

impl Component for LoggingPostProcessor {}

impl ComponentPostProcessor for LoggingPostProcessor {
    fn before_initialization(&self, instance: Instance, name: &str) -> Result<Instance, HookError> {
        debug!(target: TODO_TARGET, component = name, "initializing component");
        Ok(instance)
    }

    fn after_initialization(&self, instance: Instance, name: &str) -> Result<Instance, HookError> {
        let count = self.initialized.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(target: TODO_TARGET, component = name, count, "component initialized");
        Ok(instance)
    }
}

pub(crate) fn definition() -> ComponentDefinition {
    ComponentDefinition::builder::<LoggingPostProcessor>()
        .constructor(Constructor::nullary(LoggingPostProcessor::default))
        .implements::<dyn ComponentPostProcessor>(|processor| processor)
        .build()
}
