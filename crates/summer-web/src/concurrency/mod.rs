//! Admission control and worker pools for the dispatch server.

mod guard;
mod pool;

use std::any::Any;

pub use self::guard::{AdmissionPermit, OverloadGuard};
pub use self::pool::{PoolError, PoolSettings, TaskError, TaskHandle, WorkerPool};

/// Tracing target for pool events.
pub(crate) const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pool");

/// Text carried by a panic payload, when it has any.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Internal server error".to_owned())
}
