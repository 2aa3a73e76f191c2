//! Non-blocking admission control.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counting gate bounding the requests in flight.
#[derive(Debug, Clone)]
pub struct OverloadGuard {
    inner: Arc<GuardState>,
}

#[derive(Debug)]
struct GuardState {
    limit: usize,
    active: AtomicUsize,
}

impl OverloadGuard {
    /// Creates a gate admitting at most `limit` holders at once.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(GuardState {
                limit,
                active: AtomicUsize::new(0),
            }),
        }
    }

    /// Takes a permit without waiting, or returns `None` when the gate is
    /// full. Dropping the permit releases it.
    #[must_use]
    pub fn try_enter(&self) -> Option<AdmissionPermit> {
        self.inner
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < self.inner.limit).then_some(active + 1)
            })
            .ok()
            .map(|_| AdmissionPermit {
                state: Arc::clone(&self.inner),
            })
    }

    /// Permits currently held.
    #[must_use]
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Configured limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.inner.limit
    }
}

/// A held admission slot; released on drop, including during unwinding.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct AdmissionPermit {
    state: Arc<GuardState>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn admits_up_to_the_limit() {
        let guard = OverloadGuard::new(2);
        let first = guard.try_enter().expect("first");
        let _second = guard.try_enter().expect("second");
        assert!(guard.try_enter().is_none());
        drop(first);
        assert!(guard.try_enter().is_some());
    }

    #[test]
    fn releases_on_unwind() {
        let guard = OverloadGuard::new(1);
        let inner = guard.clone();
        let result = panic::catch_unwind(move || {
            let _permit = inner.try_enter().expect("permit");
            panic!("request failed");
        });
        assert!(result.is_err());
        assert_eq!(guard.active(), 0);
        assert!(guard.try_enter().is_some());
    }
}
