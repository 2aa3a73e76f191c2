//! Bounded worker pool with executor-style growth and rejection policies.
//!
//! Threads are added below `core_threads`; beyond that tasks queue up to
//! `queue_capacity`, then threads are added up to `max_threads`, and only
//! then does the rejection policy apply. A capacity of zero hands tasks
//! directly to idle workers without buffering.

use std::collections::VecDeque;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use summer_config::{RejectionPolicy, ServerTuning};
use thiserror::Error;
use tracing::{debug, warn};

use super::{POOL_TARGET, panic_message};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Sizing and saturation behaviour of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Threads spawned before tasks start queueing.
    pub core_threads: usize,
    /// Upper bound on threads.
    pub max_threads: usize,
    /// Queued tasks allowed; zero means direct handoff.
    pub queue_capacity: usize,
    /// Idle period after which any thread retires; zero keeps threads alive.
    pub keep_alive: Duration,
    /// What happens when threads and queue are saturated.
    pub rejection_policy: RejectionPolicy,
}

impl PoolSettings {
    /// Settings taken from the server tuning.
    #[must_use]
    pub fn from_tuning(tuning: &ServerTuning) -> Self {
        Self {
            core_threads: tuning.core_threads(),
            max_threads: tuning.max_threads(),
            queue_capacity: tuning.queue_capacity(),
            keep_alive: tuning.keep_alive(),
            rejection_policy: tuning.rejection_policy(),
        }
    }
}

/// Submission failures.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Threads and queue are saturated under the `abort` policy.
    #[error("{pool} pool is saturated")]
    Saturated {
        /// Pool name.
        pool: String,
    },
    /// Nothing was queued to evict under `discard-oldest`, so the task was
    /// dropped.
    #[error("{pool} pool discarded the task")]
    Discarded {
        /// Pool name.
        pool: String,
    },
    /// The pool no longer accepts work.
    #[error("{pool} pool is shut down")]
    ShutDown {
        /// Pool name.
        pool: String,
    },
    /// The operating system refused a new thread.
    #[error("failed to spawn {pool} worker: {source}")]
    Spawn {
        /// Pool name.
        pool: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}

impl PoolError {
    /// Returns `true` when the pool refused the task for lack of capacity.
    #[must_use]
    pub const fn is_saturation(&self) -> bool {
        matches!(self, Self::Saturated { .. } | Self::Discarded { .. })
    }
}

/// Failures observed while waiting on a [`TaskHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The deadline passed; the task was flagged as cancelled.
    #[error("task did not finish within {0:?}")]
    TimedOut(Duration),
    /// The task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was dropped before it produced a result.
    #[error("task was discarded before it ran")]
    Dropped,
}

/// Result slot of a task submitted with [`WorkerPool::submit`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: Receiver<Result<T, String>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> TaskHandle<T> {
    /// Waits up to `timeout`. On expiry the task is flagged as cancelled: a
    /// task that has not started is skipped, a running one is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] on expiry, panic or discard.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, TaskError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => outcome.map_err(TaskError::Panicked),
            Err(RecvTimeoutError::Timeout) => {
                self.cancel();
                Err(TaskError::TimedOut(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Dropped),
        }
    }

    /// Waits without a deadline.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] on panic or discard.
    pub fn wait(self) -> Result<T, TaskError> {
        match self.receiver.recv() {
            Ok(outcome) => outcome.map_err(TaskError::Panicked),
            Err(_) => Err(TaskError::Dropped),
        }
    }

    /// Flags the task as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once [`TaskHandle::cancel`] ran.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Task>,
    workers: usize,
    idle: usize,
    shutdown: bool,
}

struct Shared {
    name: String,
    settings: PoolSettings,
    state: Mutex<PoolState>,
    available: Condvar,
    terminated: Condvar,
    next_id: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn keep_alive(&self) -> Option<Duration> {
        (!self.settings.keep_alive.is_zero()).then_some(self.settings.keep_alive)
    }

    fn can_enqueue(&self, state: &PoolState) -> bool {
        if self.settings.queue_capacity == 0 {
            state.queue.len() < state.idle
        } else {
            state.queue.len() < self.settings.queue_capacity
        }
    }

    /// Next queued task, or `None` once the worker should exit. The worker
    /// count is decremented under the same lock that decides the exit.
    fn next_task(&self) -> Option<Task> {
        let deadline = self.keep_alive().map(|keep_alive| Instant::now() + keep_alive);
        let mut state = self.lock();
        loop {
            if let Some(task) = state.queue.pop_front() {
                return Some(task);
            }
            let expired = deadline.is_some_and(|deadline| Instant::now() >= deadline);
            if state.shutdown || expired {
                state.workers -= 1;
                if state.workers == 0 {
                    self.terminated.notify_all();
                }
                return None;
            }

            state.idle += 1;
            state = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    self.available
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
            state.idle -= 1;
        }
    }

    fn run(&self, task: Task) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            warn!(
                target: POOL_TARGET,
                pool = %self.name,
                error = %panic_message(payload.as_ref()),
                "pool task panicked"
            );
        }
    }
}

fn run_worker(shared: &Shared, first: Option<Task>) {
    if let Some(task) = first {
        shared.run(task);
    }
    while let Some(task) = shared.next_task() {
        shared.run(task);
    }
    debug!(target: POOL_TARGET, pool = %shared.name, "worker retired");
}

/// A named pool of OS threads. Clones share the same threads and queue.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Creates an empty pool; threads named `{name}-{n}` are spawned on
    /// demand.
    #[must_use]
    pub fn new(name: impl Into<String>, settings: PoolSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                settings,
                state: Mutex::new(PoolState::default()),
                available: Condvar::new(),
                terminated: Condvar::new(),
                next_id: AtomicUsize::new(1),
            }),
        }
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Pool settings.
    #[must_use]
    pub fn settings(&self) -> PoolSettings {
        self.shared.settings
    }

    /// Live worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.shared.lock().workers
    }

    /// Tasks waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Runs `task` on the pool, or as the rejection policy dictates.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Saturated`] under `abort`,
    /// [`PoolError::Discarded`] under `discard-oldest` with nothing queued,
    /// and [`PoolError::ShutDown`] after shutdown.
    pub fn execute<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Box::new(task))
    }

    /// Runs `job` on the pool and returns a handle to its result.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::execute`].
    pub fn submit<T, F>(&self, job: F) -> Result<TaskHandle<T>, PoolError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let pool = self.shared.name.clone();
        self.execute(move || {
            if flag.load(Ordering::Acquire) {
                debug!(target: POOL_TARGET, pool = %pool, "skipping cancelled task");
                return;
            }
            let outcome = catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| panic_message(payload.as_ref()));
            if sender.send(outcome).is_err() {
                debug!(target: POOL_TARGET, pool = %pool, "task finished after its waiter left");
            }
        })?;
        Ok(TaskHandle {
            receiver,
            cancelled,
        })
    }

    fn dispatch(&self, task: Task) -> Result<(), PoolError> {
        let settings = self.shared.settings;
        let mut state = self.shared.lock();
        if state.shutdown {
            return Err(PoolError::ShutDown {
                pool: self.shared.name.clone(),
            });
        }

        if state.workers < settings.core_threads {
            state.workers += 1;
            drop(state);
            return self.spawn_worker(Some(task));
        }

        if self.shared.can_enqueue(&state) {
            state.queue.push_back(task);
            let orphaned = state.workers == 0;
            if orphaned {
                state.workers += 1;
            }
            drop(state);
            self.shared.available.notify_one();
            return if orphaned {
                self.spawn_worker(None)
            } else {
                Ok(())
            };
        }

        if state.workers < settings.max_threads {
            state.workers += 1;
            drop(state);
            return self.spawn_worker(Some(task));
        }

        match settings.rejection_policy {
            RejectionPolicy::Abort => {
                drop(state);
                debug!(target: POOL_TARGET, pool = %self.shared.name, "task rejected");
                Err(PoolError::Saturated {
                    pool: self.shared.name.clone(),
                })
            }
            RejectionPolicy::CallerRuns => {
                drop(state);
                debug!(target: POOL_TARGET, pool = %self.shared.name, "running task on caller");
                self.shared.run(task);
                Ok(())
            }
            RejectionPolicy::DiscardOldest => {
                let Some(evicted) = state.queue.pop_front() else {
                    drop(state);
                    debug!(target: POOL_TARGET, pool = %self.shared.name, "task discarded");
                    return Err(PoolError::Discarded {
                        pool: self.shared.name.clone(),
                    });
                };
                state.queue.push_back(task);
                drop(state);
                drop(evicted);
                debug!(target: POOL_TARGET, pool = %self.shared.name, "oldest queued task discarded");
                self.shared.available.notify_one();
                Ok(())
            }
        }
    }

    fn spawn_worker(&self, first: Option<Task>) -> Result<(), PoolError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("{}-{id}", self.shared.name))
            .spawn(move || run_worker(&shared, first))
            .map(drop)
            .map_err(|source| {
                let mut state = self.shared.lock();
                state.workers -= 1;
                if state.workers == 0 {
                    self.shared.terminated.notify_all();
                }
                PoolError::Spawn {
                    pool: self.shared.name.clone(),
                    source,
                }
            })
    }

    /// Stops accepting work; queued tasks still run.
    pub fn shutdown(&self) {
        self.shared.lock().shutdown = true;
        self.shared.available.notify_all();
    }

    /// Stops accepting work and drops every queued task, returning how many
    /// were dropped. Running tasks are not interrupted.
    #[must_use]
    pub fn shutdown_now(&self) -> usize {
        let dropped: Vec<Task> = {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.queue.drain(..).collect()
        };
        self.shared.available.notify_all();
        dropped.len()
    }

    /// Waits up to `timeout` for every worker to exit after shutdown.
    /// Returns `true` when the pool has terminated.
    #[must_use]
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        while !(state.shutdown && state.workers == 0) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            state = self
                .shared
                .terminated
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Shuts down, waits up to `grace` for queued and running tasks, then
    /// drops whatever is still queued. Returns `true` when the pool drained
    /// within the grace period.
    #[must_use]
    pub fn drain(&self, grace: Duration) -> bool {
        self.shutdown();
        if self.await_termination(grace) {
            return true;
        }
        let dropped = self.shutdown_now();
        warn!(
            target: POOL_TARGET,
            pool = %self.shared.name,
            dropped,
            "pool did not drain in time; queued tasks dropped"
        );
        false
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("settings", &self.shared.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::mpsc::channel;

    use rstest::rstest;

    use super::*;

    fn settings(core: usize, max: usize, queue: usize, policy: RejectionPolicy) -> PoolSettings {
        PoolSettings {
            core_threads: core,
            max_threads: max,
            queue_capacity: queue,
            keep_alive: Duration::ZERO,
            rejection_policy: policy,
        }
    }

    /// Occupies every thread of a one-thread pool until the returned sender
    /// fires.
    fn block_single_worker(pool: &WorkerPool) -> mpsc::Sender<()> {
        let (release, blocked) = channel::<()>();
        let started = Arc::new(Barrier::new(2));
        let entered = Arc::clone(&started);
        pool.execute(move || {
            entered.wait();
            blocked.recv().unwrap_or_default();
        })
        .expect("blocking task");
        started.wait();
        release
    }

    #[test]
    fn runs_submitted_tasks_on_named_threads() {
        let pool = WorkerPool::new("test-pool", settings(1, 1, 4, RejectionPolicy::Abort));
        let name = pool
            .submit(|| thread::current().name().map(str::to_owned))
            .expect("submit")
            .wait()
            .expect("result");
        assert_eq!(name.as_deref(), Some("test-pool-1"));
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(2)));
    }

    #[test]
    fn abort_rejects_when_saturated() {
        let pool = WorkerPool::new("abort", settings(1, 1, 1, RejectionPolicy::Abort));
        let release = block_single_worker(&pool);
        pool.execute(|| {}).expect("queued");
        let error = pool.execute(|| {}).expect_err("saturated");
        assert!(error.is_saturation());
        release.send(()).expect("release");
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(2)));
    }

    #[test]
    fn caller_runs_on_submitting_thread() {
        let pool = WorkerPool::new("caller", settings(1, 1, 0, RejectionPolicy::CallerRuns));
        let release = block_single_worker(&pool);
        let caller = thread::current().id();
        let (tx, rx) = channel();
        pool.execute(move || tx.send(thread::current().id()).expect("send"))
            .expect("caller runs");
        assert_eq!(rx.recv().expect("ran"), caller);
        release.send(()).expect("release");
        pool.shutdown();
    }

    #[test]
    fn discard_oldest_evicts_queued_task() {
        let pool = WorkerPool::new("discard", settings(1, 1, 1, RejectionPolicy::DiscardOldest));
        let release = block_single_worker(&pool);
        let evicted = pool.submit(|| "old").expect("queued");
        let kept = pool.submit(|| "new").expect("replaces oldest");
        assert_eq!(evicted.wait(), Err(TaskError::Dropped));
        release.send(()).expect("release");
        assert_eq!(kept.wait(), Ok("new"));
        pool.shutdown();
    }

    #[test]
    fn discard_oldest_drops_incoming_when_nothing_is_queued() {
        let pool = WorkerPool::new("handoff", settings(1, 1, 0, RejectionPolicy::DiscardOldest));
        let release = block_single_worker(&pool);
        let error = pool.execute(|| {}).expect_err("dropped");
        assert!(matches!(error, PoolError::Discarded { .. }));
        release.send(()).expect("release");
        pool.shutdown();
    }

    #[test]
    fn grows_beyond_core_when_queue_is_full() {
        let pool = WorkerPool::new("grow", settings(1, 2, 0, RejectionPolicy::Abort));
        let first = block_single_worker(&pool);
        let second = block_single_worker(&pool);
        assert_eq!(pool.workers(), 2);
        assert!(pool.execute(|| {}).is_err());
        first.send(()).expect("release");
        second.send(()).expect("release");
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(2)));
    }

    #[test]
    fn idle_workers_retire_after_keep_alive() {
        let pool = WorkerPool::new(
            "retire",
            PoolSettings {
                keep_alive: Duration::from_millis(50),
                ..settings(2, 2, 4, RejectionPolicy::Abort)
            },
        );
        pool.submit(|| ()).expect("submit").wait().expect("ran");
        let deadline = Instant::now() + Duration::from_secs(2);
        while pool.workers() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.workers(), 0);
        pool.submit(|| ()).expect("respawns").wait().expect("ran");
        pool.shutdown();
    }

    #[test]
    fn timed_out_task_is_flagged_and_skipped() {
        let pool = WorkerPool::new("timeout", settings(1, 1, 4, RejectionPolicy::Abort));
        let release = block_single_worker(&pool);
        let (tx, rx) = channel::<()>();
        let handle = pool
            .submit(move || tx.send(()).expect("send"))
            .expect("queued");
        assert_eq!(
            handle.wait_timeout(Duration::from_millis(20)),
            Err(TaskError::TimedOut(Duration::from_millis(20)))
        );
        assert!(handle.is_cancelled());
        release.send(()).expect("release");
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(2)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn panics_are_reported_to_the_waiter() {
        let pool = WorkerPool::new("panics", settings(1, 1, 4, RejectionPolicy::Abort));
        let outcome = pool
            .submit(|| -> u8 { panic!("worker exploded") })
            .expect("submit")
            .wait();
        assert_eq!(outcome, Err(TaskError::Panicked("worker exploded".into())));
        assert_eq!(pool.submit(|| 1).expect("still alive").wait(), Ok(1));
        pool.shutdown();
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn rejects_work_after_shutdown(#[case] now: bool) {
        let pool = WorkerPool::new("closed", settings(1, 1, 4, RejectionPolicy::CallerRuns));
        if now {
            assert_eq!(pool.shutdown_now(), 0);
        } else {
            pool.shutdown();
        }
        assert!(matches!(pool.execute(|| {}), Err(PoolError::ShutDown { .. })));
        assert!(pool.await_termination(Duration::from_millis(10)));
    }

    #[test]
    fn drain_drops_queued_tasks_after_grace() {
        let pool = WorkerPool::new("drain", settings(1, 1, 4, RejectionPolicy::Abort));
        let release = block_single_worker(&pool);
        let queued = pool.submit(|| ()).expect("queued");
        assert!(!pool.drain(Duration::from_millis(20)));
        assert_eq!(queued.wait(), Err(TaskError::Dropped));
        release.send(()).expect("release");
        assert!(pool.await_termination(Duration::from_secs(2)));
    }
}
