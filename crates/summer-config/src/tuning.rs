//! Worker pool, admission and socket tuning for the dispatch server.

use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// What a saturated worker pool does with a task it cannot accept.
///
/// Every layer parses through [`std::str::FromStr`], so `abort`, `CALLER_RUNS`
/// and `Discard-Oldest` are all accepted; output is kebab-case.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(try_from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum RejectionPolicy {
    /// Reject the task immediately.
    #[strum(serialize = "abort")]
    Abort,
    /// Run the task on the submitting thread.
    #[default]
    #[strum(to_string = "caller-runs", serialize = "caller_runs")]
    CallerRuns,
    /// Evict the oldest queued task and retry the submission.
    #[strum(to_string = "discard-oldest", serialize = "discard_oldest")]
    DiscardOldest,
}

impl TryFrom<String> for RejectionPolicy {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

impl From<RejectionPolicy> for String {
    fn from(policy: RejectionPolicy) -> Self {
        policy.to_string()
    }
}

/// Invalid combinations of tuning values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TuningError {
    /// `core_threads` was zero.
    #[error("core threads must be > 0")]
    ZeroCoreThreads,
    /// `max_threads` was below `core_threads`.
    #[error("max threads ({max}) must be >= core threads ({core})")]
    MaxBelowCore {
        /// Configured core threads.
        core: usize,
        /// Configured max threads.
        max: usize,
    },
    /// `max_concurrent_requests` was zero.
    #[error("max concurrent requests must be > 0")]
    ZeroMaxConcurrentRequests,
    /// `socket_backlog` was zero.
    #[error("socket backlog must be > 0")]
    ZeroSocketBacklog,
}

/// Validated dispatch server tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerTuning {
    core_threads: usize,
    max_threads: usize,
    queue_capacity: usize,
    keep_alive_seconds: u64,
    max_concurrent_requests: usize,
    request_timeout_millis: u64,
    socket_backlog: u32,
    rejection_policy: RejectionPolicy,
}

impl ServerTuning {
    /// Starts from the defaults derived from the host's parallelism.
    #[must_use]
    pub fn builder() -> ServerTuningBuilder {
        ServerTuningBuilder::default()
    }

    /// Threads kept alive while idle, unless keep-alive retires them.
    #[must_use]
    pub const fn core_threads(&self) -> usize {
        self.core_threads
    }

    /// Upper bound on pool threads.
    #[must_use]
    pub const fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Queued tasks allowed before spawning beyond core; 0 means direct
    /// handoff.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Idle period after which a pool thread retires.
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }

    /// Idle period in seconds.
    #[must_use]
    pub const fn keep_alive_seconds(&self) -> u64 {
        self.keep_alive_seconds
    }

    /// Requests admitted at once.
    #[must_use]
    pub const fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// Handler deadline in milliseconds; 0 disables the route pool.
    #[must_use]
    pub const fn request_timeout_millis(&self) -> u64 {
        self.request_timeout_millis
    }

    /// Handler deadline, when enabled.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_millis > 0)
            .then(|| Duration::from_millis(self.request_timeout_millis))
    }

    /// Listen backlog passed to the socket.
    #[must_use]
    pub const fn socket_backlog(&self) -> u32 {
        self.socket_backlog
    }

    /// Behaviour when a pool and its queue are saturated.
    #[must_use]
    pub const fn rejection_policy(&self) -> RejectionPolicy {
        self.rejection_policy
    }
}

impl Default for ServerTuning {
    fn default() -> Self {
        ServerTuningBuilder::default().assemble()
    }
}

/// Builder for [`ServerTuning`]; [`ServerTuningBuilder::build`] validates.
#[derive(Debug, Clone)]
pub struct ServerTuningBuilder {
    core_threads: usize,
    max_threads: usize,
    queue_capacity: usize,
    keep_alive_seconds: u64,
    max_concurrent_requests: usize,
    request_timeout_millis: u64,
    socket_backlog: u32,
    rejection_policy: RejectionPolicy,
}

impl Default for ServerTuningBuilder {
    fn default() -> Self {
        let processors = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let core_threads = processors.max(2);
        Self {
            core_threads,
            max_threads: core_threads.max(processors.saturating_mul(2)),
            queue_capacity: 256,
            keep_alive_seconds: 30,
            max_concurrent_requests: 512,
            request_timeout_millis: 0,
            socket_backlog: 1024,
            rejection_policy: RejectionPolicy::CallerRuns,
        }
    }
}

impl ServerTuningBuilder {
    /// Sets the core thread count.
    #[must_use]
    pub const fn core_threads(mut self, value: usize) -> Self {
        self.core_threads = value;
        self
    }

    /// Sets the maximum thread count.
    #[must_use]
    pub const fn max_threads(mut self, value: usize) -> Self {
        self.max_threads = value;
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn queue_capacity(mut self, value: usize) -> Self {
        self.queue_capacity = value;
        self
    }

    /// Sets the idle keep-alive in seconds.
    #[must_use]
    pub const fn keep_alive_seconds(mut self, value: u64) -> Self {
        self.keep_alive_seconds = value;
        self
    }

    /// Sets the admission limit.
    #[must_use]
    pub const fn max_concurrent_requests(mut self, value: usize) -> Self {
        self.max_concurrent_requests = value;
        self
    }

    /// Sets the handler deadline in milliseconds.
    #[must_use]
    pub const fn request_timeout_millis(mut self, value: u64) -> Self {
        self.request_timeout_millis = value;
        self
    }

    /// Sets the listen backlog.
    #[must_use]
    pub const fn socket_backlog(mut self, value: u32) -> Self {
        self.socket_backlog = value;
        self
    }

    /// Sets the rejection policy.
    #[must_use]
    pub const fn rejection_policy(mut self, value: RejectionPolicy) -> Self {
        self.rejection_policy = value;
        self
    }

    /// Validates and freezes the tuning.
    ///
    /// # Errors
    ///
    /// Returns [`TuningError`] for the first violated constraint.
    pub const fn build(self) -> Result<ServerTuning, TuningError> {
        if self.core_threads == 0 {
            return Err(TuningError::ZeroCoreThreads);
        }
        if self.max_threads < self.core_threads {
            return Err(TuningError::MaxBelowCore {
                core: self.core_threads,
                max: self.max_threads,
            });
        }
        if self.max_concurrent_requests == 0 {
            return Err(TuningError::ZeroMaxConcurrentRequests);
        }
        if self.socket_backlog == 0 {
            return Err(TuningError::ZeroSocketBacklog);
        }
        Ok(self.assemble())
    }

    const fn assemble(self) -> ServerTuning {
        ServerTuning {
            core_threads: self.core_threads,
            max_threads: self.max_threads,
            queue_capacity: self.queue_capacity,
            keep_alive_seconds: self.keep_alive_seconds,
            max_concurrent_requests: self.max_concurrent_requests,
            request_timeout_millis: self.request_timeout_millis,
            socket_backlog: self.socket_backlog,
            rejection_policy: self.rejection_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_follow_parallelism() {
        let tuning = ServerTuning::default();
        assert!(tuning.core_threads() >= 2);
        assert!(tuning.max_threads() >= tuning.core_threads());
        assert_eq!(tuning.queue_capacity(), 256);
        assert_eq!(tuning.keep_alive(), Duration::from_secs(30));
        assert_eq!(tuning.max_concurrent_requests(), 512);
        assert_eq!(tuning.request_timeout(), None);
        assert_eq!(tuning.socket_backlog(), 1024);
        assert_eq!(tuning.rejection_policy(), RejectionPolicy::CallerRuns);
    }

    #[rstest]
    #[case(ServerTuning::builder().core_threads(0), TuningError::ZeroCoreThreads)]
    #[case(
        ServerTuning::builder().core_threads(4).max_threads(2),
        TuningError::MaxBelowCore { core: 4, max: 2 }
    )]
    #[case(
        ServerTuning::builder().max_concurrent_requests(0),
        TuningError::ZeroMaxConcurrentRequests
    )]
    #[case(ServerTuning::builder().socket_backlog(0), TuningError::ZeroSocketBacklog)]
    fn rejects_invalid_tuning(#[case] builder: ServerTuningBuilder, #[case] expected: TuningError) {
        assert_eq!(builder.build().expect_err("invalid tuning"), expected);
    }

    #[test]
    fn zero_queue_capacity_is_allowed() {
        let tuning = ServerTuning::builder()
            .core_threads(1)
            .max_threads(1)
            .queue_capacity(0)
            .request_timeout_millis(100)
            .build()
            .expect("direct handoff tuning");
        assert_eq!(tuning.queue_capacity(), 0);
        assert_eq!(tuning.request_timeout(), Some(Duration::from_millis(100)));
    }

    #[rstest]
    #[case("abort", RejectionPolicy::Abort)]
    #[case("ABORT", RejectionPolicy::Abort)]
    #[case("caller-runs", RejectionPolicy::CallerRuns)]
    #[case("CALLER_RUNS", RejectionPolicy::CallerRuns)]
    #[case("discard_oldest", RejectionPolicy::DiscardOldest)]
    #[case("Discard-Oldest", RejectionPolicy::DiscardOldest)]
    fn parses_rejection_policies(#[case] input: &str, #[case] expected: RejectionPolicy) {
        assert_eq!(input.parse::<RejectionPolicy>().expect("policy"), expected);
    }

    #[test]
    fn displays_kebab_case_policy() {
        assert_eq!(RejectionPolicy::DiscardOldest.to_string(), "discard-oldest");
    }
}
