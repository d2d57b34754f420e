use std::time::Duration;

use crate::OverflowPolicy;

/// Shortest accepted dispatch period.
pub(crate) const MIN_DISPATCH_INTERVAL: Duration = Duration::from_millis(1);

/// Runtime configuration for the dispatch loop, queue and connection facade.
///
/// Use the builder methods to customize, or [`Default`] for the values the
/// dashboard ships with.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use sentinel::{Config, OverflowPolicy};
///
/// let config = Config::default()
///     .with_batch_size(20)                              // Drain more per tick
///     .with_queue_capacity(256)
///     .with_overflow_policy(OverflowPolicy::DropOldest)
///     .with_handler_timeout(Some(Duration::from_secs(1)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Period of the dispatch loop.
    /// Default: 100 ms
    pub dispatch_interval: Duration,

    /// Maximum number of envelopes drained from the queue per tick.
    /// Default: 10
    pub batch_size: usize,

    /// Maximum number of pending envelopes.
    /// Default: 1024
    pub queue_capacity: usize,

    /// Behaviour when the queue is full.
    /// Default: [`OverflowPolicy::Reject`]
    pub overflow_policy: OverflowPolicy,

    /// How many times a failed high or critical envelope is re-queued
    /// before being abandoned. Low and medium envelopes are never retried.
    /// Default: 3
    pub max_retries: u32,

    /// Number of transport connect attempts before giving up.
    /// Default: 5
    pub max_connect_attempts: u32,

    /// Base reconnect delay; the wait after failed attempt `n` is `n * reconnect_delay`.
    /// Default: 2 s
    pub reconnect_delay: Duration,

    /// Upper bound for a single subscriber invocation. `None` means unbounded.
    /// Default: 5 s
    pub handler_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dispatch_interval: Duration::from_millis(100),
            batch_size: 10,
            queue_capacity: 1024,
            overflow_policy: OverflowPolicy::default(),
            max_retries: 3,
            max_connect_attempts: 5,
            reconnect_delay: Duration::from_secs(2),
            handler_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl Config {
    /// Set the dispatch period. Anything below one millisecond is raised to it.
    pub fn with_dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval.max(MIN_DISPATCH_INTERVAL);
        self
    }

    /// Set the maximum number of envelopes processed per tick.
    ///
    /// Lower values keep each tick short; higher values drain bursts faster.
    /// Zero is treated as one.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the queue bound. Zero is treated as one.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set how many connect attempts are made before `connect` fails.
    /// Zero is treated as one.
    pub fn with_max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts.max(1);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Apply the builder bounds to values set directly on the fields.
    pub(crate) fn normalized(self) -> Self {
        let interval = self.dispatch_interval;
        let batch_size = self.batch_size;
        let capacity = self.queue_capacity;
        let attempts = self.max_connect_attempts;
        self.with_dispatch_interval(interval)
            .with_batch_size(batch_size)
            .with_queue_capacity(capacity)
            .with_max_connect_attempts(attempts)
    }

    /// Delay to wait after the given (1-based) failed connect attempt.
    pub(crate) fn reconnect_delay_after(&self, attempt: u32) -> Duration {
        self.reconnect_delay.saturating_mul(attempt)
    }
}
