//! Task records and priority levels.

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a scheduled task. Stable across continuations:
    /// an interrupted task reinstalled by the driver keeps its id.
    pub struct TaskId;
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Closed set of scheduling priorities, most urgent first.
///
/// Each level maps to a fixed timeout offset; a task's expiration is its
/// start time plus that offset. An expired task is run without yielding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Already expired on arrival: runs before anything else yields.
    Immediate,
    /// Small timeout; input-driven work.
    UserBlocking,
    /// The default level.
    Normal,
    /// Large timeout; deferrable work.
    Low,
    /// Effectively never expires.
    Idle,
}

/// Timeout offset that never fires in practice (the original scheduler's
/// max 31-bit signed integer, in microseconds).
pub(crate) const IDLE_TIMEOUT_US: i64 = 1_073_741_823 * 1_000;

impl Priority {
    /// The timeout offset converting this priority into a deadline, in µs.
    pub(crate) fn timeout_us(self, config: &super::SchedulerConfig) -> i64 {
        match self {
            Priority::Immediate => -1_000,
            Priority::UserBlocking => duration_us(config.user_blocking_timeout),
            Priority::Normal => duration_us(config.normal_timeout),
            Priority::Low => duration_us(config.low_timeout),
            Priority::Idle => IDLE_TIMEOUT_US,
        }
    }
}

pub(crate) fn duration_us(d: std::time::Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(IDLE_TIMEOUT_US)
}

// ---------------------------------------------------------------------------
// Task / DueTask
// ---------------------------------------------------------------------------

/// A task held in the scheduler's pools.
#[derive(Debug)]
pub(crate) struct Task<T> {
    /// `None` while the driver holds the payload, or after cancellation.
    pub payload: Option<T>,
    /// Set by `cancel`; a cancelled task is discarded lazily on pop or
    /// reinstall, never removed from the heap eagerly.
    pub cancelled: bool,
    pub priority: Priority,
    pub start_us: i64,
    pub expiration_us: i64,
}

/// A ready task handed to the driver for execution.
///
/// Dropping it retires the task; passing it back to
/// [`Scheduler::reinstall`](super::Scheduler::reinstall) keeps the task in
/// the pool at its original position (the continuation mechanism).
#[derive(Debug)]
pub struct DueTask<T> {
    pub id: TaskId,
    pub payload: T,
    pub priority: Priority,
    pub(crate) sort_us: i64,
    pub(crate) seq: u64,
    pub(crate) expiration_us: i64,
}

impl<T> DueTask<T> {
    /// Whether the task's deadline had passed at `now` (the "timed out"
    /// flag passed to callbacks: expired work must not yield).
    pub fn did_timeout(&self, now_us: i64) -> bool {
        self.expiration_us <= now_us
    }
}
