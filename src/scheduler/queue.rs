//! The scheduler proper: two min-heap task pools and a time slice.
//!
//! The ready pool is ordered by `(expiration, insertion)`, the delayed pool
//! by `(start, insertion)`; the insertion counter breaks ties FIFO. The
//! driver protocol is pull-based so an embedding engine can run the task
//! body with full access to its own state:
//!
//! 1. [`Scheduler::take_due`] pops the most urgent ready task.
//! 2. The embedder executes it.
//! 3. [`Scheduler::reinstall`] puts an interrupted task back at its original
//!    position (same id, same deadline), or [`Scheduler::complete`] retires
//!    it.
//!
//! Cancellation nulls the payload in place; heap entries are discarded
//! lazily when they surface.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use slotmap::SlotMap;

use super::clock::Clock;
use super::task::{duration_us, DueTask, Task, TaskId};
use super::Priority;

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

/// Tunable scheduler parameters.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How long the driver may run before `should_yield` turns true.
    pub frame_budget: Duration,
    /// Timeout offset for [`Priority::UserBlocking`].
    pub user_blocking_timeout: Duration,
    /// Timeout offset for [`Priority::Normal`].
    pub normal_timeout: Duration,
    /// Timeout offset for [`Priority::Low`].
    pub low_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_millis(5),
            user_blocking_timeout: Duration::from_millis(250),
            normal_timeout: Duration::from_millis(5_000),
            low_timeout: Duration::from_millis(10_000),
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time slice (builder).
    pub fn with_frame_budget(mut self, budget: Duration) -> Self {
        self.frame_budget = budget;
        self
    }
}

// ---------------------------------------------------------------------------
// Heap entries
// ---------------------------------------------------------------------------

/// Heap key: `(sort, seq)` with the task id carried along. Derived `Ord` is
/// lexicographic, giving FIFO order among equal sort indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    sort_us: i64,
    seq: u64,
    id: TaskId,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// A cooperative scheduler over payloads of type `T`.
///
/// One instance per engine; the payload type is whatever unit of work the
/// embedder dispatches on.
pub struct Scheduler<T> {
    tasks: SlotMap<TaskId, Task<T>>,
    ready: BinaryHeap<Reverse<HeapEntry>>,
    delayed: BinaryHeap<Reverse<HeapEntry>>,
    seq: u64,
    clock: Box<dyn Clock>,
    config: SchedulerConfig,
    /// Start of the current driver slice, µs.
    slice_start_us: i64,
    paused: bool,
}

impl<T> Scheduler<T> {
    /// Create a scheduler over the given clock.
    pub fn new(clock: Box<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            tasks: SlotMap::with_key(),
            ready: BinaryHeap::new(),
            delayed: BinaryHeap::new(),
            seq: 0,
            clock,
            config,
            slice_start_us: 0,
            paused: false,
        }
    }

    /// Current clock reading in microseconds.
    pub fn now_us(&self) -> i64 {
        duration_us(self.clock.now())
    }

    /// Schedule a task at the given priority, optionally delayed.
    pub fn schedule(&mut self, priority: Priority, payload: T, delay: Option<Duration>) -> TaskId {
        let now = self.now_us();
        let start = match delay {
            Some(d) if !d.is_zero() => now + duration_us(d),
            _ => now,
        };
        let expiration = start + priority.timeout_us(&self.config);

        let id = self.tasks.insert(Task {
            payload: Some(payload),
            cancelled: false,
            priority,
            start_us: start,
            expiration_us: expiration,
        });
        let seq = self.next_seq();

        if start > now {
            self.delayed.push(Reverse(HeapEntry {
                sort_us: start,
                seq,
                id,
            }));
        } else {
            self.ready.push(Reverse(HeapEntry {
                sort_us: expiration,
                seq,
                id,
            }));
        }
        id
    }

    /// Cancel a task in place. The heap entry stays put and is discarded
    /// when it next surfaces.
    pub fn cancel(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.get_mut(id) {
            task.payload = None;
            task.cancelled = true;
        }
    }

    /// Pop the most urgent ready task, migrating due timers first.
    ///
    /// Returns `None` when paused or when no task is ready.
    pub fn take_due(&mut self) -> Option<DueTask<T>> {
        if self.paused {
            return None;
        }
        let now = self.now_us();
        self.advance_timers(now);

        loop {
            let Reverse(entry) = *self.ready.peek()?;
            let Some(task) = self.tasks.get_mut(entry.id) else {
                self.ready.pop();
                continue;
            };
            let Some(payload) = task.payload.take() else {
                // Cancelled in place; discard lazily.
                self.ready.pop();
                self.tasks.remove(entry.id);
                continue;
            };
            self.ready.pop();
            return Some(DueTask {
                id: entry.id,
                payload,
                priority: task.priority,
                sort_us: entry.sort_us,
                seq: entry.seq,
                expiration_us: task.expiration_us,
            });
        }
    }

    /// Put an interrupted task back at its original heap position.
    ///
    /// This is the continuation mechanism: the task keeps its id, deadline,
    /// and FIFO rank, so at most one continuation is outstanding per task.
    /// A task cancelled while it was running is dropped instead.
    pub fn reinstall(&mut self, due: DueTask<T>) {
        match self.tasks.get_mut(due.id) {
            Some(task) if !task.cancelled => {
                task.payload = Some(due.payload);
                self.ready.push(Reverse(HeapEntry {
                    sort_us: due.sort_us,
                    seq: due.seq,
                    id: due.id,
                }));
            }
            _ => {
                self.tasks.remove(due.id);
            }
        }
    }

    /// Retire a finished task.
    pub fn complete(&mut self, due: DueTask<T>) {
        self.tasks.remove(due.id);
    }

    /// Whether any task is ready to run right now.
    pub fn has_ready_work(&mut self) -> bool {
        if self.paused {
            return false;
        }
        let now = self.now_us();
        self.advance_timers(now);
        loop {
            let Some(&Reverse(entry)) = self.ready.peek() else {
                return false;
            };
            match self.tasks.get(entry.id) {
                Some(task) if task.payload.is_some() => return true,
                Some(_) => {
                    self.ready.pop();
                    self.tasks.remove(entry.id);
                }
                None => {
                    self.ready.pop();
                }
            }
        }
    }

    /// The id of the most urgent ready task, if any.
    pub fn first_task_id(&mut self) -> Option<TaskId> {
        if !self.has_ready_work() {
            return None;
        }
        self.ready.peek().map(|Reverse(entry)| entry.id)
    }

    /// Time until the earliest pending timer fires, if only delayed work
    /// remains.
    pub fn next_timer_delay(&self) -> Option<Duration> {
        let Reverse(entry) = self.delayed.peek()?;
        let now = self.now_us();
        let wait = (entry.sort_us - now).max(0);
        Some(Duration::from_micros(wait as u64))
    }

    /// Mark the start of a driver slice; `should_yield` measures from here.
    pub fn start_slice(&mut self) {
        self.slice_start_us = self.now_us();
    }

    /// Whether the current slice's budget is exhausted.
    pub fn should_yield(&self) -> bool {
        let elapsed = self.now_us() - self.slice_start_us;
        elapsed >= duration_us(self.config.frame_budget)
    }

    /// Stop handing out tasks until [`Scheduler::resume`].
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume handing out tasks.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Replace the time slice budget.
    pub fn set_frame_budget(&mut self, budget: Duration) {
        self.config.frame_budget = budget;
    }

    /// Move timers whose start has passed into the ready pool, keyed by
    /// their expiration. Cancelled timers are dropped here.
    fn advance_timers(&mut self, now_us: i64) {
        while let Some(&Reverse(entry)) = self.delayed.peek() {
            let Some(task) = self.tasks.get(entry.id) else {
                self.delayed.pop();
                continue;
            };
            if task.payload.is_none() {
                self.delayed.pop();
                self.tasks.remove(entry.id);
                continue;
            }
            if task.start_us > now_us {
                break;
            }
            let expiration_us = task.expiration_us;
            self.delayed.pop();
            let seq = self.next_seq();
            self.ready.push(Reverse(HeapEntry {
                sort_us: expiration_us,
                seq,
                id: entry.id,
            }));
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
