//! Cooperative task scheduler: priority min-heaps with time-slicing.
//!
//! A standalone subsystem, independent of the fiber tree. Priorities are
//! converted into deadlines (each priority maps to a fixed timeout offset),
//! unifying comparison into one scalar; two min-heaps hold ready and delayed
//! tasks. The driver pops the most urgent ready task, runs it, and either
//! retires it or reinstalls it as a continuation at the same heap position.

pub mod clock;
pub mod queue;
pub mod task;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use queue::{Scheduler, SchedulerConfig};
pub use task::{DueTask, Priority, TaskId};
