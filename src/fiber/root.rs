//! Per-root bookkeeping: pending lanes, the scheduled callback, and effects
//! waiting for the passive flush.

use crate::fiber::FiberId;
use crate::hooks::EffectHook;
use crate::host::HostBackend;
use crate::lane::{Lane, Lanes};
use crate::scheduler::TaskId;

/// Passive effects carried from commit to the deferred flush.
///
/// Unmount cleanups are taken out of their fibers at deletion time (the
/// fibers are freed before the flush runs); update effects are still alive
/// and are reached through their fiber ids.
#[derive(Default)]
pub(crate) struct PendingPassive {
    pub unmount: Vec<EffectHook>,
    pub update: Vec<FiberId>,
}

impl PendingPassive {
    pub fn is_empty(&self) -> bool {
        self.unmount.is_empty() && self.update.is_empty()
    }
}

/// A mounted root: the container handle, the current tree, and scheduling
/// state.
pub(crate) struct RootContainer<H: HostBackend> {
    pub container: H::Container,
    /// The committed root fiber. Swapped at the end of each commit.
    pub current: FiberId,
    /// Lanes with updates somewhere under this root.
    pub pending_lanes: Lanes,
    /// A completed work-in-progress tree awaiting commit.
    pub finished_work: Option<FiberId>,
    pub finished_lane: Lane,
    /// The scheduler task driving this root, if any.
    pub callback_handle: Option<TaskId>,
    pub callback_priority: Lane,
    /// Guards against scheduling more than one passive flush per commit
    /// batch.
    pub passive_scheduled: bool,
    pub pending_passive: PendingPassive,
}

impl<H: HostBackend> RootContainer<H> {
    pub fn new(container: H::Container, current: FiberId) -> Self {
        Self {
            container,
            current,
            pending_lanes: Lanes::NONE,
            finished_work: None,
            finished_lane: Lane::NONE,
            callback_handle: None,
            callback_priority: Lane::NONE,
            passive_scheduled: false,
            pending_passive: PendingPassive::default(),
        }
    }

    /// Record that an update at `lane` exists somewhere under this root.
    pub fn mark_updated(&mut self, lane: Lane) {
        self.pending_lanes = self.pending_lanes.merge(lane);
    }

    /// Record that a render at `lane` committed.
    pub fn mark_finished(&mut self, lane: Lane) {
        self.pending_lanes = self.pending_lanes.remove(lane);
    }
}
