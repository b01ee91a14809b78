//! The engine: roots, the fiber arena, and the render drivers.
//!
//! One `Engine` owns everything: the host backend, every fiber of every
//! root, the scheduler, and the in-flight render state. All public entry
//! points funnel into the same two drivers, a synchronous one that runs a
//! pass to completion and a concurrent one that yields between units of
//! work when the time slice runs out.

use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use slotmap::SlotMap;

use crate::element::Element;
use crate::error::{EngineError, Result};
use crate::fiber::{
    create_work_in_progress, ElementType, Fiber, FiberId, FiberProps, RootContainer, RootId,
    StateNode, WorkTag,
};
use crate::hooks::Inbox;
use crate::host::HostBackend;
use crate::lane::Lane;
use crate::scheduler::{Clock, MonotonicClock, Priority, Scheduler, SchedulerConfig};
use crate::update::{Action, ConsumedUpdates, Update, UpdateQueue};

/// Work items dispatched through the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineTask {
    /// Render (or resume rendering) the given root.
    RenderRoot(RootId),
    /// Run the deferred passive-effect flush for the given root.
    FlushPassive(RootId),
}

/// How a render attempt ended.
pub(crate) enum RenderOutcome {
    Completed,
    Yielded,
}

pub struct Engine<H: HostBackend> {
    pub(crate) host: H,
    pub(crate) fibers: SlotMap<FiberId, Fiber<H>>,
    pub(crate) roots: SlotMap<RootId, RootContainer<H>>,
    pub(crate) scheduler: Scheduler<EngineTask>,

    /// In-flight render state; survives yields, discarded on preemption.
    pub(crate) wip: Option<FiberId>,
    pub(crate) wip_root: Option<RootId>,
    pub(crate) wip_lane: Lane,
    /// Updates folded by the in-flight pass; restored if it aborts.
    pub(crate) consumed: Vec<ConsumedUpdates>,

    pub(crate) sync_queue: VecDeque<RootId>,
    pub(crate) is_flushing_sync: bool,
    pub(crate) is_flushing_passive: bool,
    pub(crate) inbox: Rc<Inbox>,
}

impl<H: HostBackend> Engine<H> {
    /// An engine over a real clock with default scheduling parameters.
    pub fn new(host: H) -> Self {
        Self::with_clock(host, Box::new(MonotonicClock::new()), SchedulerConfig::default())
    }

    /// An engine with an injected clock, for deterministic tests.
    pub fn with_clock(host: H, clock: Box<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            host,
            fibers: SlotMap::with_key(),
            roots: SlotMap::with_key(),
            scheduler: Scheduler::new(clock, config),
            wip: None,
            wip_root: None,
            wip_lane: Lane::NONE,
            consumed: Vec::new(),
            sync_queue: VecDeque::new(),
            is_flushing_sync: false,
            is_flushing_passive: false,
            inbox: Rc::new(Inbox::new()),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Replace the concurrent driver's time slice.
    pub fn set_frame_budget(&mut self, budget: Duration) {
        self.scheduler.set_frame_budget(budget);
    }

    /// Suspend scheduled (non-sync) work.
    pub fn pause_scheduling(&mut self) {
        self.scheduler.pause();
    }

    pub fn resume_scheduling(&mut self) {
        self.scheduler.resume();
    }

    // -----------------------------------------------------------------------
    // Roots
    // -----------------------------------------------------------------------

    /// Mount a new root on a host container. Empty until the first
    /// [`Engine::update_root`].
    pub fn create_root(&mut self, container: H::Container) -> RootId {
        let mut fiber = Fiber::new(WorkTag::Root, None, ElementType::Root, FiberProps::None);
        fiber.update_queue = Some(Rc::new(std::cell::RefCell::new(UpdateQueue::new())));
        let fiber_id = self.fibers.insert(fiber);
        let root_id = self.roots.insert(RootContainer::new(container, fiber_id));
        self.fibers[fiber_id].state_node = StateNode::Root(root_id);
        root_id
    }

    /// Replace the root's element tree. `None` unmounts everything under
    /// the container.
    ///
    /// The update is queued at the ambient priority's lane; at the default
    /// (sync) priority it renders and commits before returning.
    pub fn update_root(&mut self, root: RootId, element: Option<Element>) -> Result<()> {
        let lane = self.inbox.current_lane.get();
        let fiber_id = self.roots.get(root).ok_or(EngineError::RootNotFound)?.current;
        let queue = self.fibers[fiber_id]
            .update_queue
            .clone()
            .ok_or(EngineError::MissingUpdateQueue)?;
        queue
            .borrow_mut()
            .enqueue(Update::new(Action::Replace(element), lane));

        self.roots[root].mark_updated(lane);
        self.invalidate_in_flight(root, lane);
        self.ensure_root_is_scheduled(root);
        if lane == Lane::SYNC && !self.is_flushing_sync {
            self.flush_sync_callbacks()?;
        }
        Ok(())
    }

    /// An update landed at the lane a yielded pass is already rendering.
    /// That pass may have folded past the update's queue, so it must start
    /// over; resuming would strand the update after commit clears the lane.
    fn invalidate_in_flight(&mut self, root: RootId, lane: Lane) {
        if self.wip_root == Some(root) && self.wip_lane == lane {
            self.restore_consumed();
            self.wip = None;
            self.wip_root = None;
            self.wip_lane = Lane::NONE;
        }
    }

    // -----------------------------------------------------------------------
    // Priorities and dispatch intake
    // -----------------------------------------------------------------------

    /// Run `f` with the ambient update priority set to `priority`, then
    /// flush whatever it queued.
    ///
    /// State dispatched inside `f` batches: one render per root per lane,
    /// no matter how many setters fired.
    pub fn run_with_priority(
        &mut self,
        priority: Priority,
        f: impl FnOnce(&mut Self),
    ) -> Result<()> {
        let previous = self.inbox.current_lane.get();
        self.inbox.current_lane.set(Lane::from_priority(priority));
        f(self);
        self.inbox.current_lane.set(previous);
        self.flush_updates()
    }

    /// Route queued dispatches to their roots and run any synchronous work
    /// that produces.
    pub fn flush_updates(&mut self) -> Result<()> {
        self.drain_dispatches();
        self.flush_sync_callbacks()
    }

    /// Pick up setter dispatches: mark each target's root and make sure a
    /// render is scheduled. Dispatches against unmounted fibers are dropped.
    pub(crate) fn drain_dispatches(&mut self) {
        loop {
            let requests = self.inbox.drain();
            if requests.is_empty() {
                break;
            }
            for (fiber, lane) in requests {
                if !self.fibers.contains_key(fiber) {
                    continue;
                }
                if let Some(root) = self.root_of(fiber) {
                    self.roots[root].mark_updated(lane);
                    self.invalidate_in_flight(root, lane);
                    self.ensure_root_is_scheduled(root);
                } else {
                    log::warn!("dispatch against a detached fiber was dropped");
                }
            }
        }
    }

    /// The root a fiber belongs to, via the parent chain.
    pub(crate) fn root_of(&self, fiber: FiberId) -> Option<RootId> {
        let mut cursor = fiber;
        loop {
            let node = self.fibers.get(cursor)?;
            match node.parent {
                Some(parent) => cursor = parent,
                None => {
                    return match node.state_node {
                        StateNode::Root(root) => Some(root),
                        _ => None,
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Reconcile the root's scheduled callback with its most urgent pending
    /// lane: cancel, keep, or replace.
    pub(crate) fn ensure_root_is_scheduled(&mut self, root: RootId) {
        let next_lane = self.roots[root].pending_lanes.highest_priority();

        if next_lane.is_none() {
            if let Some(handle) = self.roots[root].callback_handle.take() {
                self.scheduler.cancel(handle);
            }
            self.roots[root].callback_priority = Lane::NONE;
            return;
        }

        // Same priority already scheduled: the existing task (or sync queue
        // entry) will pick this up; updates batch.
        if next_lane == self.roots[root].callback_priority {
            return;
        }

        if let Some(handle) = self.roots[root].callback_handle.take() {
            self.scheduler.cancel(handle);
        }

        if next_lane == Lane::SYNC {
            if !self.sync_queue.contains(&root) {
                self.sync_queue.push_back(root);
            }
            self.roots[root].callback_priority = Lane::SYNC;
        } else {
            let handle =
                self.scheduler
                    .schedule(next_lane.to_priority(), EngineTask::RenderRoot(root), None);
            self.roots[root].callback_handle = Some(handle);
            self.roots[root].callback_priority = next_lane;
        }
    }

    /// Run every queued synchronous root to completion, including ones
    /// queued while flushing.
    pub(crate) fn flush_sync_callbacks(&mut self) -> Result<()> {
        if self.is_flushing_sync {
            return Ok(());
        }
        self.is_flushing_sync = true;
        let result = (|| {
            while let Some(root) = self.sync_queue.pop_front() {
                if self.roots.contains_key(root) {
                    self.perform_sync_work_on_root(root)?;
                }
            }
            Ok(())
        })();
        self.is_flushing_sync = false;
        result
    }

    // -----------------------------------------------------------------------
    // Drivers
    // -----------------------------------------------------------------------

    /// Render the root's sync lane to completion and commit.
    pub(crate) fn perform_sync_work_on_root(&mut self, root: RootId) -> Result<()> {
        self.flush_pending_passive(root)?;
        let lane = self.roots[root].pending_lanes.highest_priority();
        if lane != Lane::SYNC {
            // The sync work was superseded (e.g. already rendered); fall
            // back to normal scheduling.
            self.roots[root].callback_priority = Lane::NONE;
            self.ensure_root_is_scheduled(root);
            return Ok(());
        }

        match self.render_root(root, lane, false) {
            Ok(RenderOutcome::Completed) => self.finish_and_commit(root, lane)?,
            Ok(RenderOutcome::Yielded) => unreachable!("sync render cannot yield"),
            Err(err) => self.discard_failed_render(root, lane, err),
        }
        self.roots[root].callback_priority = Lane::NONE;
        self.ensure_root_is_scheduled(root);
        Ok(())
    }

    /// Render the root's most urgent lane, yielding at the time slice
    /// unless the driving task already timed out. Returns whether the task
    /// should continue.
    pub(crate) fn perform_concurrent_work_on_root(
        &mut self,
        root: RootId,
        did_timeout: bool,
    ) -> Result<bool> {
        self.flush_pending_passive(root)?;
        let lane = self.roots[root].pending_lanes.highest_priority();
        if lane.is_none() {
            return Ok(false);
        }
        let allow_yield = lane != Lane::SYNC && !did_timeout;

        match self.render_root(root, lane, allow_yield) {
            Ok(RenderOutcome::Yielded) => return Ok(true),
            Ok(RenderOutcome::Completed) => {
                self.finish_and_commit(root, lane)?;
            }
            Err(err) => self.discard_failed_render(root, lane, err),
        }
        self.roots[root].callback_handle = None;
        self.roots[root].callback_priority = Lane::NONE;
        self.ensure_root_is_scheduled(root);
        Ok(false)
    }

    /// One driver slice: run due tasks until the budget runs out or the
    /// pools are empty. Returns whether ready work remains.
    pub fn flush_scheduled(&mut self) -> Result<bool> {
        self.drain_dispatches();
        self.flush_sync_callbacks()?;
        self.scheduler.start_slice();

        while let Some(due) = self.scheduler.take_due() {
            let did_timeout = due.did_timeout(self.scheduler.now_us());
            match due.payload {
                EngineTask::RenderRoot(root) => {
                    if !self.roots.contains_key(root) {
                        self.scheduler.complete(due);
                        continue;
                    }
                    if self.perform_concurrent_work_on_root(root, did_timeout)? {
                        // Continuation: same task, same deadline.
                        self.scheduler.reinstall(due);
                    } else {
                        self.scheduler.complete(due);
                    }
                }
                EngineTask::FlushPassive(root) => {
                    self.scheduler.complete(due);
                    if self.roots.contains_key(root) {
                        self.flush_passive_effects(root)?;
                    }
                }
            }
            self.drain_dispatches();
            self.flush_sync_callbacks()?;
            if self.scheduler.should_yield() {
                break;
            }
        }
        Ok(self.scheduler.has_ready_work() || !self.sync_queue.is_empty())
    }

    /// Drive everything that is currently runnable to quiescence. Work
    /// behind a pending timer stays pending.
    pub fn flush_until_idle(&mut self) -> Result<()> {
        loop {
            let more = self.flush_scheduled()?;
            if !more && self.sync_queue.is_empty() {
                break;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Render passes
    // -----------------------------------------------------------------------

    /// Run the work loop for `root` at `lane`. Resumes an in-flight pass
    /// when root and lane match; anything else starts over.
    fn render_root(&mut self, root: RootId, lane: Lane, allow_yield: bool) -> Result<RenderOutcome> {
        if self.wip_root != Some(root) || self.wip_lane != lane {
            self.prepare_fresh_stack(root, lane);
        }

        while let Some(unit) = self.wip {
            self.wip = self.perform_unit_of_work(unit)?;
            if allow_yield && self.wip.is_some() && self.scheduler.should_yield() {
                return Ok(RenderOutcome::Yielded);
            }
        }
        Ok(RenderOutcome::Completed)
    }

    /// Reset the work loop onto a fresh work-in-progress tree for `root`,
    /// discarding (and restoring the updates of) any pass in flight.
    fn prepare_fresh_stack(&mut self, root: RootId, lane: Lane) {
        self.restore_consumed();
        let current = self.roots[root].current;
        let wip = create_work_in_progress(&mut self.fibers, current, FiberProps::None);
        self.wip = Some(wip);
        self.wip_root = Some(root);
        self.wip_lane = lane;
        self.roots[root].finished_work = None;
    }

    /// Hand the completed work-in-progress tree to the commit phase.
    fn finish_and_commit(&mut self, root: RootId, lane: Lane) -> Result<()> {
        let current = self.roots[root].current;
        let finished = self.fibers[current]
            .alternate
            .ok_or(EngineError::MissingAlternate)?;
        self.roots[root].finished_work = Some(finished);
        self.roots[root].finished_lane = lane;
        self.wip = None;
        self.wip_root = None;
        self.wip_lane = Lane::NONE;
        self.commit_root(root)
    }

    /// A render pass failed: put its updates back, drop the pass, clear the
    /// lane so the failure does not retry in a loop.
    fn discard_failed_render(&mut self, root: RootId, lane: Lane, err: EngineError) {
        log::error!("render pass failed, discarding: {err}");
        self.restore_consumed();
        self.wip = None;
        self.wip_root = None;
        self.wip_lane = Lane::NONE;
        self.roots[root].pending_lanes = self.roots[root].pending_lanes.remove(lane);
    }

    pub(crate) fn restore_consumed(&mut self) {
        for entry in self.consumed.drain(..).rev() {
            entry.restore();
        }
    }

    fn flush_pending_passive(&mut self, root: RootId) -> Result<()> {
        if !self.roots[root].pending_passive.is_empty() && !self.is_flushing_passive {
            self.flush_passive_effects(root)?;
        }
        Ok(())
    }
}
