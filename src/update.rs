//! Pending state transitions, tagged with the lane they were scheduled at.
//!
//! An update queue is a FIFO of transitions against a base state. A render
//! pass at lane `L` folds exactly the updates whose lane is `L`, in arrival
//! order, and leaves the rest pending; the consumed updates are returned so
//! an aborted pass can push them back unchanged.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::element::Element;
use crate::lane::Lane;

/// An update queue shared between the two fiber buffers.
pub type SharedQueue<S> = Rc<RefCell<UpdateQueue<S>>>;

// ---------------------------------------------------------------------------
// Update / Action
// ---------------------------------------------------------------------------

/// A state transition: either a replacement value or a function of the
/// previous state.
#[derive(Clone)]
pub enum Action<S> {
    Replace(S),
    Compute(Rc<dyn Fn(&S) -> S>),
}

impl<S> Action<S> {
    fn apply(&self, base: &S) -> S
    where
        S: Clone,
    {
        match self {
            Action::Replace(value) => value.clone(),
            Action::Compute(f) => f(base),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
            Action::Compute(_) => f.debug_tuple("Compute").field(&"<fn>").finish(),
        }
    }
}

/// One pending transition and the lane it belongs to.
#[derive(Debug, Clone)]
pub struct Update<S> {
    pub action: Action<S>,
    pub lane: Lane,
}

impl<S> Update<S> {
    pub fn new(action: Action<S>, lane: Lane) -> Self {
        Self { action, lane }
    }
}

// ---------------------------------------------------------------------------
// UpdateQueue
// ---------------------------------------------------------------------------

/// FIFO queue of pending updates. Oldest at the front.
#[derive(Debug, Clone, Default)]
pub struct UpdateQueue<S> {
    pending: VecDeque<Update<S>>,
}

impl<S: Clone> UpdateQueue<S> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, update: Update<S>) {
        self.pending.push_back(update);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Fold the updates matching `lane` into `base`, in arrival order.
    ///
    /// Non-matching updates stay pending in their original order. The
    /// consumed updates are handed back for the abort log; see
    /// [`UpdateQueue::restore`].
    pub fn process(&mut self, base: &S, lane: Lane) -> (S, Vec<Update<S>>) {
        let mut state = base.clone();
        let mut consumed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.pending.len());
        for update in self.pending.drain(..) {
            if update.lane == lane {
                state = update.action.apply(&state);
                consumed.push(update);
            } else {
                kept.push_back(update);
            }
        }
        self.pending = kept;
        (state, consumed)
    }

    /// Put consumed updates back at the front, preserving their original
    /// order relative to everything still pending. Used when a render pass
    /// is abandoned before commit.
    pub fn restore(&mut self, consumed: Vec<Update<S>>) {
        for update in consumed.into_iter().rev() {
            self.pending.push_front(update);
        }
    }

    /// Union of lanes across pending updates.
    pub fn pending_lanes(&self) -> crate::lane::Lanes {
        let mut lanes = crate::lane::Lanes::NONE;
        for update in &self.pending {
            lanes = lanes.merge(update.lane);
        }
        lanes
    }
}

// ---------------------------------------------------------------------------
// ConsumedUpdates
// ---------------------------------------------------------------------------

/// Updates folded by an in-flight render pass, held so an abort can put
/// them back. Dropped without restoring once the pass commits.
pub(crate) enum ConsumedUpdates {
    Root {
        queue: SharedQueue<Option<Element>>,
        consumed: Vec<Update<Option<Element>>>,
    },
    Hook {
        queue: SharedQueue<Rc<dyn Any>>,
        consumed: Vec<Update<Rc<dyn Any>>>,
    },
}

impl ConsumedUpdates {
    pub(crate) fn restore(self) {
        match self {
            ConsumedUpdates::Root { queue, consumed } => queue.borrow_mut().restore(consumed),
            ConsumedUpdates::Hook { queue, consumed } => queue.borrow_mut().restore(consumed),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
