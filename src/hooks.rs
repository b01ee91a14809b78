//! Hook state: per-component persistent cells, addressed by call order.
//!
//! A function component's state lives in its fiber as a `Vec<Hook>`; each
//! `use_*` call during a render claims the next slot. Identity is therefore
//! positional: a component must call the same hooks in the same order on
//! every render. Violations panic, as does reading a state cell at the wrong
//! type.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::fiber::{FiberId, Flags};
use crate::lane::Lane;
use crate::update::{Action, ConsumedUpdates, SharedQueue, Update, UpdateQueue};

// ---------------------------------------------------------------------------
// Hook cells
// ---------------------------------------------------------------------------

/// Cleanup returned by an effect body, run before re-fire and on unmount.
pub type EffectCleanup = Box<dyn FnMut()>;

/// Marks what an effect hook should do this commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct EffectTag(pub u8);

impl EffectTag {
    /// Fire (destroy then create) during the next passive flush.
    pub const HAS_EFFECT: EffectTag = EffectTag(1);
    /// Deferred flush, after commit returns.
    pub const PASSIVE: EffectTag = EffectTag(1 << 1);

    pub fn contains(self, other: EffectTag) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn clear(self, other: EffectTag) -> EffectTag {
        EffectTag(self.0 & !other.0)
    }
}

impl std::ops::BitOr for EffectTag {
    type Output = EffectTag;
    fn bitor(self, rhs: Self) -> Self::Output {
        EffectTag(self.0 | rhs.0)
    }
}

/// A state cell: the memoized value plus its pending-update queue.
///
/// The queue is shared between the current fiber and its work-in-progress
/// alternate, so a dispatch lands regardless of which buffer is live.
#[derive(Clone)]
pub(crate) struct StateHook {
    pub value: Rc<dyn Any>,
    pub queue: SharedQueue<Rc<dyn Any>>,
}

/// An effect cell. The destroy slot is shared across buffers so the cleanup
/// captured by one commit is visible to the next.
#[derive(Clone)]
pub(crate) struct EffectHook {
    pub tag: EffectTag,
    pub create: Rc<dyn Fn() -> Option<EffectCleanup>>,
    pub destroy: Rc<RefCell<Option<EffectCleanup>>>,
    pub deps: Option<Vec<u64>>,
}

#[derive(Clone)]
pub(crate) enum Hook {
    State(StateHook),
    Effect(EffectHook),
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::State(_) => f.write_str("Hook::State"),
            Hook::Effect(e) => f.debug_struct("Hook::Effect").field("tag", &e.tag).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbox
// ---------------------------------------------------------------------------

/// Where setters deposit update requests for the engine to pick up.
///
/// A dispatch writes into the hook's own queue immediately; the inbox only
/// records which fiber needs scheduling and at what lane. The engine drains
/// it at flush boundaries, so dispatches made mid-render batch naturally.
pub(crate) struct Inbox {
    pub requests: RefCell<Vec<(FiberId, Lane)>>,
    pub current_lane: Cell<Lane>,
}

impl Inbox {
    pub fn new() -> Self {
        Self {
            requests: RefCell::new(Vec::new()),
            current_lane: Cell::new(Lane::SYNC),
        }
    }

    pub fn drain(&self) -> Vec<(FiberId, Lane)> {
        std::mem::take(&mut *self.requests.borrow_mut())
    }
}

// ---------------------------------------------------------------------------
// Setter
// ---------------------------------------------------------------------------

/// Handle for updating one state cell from outside the render.
///
/// Cheap to clone and safe to hold past the component's unmount; a dispatch
/// against an unmounted fiber is silently dropped at the next flush.
pub struct Setter<T> {
    fiber: FiberId,
    queue: SharedQueue<Rc<dyn Any>>,
    inbox: Rc<Inbox>,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            fiber: self.fiber,
            queue: self.queue.clone(),
            inbox: self.inbox.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + 'static> Setter<T> {
    /// Replace the state value.
    pub fn set(&self, value: T) {
        self.dispatch(Action::Replace(Rc::new(value) as Rc<dyn Any>));
    }

    /// Compute the next value from the previous one. Transitions queued
    /// behind other transitions see their results, not the render-time
    /// snapshot.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.dispatch(Action::Compute(Rc::new(move |prev: &Rc<dyn Any>| {
            let prev = prev.downcast_ref::<T>().expect("state hook type mismatch");
            Rc::new(f(prev)) as Rc<dyn Any>
        })));
    }

    fn dispatch(&self, action: Action<Rc<dyn Any>>) {
        let lane = self.inbox.current_lane.get();
        self.queue.borrow_mut().enqueue(Update::new(action, lane));
        self.inbox.requests.borrow_mut().push((self.fiber, lane));
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("fiber", &self.fiber).finish()
    }
}

// ---------------------------------------------------------------------------
// Hooks context
// ---------------------------------------------------------------------------

/// The hook cursor handed to a component body for the duration of one render.
pub struct Hooks<'a> {
    hooks: &'a mut Vec<Hook>,
    cursor: usize,
    mounting: bool,
    fiber: FiberId,
    render_lane: Lane,
    inbox: Rc<Inbox>,
    consumed: &'a mut Vec<ConsumedUpdates>,
    flags: Flags,
}

impl<'a> Hooks<'a> {
    pub(crate) fn new(
        hooks: &'a mut Vec<Hook>,
        mounting: bool,
        fiber: FiberId,
        render_lane: Lane,
        inbox: Rc<Inbox>,
        consumed: &'a mut Vec<ConsumedUpdates>,
    ) -> Self {
        Self {
            hooks,
            cursor: 0,
            mounting,
            fiber,
            render_lane,
            inbox,
            consumed,
            flags: Flags::NONE,
        }
    }

    /// Flags accumulated by hook calls, merged into the fiber after render.
    pub(crate) fn collected_flags(&self) -> Flags {
        self.flags
    }

    /// A persistent state cell. Returns the current value and a setter.
    ///
    /// `initial` runs only on mount. Pending transitions at the render lane
    /// are folded into the value here, in dispatch order.
    pub fn use_state<T: Clone + 'static>(&mut self, initial: impl FnOnce() -> T) -> (T, Setter<T>) {
        if self.mounting && self.cursor == self.hooks.len() {
            self.hooks.push(Hook::State(StateHook {
                value: Rc::new(initial()),
                queue: Rc::new(RefCell::new(UpdateQueue::new())),
            }));
        }
        let Some(Hook::State(hook)) = self.hooks.get_mut(self.cursor) else {
            panic!("hook order mismatch: expected use_state at slot {}", self.cursor);
        };
        self.cursor += 1;

        let (value, consumed) = hook
            .queue
            .borrow_mut()
            .process(&hook.value, self.render_lane);
        if !consumed.is_empty() {
            self.consumed.push(ConsumedUpdates::Hook {
                queue: hook.queue.clone(),
                consumed,
            });
        }
        hook.value = value.clone();

        let current = value
            .downcast_ref::<T>()
            .cloned()
            .expect("state hook type mismatch");
        let setter = Setter {
            fiber: self.fiber,
            queue: hook.queue.clone(),
            inbox: self.inbox.clone(),
            _marker: PhantomData,
        };
        (current, setter)
    }

    /// A side effect, run after commit.
    ///
    /// `deps` are hashed dependency values (see [`crate::deps!`]); `None`
    /// re-fires on every commit, `Some` re-fires only when the hashes
    /// change. The effect's cleanup runs before re-fire and on unmount.
    pub fn use_effect(
        &mut self,
        deps: Option<Vec<u64>>,
        create: impl Fn() -> Option<EffectCleanup> + 'static,
    ) {
        if self.mounting && self.cursor == self.hooks.len() {
            self.hooks.push(Hook::Effect(EffectHook {
                tag: EffectTag::HAS_EFFECT | EffectTag::PASSIVE,
                create: Rc::new(create),
                destroy: Rc::new(RefCell::new(None)),
                deps,
            }));
            self.cursor += 1;
            self.flags |= Flags::PASSIVE_EFFECT;
            return;
        }
        let Some(Hook::Effect(hook)) = self.hooks.get_mut(self.cursor) else {
            panic!("hook order mismatch: expected use_effect at slot {}", self.cursor);
        };
        self.cursor += 1;

        let unchanged = matches!((&deps, &hook.deps), (Some(a), Some(b)) if a == b);
        hook.create = Rc::new(create);
        hook.deps = deps;
        if unchanged {
            hook.tag = EffectTag::PASSIVE;
        } else {
            hook.tag = EffectTag::HAS_EFFECT | EffectTag::PASSIVE;
            self.flags |= Flags::PASSIVE_EFFECT;
        }
    }
}

/// Hash a list of dependency values for [`Hooks::use_effect`].
///
/// `deps![]` means "never re-fire"; omit the deps argument (`None`) for
/// "re-fire every commit".
#[macro_export]
macro_rules! deps {
    () => { Some(Vec::new()) };
    ($($dep:expr),+ $(,)?) => {{
        let mut hashes = Vec::new();
        $(
            let mut hasher = ::std::collections::hash_map::DefaultHasher::new();
            ::std::hash::Hash::hash(&($dep), &mut hasher);
            hashes.push(::std::hash::Hasher::finish(&hasher));
        )+
        Some(hashes)
    }};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
