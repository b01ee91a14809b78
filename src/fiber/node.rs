//! Fiber records and the double-buffer link.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::element::{ComponentFn, Element, ElementRef, Props};
use crate::fiber::flags::Flags;
use crate::fiber::RootId;
use crate::hooks::Hook;
use crate::host::HostBackend;
use crate::update::SharedQueue;

new_key_type! {
    /// Arena handle to a fiber.
    pub struct FiberId;
}

/// What kind of work a fiber represents. Closed set; begin/complete match
/// on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkTag {
    Root,
    HostElement,
    HostText,
    FunctionComponent,
    Fragment,
}

/// Reconciliation identity: a fiber is reusable for an element only when
/// their types compare equal (and keys match).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ElementType {
    Root,
    Host(String),
    Text,
    Component(ComponentFn),
    Fragment,
}

/// Input props for one render of a fiber, shaped per tag.
#[derive(Debug, Clone)]
pub(crate) enum FiberProps {
    None,
    Host { props: Props, children: Vec<Element> },
    Text(String),
    Component(Props),
    Fragment(Vec<Element>),
}

impl FiberProps {
    /// The props an element proposes for the fiber that will render it.
    pub fn of_element(element: &Element) -> FiberProps {
        match element {
            Element::Host(h) => FiberProps::Host {
                props: h.props.clone(),
                children: h.children.clone(),
            },
            Element::Text(content) => FiberProps::Text(content.clone()),
            Element::Fragment(f) => FiberProps::Fragment(f.children.clone()),
            Element::Component(c) => FiberProps::Component(c.props.clone()),
        }
    }
}

/// The fiber's link to what the host backend materialized for it.
pub(crate) enum StateNode<H: HostBackend> {
    None,
    Root(RootId),
    Instance(H::Instance),
    Text(H::TextInstance),
}

impl<H: HostBackend> Clone for StateNode<H> {
    fn clone(&self) -> Self {
        match self {
            StateNode::None => StateNode::None,
            StateNode::Root(id) => StateNode::Root(*id),
            StateNode::Instance(i) => StateNode::Instance(i.clone()),
            StateNode::Text(t) => StateNode::Text(t.clone()),
        }
    }
}

/// One node of the work tree.
///
/// Tree links (`parent`, `child`, `sibling`) are arena handles; `alternate`
/// points at the same logical node in the other buffer. State that must
/// survive across renders (`hooks`, `update_queue`) is `Rc`-shared between
/// the two buffers rather than copied.
pub(crate) struct Fiber<H: HostBackend> {
    pub tag: WorkTag,
    pub key: Option<String>,
    pub element_type: ElementType,

    pub pending_props: FiberProps,
    pub memoized_props: FiberProps,
    /// Root fibers only: the element committed by the last finished render.
    pub memoized_element: Option<Element>,
    /// Function components only.
    pub hooks: Vec<Hook>,
    /// Root fibers only; shared with the alternate.
    pub update_queue: Option<SharedQueue<Option<Element>>>,

    pub parent: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub index: u32,
    pub alternate: Option<FiberId>,

    pub flags: Flags,
    pub subtree_flags: Flags,
    pub deletions: SmallVec<[FiberId; 4]>,

    pub state_node: StateNode<H>,
    pub node_ref: Option<ElementRef>,
}

impl<H: HostBackend> Fiber<H> {
    pub fn new(
        tag: WorkTag,
        key: Option<String>,
        element_type: ElementType,
        pending_props: FiberProps,
    ) -> Self {
        Self {
            tag,
            key,
            element_type,
            pending_props,
            memoized_props: FiberProps::None,
            memoized_element: None,
            hooks: Vec::new(),
            update_queue: None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            alternate: None,
            flags: Flags::NONE,
            subtree_flags: Flags::NONE,
            deletions: SmallVec::new(),
            state_node: StateNode::None,
            node_ref: None,
        }
    }

    /// A fiber describing the given element, detached from any tree.
    pub fn of_element(element: &Element) -> Self {
        let (tag, element_type, node_ref) = match element {
            Element::Host(h) => (WorkTag::HostElement, ElementType::Host(h.kind.clone()), h.node_ref.clone()),
            Element::Text(_) => (WorkTag::HostText, ElementType::Text, None),
            Element::Fragment(_) => (WorkTag::Fragment, ElementType::Fragment, None),
            Element::Component(c) => (
                WorkTag::FunctionComponent,
                ElementType::Component(c.component.clone()),
                None,
            ),
        };
        let mut fiber = Fiber::new(
            tag,
            element.get_key().map(str::to_owned),
            element_type,
            FiberProps::of_element(element),
        );
        fiber.node_ref = node_ref;
        fiber
    }

    /// Whether this fiber can render `element` in place (same type; keys are
    /// checked by the reconciler before calling this).
    pub fn matches_element(&self, element: &Element) -> bool {
        match (&self.element_type, element) {
            (ElementType::Host(kind), Element::Host(h)) => *kind == h.kind,
            (ElementType::Text, Element::Text(_)) => true,
            (ElementType::Fragment, Element::Fragment(_)) => true,
            (ElementType::Component(f), Element::Component(c)) => *f == c.component,
            _ => false,
        }
    }
}

/// Get or build the work-in-progress counterpart of `current`, primed with
/// `pending_props`.
///
/// The alternate is reused when it exists (the buffers ping-pong; no
/// allocation after the first two renders); otherwise a twin is created and
/// the fibers are linked both ways. Persistent state is carried over,
/// per-pass effect state is reset.
pub(crate) fn create_work_in_progress<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    current: FiberId,
    pending_props: FiberProps,
) -> FiberId {
    let existing = arena[current].alternate;
    match existing {
        Some(wip) => {
            let (element_type, key, memoized_props, memoized_element, hooks, update_queue, state_node, child, index, node_ref) = {
                let cur = &arena[current];
                (
                    cur.element_type.clone(),
                    cur.key.clone(),
                    cur.memoized_props.clone(),
                    cur.memoized_element.clone(),
                    cur.hooks.clone(),
                    cur.update_queue.clone(),
                    cur.state_node.clone(),
                    cur.child,
                    cur.index,
                    cur.node_ref.clone(),
                )
            };
            let node = &mut arena[wip];
            node.pending_props = pending_props;
            node.flags = Flags::NONE;
            node.subtree_flags = Flags::NONE;
            node.deletions.clear();
            node.sibling = None;
            node.element_type = element_type;
            node.key = key;
            node.memoized_props = memoized_props;
            node.memoized_element = memoized_element;
            node.hooks = hooks;
            node.update_queue = update_queue;
            node.state_node = state_node;
            node.child = child;
            node.index = index;
            node.node_ref = node_ref;
            wip
        }
        None => {
            let twin = {
                let cur = &arena[current];
                let mut twin = Fiber::new(
                    cur.tag,
                    cur.key.clone(),
                    cur.element_type.clone(),
                    pending_props,
                );
                twin.memoized_props = cur.memoized_props.clone();
                twin.memoized_element = cur.memoized_element.clone();
                twin.hooks = cur.hooks.clone();
                twin.update_queue = cur.update_queue.clone();
                twin.state_node = cur.state_node.clone();
                twin.child = cur.child;
                twin.index = cur.index;
                twin.node_ref = cur.node_ref.clone();
                twin.alternate = Some(current);
                twin
            };
            let wip = arena.insert(twin);
            arena[current].alternate = Some(wip);
            wip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Props;

    struct NullHost;
    impl HostBackend for NullHost {
        type Container = ();
        type Instance = usize;
        type TextInstance = usize;
        fn create_instance(&mut self, _: &str, _: &Props) -> usize {
            0
        }
        fn create_text_instance(&mut self, _: &str) -> usize {
            0
        }
        fn append_initial_child(&mut self, _: &usize, _: &crate::host::ChildOf<Self>) {}
        fn append_child_to_container(&mut self, _: &(), _: &crate::host::ChildOf<Self>) {}
        fn insert_child_before(
            &mut self,
            _: &crate::host::ParentOf<Self>,
            _: &crate::host::ChildOf<Self>,
            _: &crate::host::ChildOf<Self>,
        ) {
        }
        fn append_child(&mut self, _: &crate::host::ParentOf<Self>, _: &crate::host::ChildOf<Self>) {}
        fn commit_instance_update(&mut self, _: &usize, _: &Props) {}
        fn commit_text_update(&mut self, _: &usize, _: &str) {}
        fn remove_child(&mut self, _: &crate::host::ParentOf<Self>, _: &crate::host::ChildOf<Self>) {}
    }

    #[test]
    fn wip_is_created_once_then_reused() {
        let mut arena: SlotMap<FiberId, Fiber<NullHost>> = SlotMap::with_key();
        let current = arena.insert(Fiber::of_element(&Element::host("panel")));

        let wip = create_work_in_progress(&mut arena, current, FiberProps::None);
        assert_eq!(arena[current].alternate, Some(wip));
        assert_eq!(arena[wip].alternate, Some(current));

        let again = create_work_in_progress(&mut arena, current, FiberProps::None);
        assert_eq!(again, wip);
    }

    #[test]
    fn wip_resets_effect_state() {
        let mut arena: SlotMap<FiberId, Fiber<NullHost>> = SlotMap::with_key();
        let current = arena.insert(Fiber::of_element(&Element::host("panel")));
        let wip = create_work_in_progress(&mut arena, current, FiberProps::None);

        arena[wip].flags = Flags::PLACEMENT;
        arena[wip].subtree_flags = Flags::UPDATE;
        arena[wip].deletions.push(current);

        let wip = create_work_in_progress(&mut arena, current, FiberProps::None);
        assert!(arena[wip].flags.is_empty());
        assert!(arena[wip].subtree_flags.is_empty());
        assert!(arena[wip].deletions.is_empty());
    }

    #[test]
    fn matches_element_compares_type() {
        let panel: Fiber<NullHost> = Fiber::of_element(&Element::host("panel"));
        assert!(panel.matches_element(&Element::host("panel")));
        assert!(!panel.matches_element(&Element::host("list")));
        assert!(!panel.matches_element(&Element::text("x")));
    }
}
