//! Element descriptions: the declarative tree-of-records the engine consumes.
//!
//! An [`Element`] describes one node of the desired tree for a single render.
//! Elements are plain immutable data built with the builder methods here (no
//! authoring syntax lives in this crate); the reconciler compares them
//! against the committed tree by key and type to decide reuse.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::hooks::Hooks;

// ---------------------------------------------------------------------------
// Props
// ---------------------------------------------------------------------------

/// Ordered string attribute map for host elements and components.
///
/// `PartialEq` is what drives the commit-phase update diff: a host node whose
/// committed props equal its proposed props produces no `Update` effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Props {
    attrs: BTreeMap<String, String>,
}

impl Props {
    /// Empty props.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute (builder).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set an attribute in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Whether no attributes are set.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Iterate attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Component functions
// ---------------------------------------------------------------------------

/// The body of a function component: renders props (and hook state) into an
/// element description.
///
/// Identity is what the reconciler compares when deciding whether an existing
/// component node can be reused: plain `fn` items compare by function
/// address, shared closures by `Rc` pointer identity. A closure wrapped anew
/// on every parent render therefore never matches its previous self — keep
/// the `Rc` alive across renders if reuse matters.
#[derive(Clone)]
pub enum ComponentFn {
    /// A plain function item. The common case; stable identity for free.
    Fn(fn(&mut Hooks<'_>, &Props) -> Element),
    /// A shared closure; identity is the allocation.
    Shared(Rc<dyn Fn(&mut Hooks<'_>, &Props) -> Element>),
}

impl ComponentFn {
    /// Invoke the component body.
    pub fn render(&self, hooks: &mut Hooks<'_>, props: &Props) -> Element {
        match self {
            ComponentFn::Fn(f) => f(hooks, props),
            ComponentFn::Shared(f) => f(hooks, props),
        }
    }
}

impl PartialEq for ComponentFn {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ComponentFn::Fn(a), ComponentFn::Fn(b)) => *a as usize == *b as usize,
            (ComponentFn::Shared(a), ComponentFn::Shared(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ComponentFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentFn::Fn(p) => write!(f, "ComponentFn::Fn({:#x})", *p as usize),
            ComponentFn::Shared(_) => write!(f, "ComponentFn::Shared(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// ElementRef
// ---------------------------------------------------------------------------

/// A ref slot attached to a host element.
///
/// The commit phase's layout pass stores an erased clone of the host
/// instance handle here once the node is current; deletion clears it.
/// Identity (for re-attach detection) is the slot allocation.
#[derive(Clone, Default)]
pub struct ElementRef {
    slot: Rc<RefCell<Option<Rc<dyn Any>>>>,
}

impl ElementRef {
    /// Create an empty, unattached ref.
    pub fn new() -> Self {
        Self::default()
    }

    /// The attached host handle, downcast to the backend's instance type.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.slot
            .borrow()
            .as_ref()
            .and_then(|any| any.downcast_ref::<T>().cloned())
    }

    /// Whether a handle is currently attached.
    pub fn is_attached(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub(crate) fn attach(&self, handle: Rc<dyn Any>) {
        *self.slot.borrow_mut() = Some(handle);
    }

    pub(crate) fn detach(&self) {
        *self.slot.borrow_mut() = None;
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("attached", &self.is_attached())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// One node of a declarative tree description.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A host element: rendered by the backend as a real widget.
    Host(HostElement),
    /// A host text node.
    Text(String),
    /// A keyed grouping node with no host presence of its own.
    Fragment(FragmentElement),
    /// A function component invocation.
    Component(ComponentElement),
}

/// Description of a host element.
#[derive(Debug, Clone, PartialEq)]
pub struct HostElement {
    pub kind: String,
    pub key: Option<String>,
    pub props: Props,
    pub children: Vec<Element>,
    pub node_ref: Option<ElementRef>,
}

/// Description of a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentElement {
    pub key: Option<String>,
    pub children: Vec<Element>,
}

/// Description of a function component invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentElement {
    pub component: ComponentFn,
    pub key: Option<String>,
    pub props: Props,
}

impl Element {
    /// A host element with the given kind (e.g. `"div"`, `"panel"`).
    pub fn host(kind: impl Into<String>) -> Element {
        Element::Host(HostElement {
            kind: kind.into(),
            key: None,
            props: Props::new(),
            children: Vec::new(),
            node_ref: None,
        })
    }

    /// A text node.
    pub fn text(content: impl Into<String>) -> Element {
        Element::Text(content.into())
    }

    /// A fragment wrapping the given children.
    pub fn fragment(children: impl IntoIterator<Item = Element>) -> Element {
        Element::Fragment(FragmentElement {
            key: None,
            children: children.into_iter().collect(),
        })
    }

    /// A function component from a plain `fn` item.
    pub fn component(f: fn(&mut Hooks<'_>, &Props) -> Element) -> Element {
        Element::Component(ComponentElement {
            component: ComponentFn::Fn(f),
            key: None,
            props: Props::new(),
        })
    }

    /// A function component from a shared closure.
    ///
    /// Keep the same `Rc` across renders, or the node remounts every time.
    pub fn component_shared(f: Rc<dyn Fn(&mut Hooks<'_>, &Props) -> Element>) -> Element {
        Element::Component(ComponentElement {
            component: ComponentFn::Shared(f),
            key: None,
            props: Props::new(),
        })
    }

    /// Set the reconciliation key (builder).
    pub fn key(mut self, key: impl Into<String>) -> Element {
        let key = Some(key.into());
        match &mut self {
            Element::Host(h) => h.key = key,
            Element::Fragment(f) => f.key = key,
            Element::Component(c) => c.key = key,
            Element::Text(_) => {}
        }
        self
    }

    /// Set an attribute (builder). No-op on text and fragments.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Element {
        match &mut self {
            Element::Host(h) => h.props.set(name, value),
            Element::Component(c) => c.props.set(name, value),
            Element::Text(_) | Element::Fragment(_) => {}
        }
        self
    }

    /// Replace the props wholesale (builder).
    pub fn props(mut self, props: Props) -> Element {
        match &mut self {
            Element::Host(h) => h.props = props,
            Element::Component(c) => c.props = props,
            Element::Text(_) | Element::Fragment(_) => {}
        }
        self
    }

    /// Append a child (builder). No-op on text and components.
    pub fn child(mut self, child: Element) -> Element {
        match &mut self {
            Element::Host(h) => h.children.push(child),
            Element::Fragment(f) => f.children.push(child),
            Element::Text(_) | Element::Component(_) => {}
        }
        self
    }

    /// Append several children (builder).
    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Element {
        match &mut self {
            Element::Host(h) => h.children.extend(children),
            Element::Fragment(f) => f.children.extend(children),
            Element::Text(_) | Element::Component(_) => {}
        }
        self
    }

    /// Attach a ref slot (builder). Host elements only.
    pub fn node_ref(mut self, node_ref: ElementRef) -> Element {
        if let Element::Host(h) = &mut self {
            h.node_ref = Some(node_ref);
        }
        self
    }

    /// The reconciliation key, if any.
    pub fn get_key(&self) -> Option<&str> {
        match self {
            Element::Host(h) => h.key.as_deref(),
            Element::Fragment(f) => f.key.as_deref(),
            Element::Component(c) => c.key.as_deref(),
            Element::Text(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_hooks: &mut Hooks<'_>, _props: &Props) -> Element {
        Element::text("noop")
    }

    fn other(_hooks: &mut Hooks<'_>, _props: &Props) -> Element {
        Element::text("other")
    }

    #[test]
    fn host_builder() {
        let el = Element::host("panel")
            .key("left")
            .attr("title", "Files")
            .child(Element::text("hello"));
        match el {
            Element::Host(h) => {
                assert_eq!(h.kind, "panel");
                assert_eq!(h.key.as_deref(), Some("left"));
                assert_eq!(h.props.get("title"), Some("Files"));
                assert_eq!(h.children.len(), 1);
            }
            other => panic!("expected host element, got {other:?}"),
        }
    }

    #[test]
    fn props_equality_drives_diff() {
        let a = Props::new().with("x", "1").with("y", "2");
        let b = Props::new().with("y", "2").with("x", "1");
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with("x", "3"));
    }

    #[test]
    fn component_fn_identity_by_address() {
        assert_eq!(ComponentFn::Fn(noop), ComponentFn::Fn(noop));
        assert_ne!(ComponentFn::Fn(noop), ComponentFn::Fn(other));
    }

    #[test]
    fn component_shared_identity_by_allocation() {
        let f: Rc<dyn Fn(&mut Hooks<'_>, &Props) -> Element> =
            Rc::new(|_, _| Element::text("x"));
        let g: Rc<dyn Fn(&mut Hooks<'_>, &Props) -> Element> =
            Rc::new(|_, _| Element::text("x"));
        assert_eq!(
            ComponentFn::Shared(f.clone()),
            ComponentFn::Shared(f.clone())
        );
        assert_ne!(ComponentFn::Shared(f), ComponentFn::Shared(g));
    }

    #[test]
    fn element_ref_roundtrip() {
        let r = ElementRef::new();
        assert!(!r.is_attached());
        r.attach(Rc::new(42usize));
        assert_eq!(r.get::<usize>(), Some(42));
        r.detach();
        assert!(!r.is_attached());
    }

    #[test]
    fn element_ref_identity() {
        let a = ElementRef::new();
        let b = a.clone();
        let c = ElementRef::new();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn key_on_text_is_ignored() {
        let el = Element::text("t").key("k");
        assert_eq!(el.get_key(), None);
    }

    #[test]
    fn fragment_children() {
        let el = Element::fragment([Element::text("a"), Element::text("b")]).key("frag");
        match el {
            Element::Fragment(f) => {
                assert_eq!(f.children.len(), 2);
                assert_eq!(f.key.as_deref(), Some("frag"));
            }
            other => panic!("expected fragment, got {other:?}"),
        }
    }
}
