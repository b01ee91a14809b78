//! Host backend interface: the seam between the engine and a concrete
//! widget system.
//!
//! The engine computes effects against the abstract tree; the backend turns
//! them into real mutations. Handle types are associated so a backend can use
//! whatever ids or pointers it likes, as long as they clone cheaply.

use crate::element::Props;

/// A child handle: either an element instance or a text instance.
#[derive(Debug, Clone, PartialEq)]
pub enum HostChild<I, T> {
    Element(I),
    Text(T),
}

/// A removal site: either an element instance or the root container.
#[derive(Debug, Clone, PartialEq)]
pub enum HostParent<I, C> {
    Element(I),
    Container(C),
}

/// Child handle type of a backend.
pub type ChildOf<H> =
    HostChild<<H as HostBackend>::Instance, <H as HostBackend>::TextInstance>;

/// Parent handle type of a backend.
pub type ParentOf<H> =
    HostParent<<H as HostBackend>::Instance, <H as HostBackend>::Container>;

/// The operations a widget system must provide.
///
/// Creation happens during the render phase (off-tree, invisible until
/// commit); the `commit_*`, `append_*_to_container`, `insert_*` and
/// `remove_child` calls happen only inside the commit phase.
pub trait HostBackend {
    /// Root mount point handle.
    type Container: Clone;
    /// Host element instance handle.
    type Instance: Clone + 'static;
    /// Text instance handle.
    type TextInstance: Clone + 'static;

    /// Create a detached element instance.
    fn create_instance(&mut self, kind: &str, props: &Props) -> Self::Instance;

    /// Create a detached text instance.
    fn create_text_instance(&mut self, content: &str) -> Self::TextInstance;

    /// Attach a child to a still-detached parent (initial tree assembly,
    /// render phase).
    fn append_initial_child(&mut self, parent: &Self::Instance, child: &ChildOf<Self>);

    /// Append a child at the end of the container.
    fn append_child_to_container(&mut self, container: &Self::Container, child: &ChildOf<Self>);

    /// Insert a child before an existing sibling.
    fn insert_child_before(
        &mut self,
        parent: &ParentOf<Self>,
        child: &ChildOf<Self>,
        before: &ChildOf<Self>,
    );

    /// Append a child at the end of a live parent.
    fn append_child(&mut self, parent: &ParentOf<Self>, child: &ChildOf<Self>);

    /// Apply changed props to a live instance.
    fn commit_instance_update(&mut self, instance: &Self::Instance, props: &Props);

    /// Replace the content of a live text instance.
    fn commit_text_update(&mut self, text: &Self::TextInstance, content: &str);

    /// Detach a child from its parent.
    fn remove_child(&mut self, parent: &ParentOf<Self>, child: &ChildOf<Self>);
}
