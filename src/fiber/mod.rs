//! The fiber tree: mutable work records arranged in two buffers.
//!
//! Every node of the committed tree has a `Fiber` in the arena; a render
//! pass builds a parallel work-in-progress buffer linked to it through
//! `alternate`, and commit swaps which buffer is current.

pub mod flags;
pub(crate) mod node;
pub(crate) mod root;

pub use flags::Flags;
pub use node::FiberId;
pub(crate) use node::{create_work_in_progress, ElementType, Fiber, FiberProps, StateNode, WorkTag};
pub(crate) use root::RootContainer;

slotmap::new_key_type! {
    /// Handle to a mounted root.
    pub struct RootId;
}
