//! Headless testing support: an in-memory host backend and a harness.
//!
//! Use the [`Harness`] to drive an [`Engine`](crate::engine::Engine) over a
//! [`MemoryHost`] with a manual clock: render, advance time, flush slices,
//! and assert on the recorded host operations or the rendered tree text.

pub mod harness;
pub mod memory;

pub use harness::Harness;
pub use memory::{HostOp, MemoryHost};
