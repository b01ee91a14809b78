//! # weft
//!
//! An incremental tree-reconciliation engine with priority-based cooperative
//! scheduling.
//!
//! weft keeps a committed tree of fibers per root and, on every update,
//! builds a work-in-progress twin by diffing declarative [`element`]
//! descriptions against it. Rendering is resumable: a pass runs unit by
//! unit under a time slice, yields to more urgent work, and only becomes
//! visible in a single commit once the whole tree completed. Host mutations
//! go through a pluggable [`host`] backend, so the same engine drives any
//! widget system.
//!
//! ## Core Systems
//!
//! - **[`element`]** — Declarative element descriptions: hosts, text,
//!   fragments, function components
//! - **[`fiber`]** — Slotmap-backed fiber arena, effect flags, the
//!   double-buffer link
//! - **[`lane`]** — Bitmask priority lanes for pending updates
//! - **[`scheduler`]** — Cooperative task scheduler: deadline min-heaps,
//!   time slices, continuations
//! - **[`hooks`]** — Per-component state and effect cells, addressed by
//!   call order
//! - **[`reconcile`]** — Keyed child diffing with minimal-move reordering
//! - **[`work`]** — The begin/complete work loop
//! - **[`commit`]** — Mutation, layout, and deferred passive-effect passes
//! - **[`engine`]** — Roots, drivers, and the public entry points
//! - **[`testing`]** — In-memory host backend and a deterministic harness

// Foundation
pub mod element;
pub mod error;
pub mod lane;

// Core systems
pub mod fiber;
pub mod hooks;
pub mod scheduler;
pub mod update;

// The render pipeline
pub mod commit;
pub mod host;
pub mod reconcile;
pub mod work;

// Application surface
pub mod engine;

// Test support
pub mod testing;

pub use element::{Element, ElementRef, Props};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use fiber::RootId;
pub use hooks::{EffectCleanup, Hooks, Setter};
pub use host::HostBackend;
pub use lane::{Lane, Lanes};
pub use scheduler::Priority;
