//! The render-phase work loop: begin (top-down) and complete (bottom-up).
//!
//! `perform_unit_of_work` runs one fiber through `begin_work`; when a node
//! has no more children to descend into, `complete_unit_of_work` walks back
//! up, materializing host instances and bubbling effect flags, until it
//! finds a sibling to descend into or reaches the root.

pub(crate) mod begin;
pub(crate) mod complete;
