//! Engine error types.

use thiserror::Error;

/// Errors surfaced by the engine's public operations.
///
/// These are structural faults: a handle that no longer resolves, or an
/// arena link that should exist but does not. Render-phase failures are not
/// represented here; a failed render pass is discarded and logged, and the
/// committed tree stays as it was.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A root handle does not resolve to a live root.
    #[error("root not found")]
    RootNotFound,

    /// A root fiber has no update queue attached.
    #[error("root fiber has no update queue")]
    MissingUpdateQueue,

    /// Placement could not find a host parent above the inserted node.
    #[error("no host parent above placed node")]
    HostParentNotFound,

    /// The work loop produced a node with no committed counterpart where one
    /// was required.
    #[error("work-in-progress node has no alternate")]
    MissingAlternate,

    /// A fiber's props or state do not match the shape its tag requires.
    #[error("fiber shape does not match its tag")]
    MalformedFiber,
}

pub type Result<T> = std::result::Result<T, EngineError>;
