//! Error types surfaced at the session API boundary.
//!
//! Asynchronous failures (desync, missing snapshot, capacity exceeded) are
//! absorbed into [`SessionState`] and never appear here; these errors cover
//! only the immediate rejections a caller can act on.
//!
//! [`SessionState`]: crate::screen::SessionState

use thiserror::Error;

/// Immediate rejections returned by session operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A compiled sequence is already being executed; only one allocation
    /// may be in progress at a time.
    #[error("an allocation is already in progress")]
    AllocationInProgress,

    /// The session worker task has shut down and can no longer accept
    /// commands.
    #[error("session worker is not running")]
    WorkerClosed,

    /// A profile store operation failed.
    #[error("profile store error: {0}")]
    Store(String),
}
