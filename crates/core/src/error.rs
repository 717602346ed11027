//! Error type shared by every progmon layer.

use crate::id::TaskId;
use crate::task::{TaskAction, TaskStatus};

/// Result alias for progmon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by task, monitor and persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The task state machine does not allow this action from the current state.
    #[error("invalid transition: cannot {action} task '{task}' while it is {from}")]
    InvalidTransition {
        /// Task the action was attempted on
        task: TaskId,
        /// Attempted action
        action: TaskAction,
        /// Status at the time of the attempt
        from: TaskStatus,
    },

    /// Out-of-range or malformed input.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The action needs a prior condition that does not hold.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A task with this id already exists.
    #[error("duplicate task id: {0}")]
    DuplicateId(TaskId),

    /// Task or state file not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Persisted document could not be parsed or violates the model invariants.
    #[error("corrupt state: {0}")]
    CorruptState(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
