//! progmon core data models.
//!
//! This crate defines the goal/task model that the progress monitor is
//! built on: tasks with a closed status state machine, their append-only
//! checkpoint history, and the persisted goal document.

#![warn(missing_docs)]

// Core identities
mod id;

// Errors
mod error;

// Task execution
mod task;

// Goal document
mod goal;

// Re-exports
pub use id::TaskId;
pub use error::{Error, Result};
pub use task::{Checkpoint, Recovery, Task, TaskAction, TaskStatus, validate_percentage};
pub use goal::GoalState;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;

/// Current time, never earlier than `floor`.
///
/// Keeps `updated_at` and checkpoint timestamps non-decreasing even when the
/// wall clock steps backwards.
pub(crate) fn now_after(floor: Time) -> Time {
    std::cmp::max(chrono::Utc::now(), floor)
}
