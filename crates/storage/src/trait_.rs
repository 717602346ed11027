//! Storage trait abstraction.

use std::path::PathBuf;

use async_trait::async_trait;
use progmon_core::GoalState;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No persisted state at the given path
    #[error("state file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Persisted state exists but is unreadable or invalid
    #[error("{0}")]
    Corrupt(String),
}

impl From<StorageError> for progmon_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => progmon_core::Error::Io(e),
            StorageError::Json(e) => progmon_core::Error::Json(e),
            StorageError::NotFound(path) => {
                progmon_core::Error::NotFound(format!("state file {}", path.display()))
            }
            StorageError::Corrupt(msg) => progmon_core::Error::CorruptState(msg),
        }
    }
}

/// Durable home for one goal's state.
///
/// A store is bound to a single location; exactly one process is expected
/// to write to it at a time.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist the full state, replacing whatever was stored before.
    ///
    /// Readers must observe either the previous or the new state, never a
    /// partial one.
    async fn save(&self, state: &GoalState) -> Result<()>;

    /// Load the stored state.
    ///
    /// Returns `StorageError::NotFound` when nothing has been stored yet and
    /// `StorageError::Corrupt` when the stored state fails validation.
    async fn load(&self) -> Result<GoalState>;

    /// Whether any state is stored.
    async fn exists(&self) -> Result<bool>;

    /// Remove the stored state. Returns `false` if there was nothing to remove.
    async fn delete(&self) -> Result<bool>;

    /// Human-readable location, used in logs and messages.
    fn location(&self) -> String;
}
