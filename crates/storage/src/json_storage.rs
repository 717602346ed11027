//! JSON file storage implementation.
//!
//! Keeps one goal's full state in a single pretty-printed JSON document.
//! Writes go through [`write_text_atomic`], so a reader never sees a
//! half-written file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use progmon_core::GoalState;
use tokio::fs;
use tracing::debug;

use super::atomic::write_text_atomic;
use super::{Result, StateStore, StorageError};

/// File-based JSON storage backend.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Bind a store to a state file. Nothing is touched on disk until the
    /// first save or load.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn save(&self, state: &GoalState) -> Result<()> {
        let mut json = serde_json::to_string_pretty(state)?;
        json.push('\n');
        write_text_atomic(&self.path, &json).await?;

        debug!(path = %self.path.display(), tasks = state.tasks.len(), "saved goal state");
        Ok(())
    }

    async fn load(&self) -> Result<GoalState> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let state: GoalState = serde_json::from_str(&json)
            .map_err(|e| StorageError::Corrupt(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), tasks = state.tasks.len(), "loaded goal state");
        Ok(state)
    }

    async fn exists(&self) -> Result<bool> {
        Ok(fs::try_exists(&self.path).await?)
    }

    async fn delete(&self) -> Result<bool> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "deleted goal state");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
