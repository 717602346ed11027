//! Monitor configuration.

use std::path::{Path, PathBuf};

use progmon_storage::JsonStateStore;

/// Where a monitor keeps its state and how eagerly callers persist it.
///
/// The state file is always passed in explicitly, so several monitors can
/// live in one process without sharing a default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Path of the JSON state document
    pub state_file: PathBuf,

    /// Persist after every mutating command
    pub auto_save: bool,
}

impl MonitorConfig {
    /// Config for the given state file, with auto-save on.
    pub fn new(state_file: impl AsRef<Path>) -> Self {
        Self {
            state_file: state_file.as_ref().to_path_buf(),
            auto_save: true,
        }
    }

    /// Turn auto-save on or off.
    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    /// The JSON store for this config's state file.
    pub fn store(&self) -> JsonStateStore {
        JsonStateStore::new(&self.state_file)
    }
}
