//! Task model - the unit of tracked work and its state machine.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::TaskId;
use crate::{now_after, Time};

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet started
    Pending,
    /// Being worked on
    InProgress,
    /// Finished at 100% (terminal)
    Completed,
    /// Reported failure, recoverable
    Failed,
}

/// Actions that drive task status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskAction {
    /// pending -> in_progress
    Start,
    /// in_progress -> in_progress
    UpdateProgress,
    /// in_progress -> completed
    Complete,
    /// in_progress -> failed
    Fail,
    /// failed -> in_progress
    Recover,
}

impl TaskStatus {
    /// The status reached by applying `action`, or `None` if the state
    /// machine does not allow it.
    ///
    /// This is the only place transition legality is decided.
    pub fn transition(self, action: TaskAction) -> Option<TaskStatus> {
        use TaskAction as A;
        use TaskStatus as S;

        match (self, action) {
            (S::Pending, A::Start) => Some(S::InProgress),
            (S::InProgress, A::UpdateProgress) => Some(S::InProgress),
            (S::InProgress, A::Complete) => Some(S::Completed),
            (S::InProgress, A::Fail) => Some(S::Failed),
            (S::Failed, A::Recover) => Some(S::InProgress),
            _ => None,
        }
    }

    /// Token used in the persisted document.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            TaskAction::Start => "start",
            TaskAction::UpdateProgress => "update progress of",
            TaskAction::Complete => "complete",
            TaskAction::Fail => "fail",
            TaskAction::Recover => "recover",
        };
        f.write_str(verb)
    }
}

/// An immutable snapshot of a task's progress, taken when progress is
/// updated with a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Zero-based position in the owning task's history
    pub sequence_index: usize,

    /// Progress at the time of the checkpoint (0-100)
    pub progress_percentage: f64,

    /// Human label
    pub label: String,

    /// When the checkpoint was taken
    pub timestamp: Time,
}

/// What `recover` hands back to the caller.
///
/// Recovery never rewinds the task by itself: the caller reads the
/// percentage from here and re-applies it with `update_progress`.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// Resume from the most recent checkpoint.
    Checkpoint(Checkpoint),

    /// No checkpoint was ever taken; start over from 0%.
    FreshStart,
}

impl Recovery {
    /// Percentage to resume from.
    pub fn percentage(&self) -> f64 {
        match self {
            Recovery::Checkpoint(cp) => cp.progress_percentage,
            Recovery::FreshStart => 0.0,
        }
    }

    /// Label of the checkpoint, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Recovery::Checkpoint(cp) => Some(&cp.label),
            Recovery::FreshStart => None,
        }
    }

    /// The checkpoint, if any.
    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        match self {
            Recovery::Checkpoint(cp) => Some(cp),
            Recovery::FreshStart => None,
        }
    }
}

/// Check that a percentage is finite and within [0, 100].
pub fn validate_percentage(value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidValue(format!(
            "progress percentage must be within [0, 100], got {}",
            value
        )))
    }
}

/// A task is an individually tracked unit of work.
///
/// Fields are private so that every mutation goes through the state
/// machine; use the accessors to read them.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: TaskId,
    name: String,
    description: String,
    status: TaskStatus,
    progress_percentage: f64,
    checkpoints: Vec<Checkpoint>,
    failure_reason: Option<String>,
    created_at: Time,
    updated_at: Time,
}

impl Task {
    /// Create a new pending task at 0%.
    pub fn new(id: TaskId, name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            name: name.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            progress_percentage: 0.0,
            checkpoints: Vec::new(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a task from persisted fields, checking the model invariants.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: TaskId,
        name: String,
        description: String,
        status: TaskStatus,
        progress_percentage: f64,
        checkpoints: Vec<Checkpoint>,
        failure_reason: Option<String>,
        created_at: Time,
        updated_at: Time,
    ) -> Result<Self> {
        let task = Self {
            id,
            name,
            description,
            status,
            progress_percentage,
            checkpoints,
            failure_reason,
            created_at,
            updated_at,
        };
        task.check_invariants()?;
        Ok(task)
    }

    /// Task id
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Task description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Current status
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Current progress (0-100)
    pub fn progress_percentage(&self) -> f64 {
        self.progress_percentage
    }

    /// Checkpoint history, oldest first
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Most recent checkpoint
    pub fn last_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    /// Reason recorded by the last `fail`, while the task is failed
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Creation timestamp
    pub fn created_at(&self) -> Time {
        self.created_at
    }

    /// Last update timestamp
    pub fn updated_at(&self) -> Time {
        self.updated_at
    }

    /// pending -> in_progress. Progress is left untouched.
    pub fn start(&mut self) -> Result<()> {
        self.status = self.next_status(TaskAction::Start)?;
        self.touch();
        Ok(())
    }

    /// Set progress while in progress; a label also appends a checkpoint.
    ///
    /// Checkpoints are only taken for a non-blank label, so callers that
    /// want to be able to resume must label the update before risky work.
    pub fn update_progress(&mut self, percentage: f64, label: Option<&str>) -> Result<()> {
        let percentage = validate_percentage(percentage)?;
        let label = label.filter(|l| !l.trim().is_empty());
        self.status = self.next_status(TaskAction::UpdateProgress)?;

        self.progress_percentage = percentage;
        self.touch();
        if let Some(label) = label {
            self.checkpoints.push(Checkpoint {
                sequence_index: self.checkpoints.len(),
                progress_percentage: percentage,
                label: label.to_string(),
                timestamp: self.updated_at,
            });
        }
        Ok(())
    }

    /// in_progress -> completed, only at exactly 100%.
    ///
    /// Completing an already completed task is an `InvalidTransition`, not a
    /// silent success.
    pub fn complete(&mut self) -> Result<()> {
        let next = self.next_status(TaskAction::Complete)?;
        if self.progress_percentage != 100.0 {
            return Err(Error::PreconditionFailed(format!(
                "task '{}' is at {}%, progress must be 100% to complete",
                self.id, self.progress_percentage
            )));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// in_progress -> failed. Progress and history stay inspectable.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.status = self.next_status(TaskAction::Fail)?;
        self.failure_reason = Some(reason.into());
        self.touch();
        Ok(())
    }

    /// failed -> in_progress, returning where to resume from.
    ///
    /// Progress is not rewound here. Re-apply `Recovery::percentage` with
    /// `update_progress` to actually roll back.
    pub fn recover(&mut self) -> Result<Recovery> {
        self.status = self.next_status(TaskAction::Recover)?;
        self.failure_reason = None;
        self.touch();
        Ok(match self.checkpoints.last() {
            Some(cp) => Recovery::Checkpoint(cp.clone()),
            None => Recovery::FreshStart,
        })
    }

    fn next_status(&self, action: TaskAction) -> Result<TaskStatus> {
        self.status
            .transition(action)
            .ok_or_else(|| Error::InvalidTransition {
                task: self.id.clone(),
                action,
                from: self.status,
            })
    }

    fn touch(&mut self) {
        self.updated_at = now_after(self.updated_at);
    }

    /// Validate the invariants a persisted task must satisfy.
    pub fn check_invariants(&self) -> Result<()> {
        let corrupt = |msg: String| Error::CorruptState(format!("task '{}': {}", self.id, msg));

        validate_percentage(self.progress_percentage)
            .map_err(|_| corrupt(format!("progress {} outside [0, 100]", self.progress_percentage)))?;

        if self.status == TaskStatus::Completed && self.progress_percentage != 100.0 {
            return Err(corrupt(format!(
                "completed at {}%",
                self.progress_percentage
            )));
        }

        match (self.status, &self.failure_reason) {
            (TaskStatus::Failed, None) => return Err(corrupt("failed without a reason".to_string())),
            (TaskStatus::Failed, Some(_)) | (_, None) => {}
            (status, Some(_)) => {
                return Err(corrupt(format!("failure reason set while {}", status)));
            }
        }

        if self.updated_at < self.created_at {
            return Err(corrupt("updated_at is earlier than created_at".to_string()));
        }

        let mut previous: Option<&Checkpoint> = None;
        for (index, cp) in self.checkpoints.iter().enumerate() {
            if cp.sequence_index != index {
                return Err(corrupt(format!(
                    "checkpoint at position {} has sequence index {}",
                    index, cp.sequence_index
                )));
            }
            validate_percentage(cp.progress_percentage).map_err(|_| {
                corrupt(format!(
                    "checkpoint {} progress {} outside [0, 100]",
                    index, cp.progress_percentage
                ))
            })?;
            if let Some(prev) = previous {
                if cp.timestamp < prev.timestamp {
                    return Err(corrupt(format!("checkpoint {} is older than its predecessor", index)));
                }
            }
            previous = Some(cp);
        }

        Ok(())
    }
}
