//! Status reporting.

use std::fmt;

use progmon_core::{Task, TaskStatus, Time};
use progmon_storage::StateStore;
use serde::Serialize;

use crate::monitor::Monitor;

const BAR_WIDTH: usize = 20;

/// A read-only snapshot of a monitor, ready for any presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Goal being tracked
    pub goal: String,

    /// When the goal was created
    pub created_at: Time,

    /// Mean progress over all tasks
    pub overall_progress: f64,

    /// Whether every task is completed
    pub goal_achieved: bool,

    /// Task counts by status
    pub counts: StatusCounts,

    /// Per-task summaries in insertion order
    pub tasks: Vec<TaskSummary>,
}

/// Number of tasks in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Pending tasks
    pub pending: usize,
    /// Tasks in progress
    pub in_progress: usize,
    /// Completed tasks
    pub completed: usize,
    /// Failed tasks
    pub failed: usize,
}

/// Summary of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    /// Task id
    pub id: String,
    /// Task name
    pub name: String,
    /// Current status
    pub status: TaskStatus,
    /// Progress (0-100)
    pub progress_percentage: f64,
    /// Length of the checkpoint history
    pub checkpoint_count: usize,
    /// Label of the latest checkpoint
    pub last_checkpoint: Option<String>,
    /// Why the task failed, while it is failed
    pub failure_reason: Option<String>,
}

impl StatusReport {
    pub(crate) fn from_monitor<S: StateStore>(monitor: &Monitor<S>) -> Self {
        let mut counts = StatusCounts::default();
        let tasks = monitor
            .tasks()
            .map(|task| {
                counts.record(task.status());
                TaskSummary::from(task)
            })
            .collect();

        Self {
            goal: monitor.goal().to_string(),
            created_at: monitor.created_at(),
            overall_progress: monitor.overall_progress(),
            goal_achieved: monitor.is_goal_achieved(),
            counts,
            tasks,
        }
    }
}

impl StatusCounts {
    fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    /// Total number of tasks.
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed + self.failed
    }
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id().to_string(),
            name: task.name().to_string(),
            status: task.status(),
            progress_percentage: task.progress_percentage(),
            checkpoint_count: task.checkpoints().len(),
            last_checkpoint: task.last_checkpoint().map(|cp| cp.label.clone()),
            failure_reason: task.failure_reason().map(str::to_string),
        }
    }
}

/// `[#####---------------]` for a percentage in [0, 100].
pub fn progress_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Goal: {}", self.goal)?;
        writeln!(f, "Created: {}", self.created_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(
            f,
            "Overall: {} {:.1}%",
            progress_bar(self.overall_progress, BAR_WIDTH),
            self.overall_progress
        )?;
        writeln!(f, "Achieved: {}", if self.goal_achieved { "yes" } else { "no" })?;

        let c = &self.counts;
        write!(
            f,
            "Tasks ({}): {} pending, {} in progress, {} completed, {} failed",
            c.total(),
            c.pending,
            c.in_progress,
            c.completed,
            c.failed
        )?;

        for task in &self.tasks {
            write!(f, "\n  {}", task)?;
        }
        Ok(())
    }
}

impl fmt::Display for TaskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {:<11} | {} {:>5.1}% | {}",
            self.id,
            self.status.as_str().to_uppercase(),
            progress_bar(self.progress_percentage, 10),
            self.progress_percentage,
            self.name
        )?;
        match self.checkpoint_count {
            0 => {}
            1 => write!(f, " (1 checkpoint)")?,
            n => write!(f, " ({} checkpoints)", n)?,
        }
        if let Some(reason) = &self.failure_reason {
            write!(f, " - failed: {}", reason)?;
        }
        Ok(())
    }
}
