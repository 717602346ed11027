//! Goal document - the persisted root of a monitor's state.

use serde::{Deserialize, Serialize};

use crate::id::TaskId;
use crate::task::{Checkpoint, Task, TaskStatus};
use crate::Time;

/// A goal and the tasks tracked toward it.
///
/// Tasks are kept in insertion order. On disk they are written as a JSON
/// object keyed by task id, in that same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalState {
    /// Top-level objective
    pub goal: String,

    /// When the goal was created
    pub created_at: Time,

    /// Tasks in insertion order
    #[serde(with = "task_map")]
    pub tasks: Vec<Task>,
}

impl GoalState {
    /// Start a new goal with no tasks.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            created_at: chrono::Utc::now(),
            tasks: Vec::new(),
        }
    }

    /// Find a task by id.
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    /// Find a task by id for mutation.
    pub fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id() == id)
    }
}

/// Task fields as stored under their id key.
#[derive(Serialize)]
struct TaskRecordRef<'a> {
    name: &'a str,
    description: &'a str,
    status: TaskStatus,
    progress_percentage: f64,
    failure_reason: Option<&'a str>,
    checkpoints: &'a [Checkpoint],
    created_at: Time,
    updated_at: Time,
}

#[derive(Deserialize)]
struct TaskRecord {
    name: String,
    #[serde(default)]
    description: String,
    status: TaskStatus,
    progress_percentage: f64,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    checkpoints: Vec<Checkpoint>,
    created_at: Time,
    updated_at: Time,
}

mod task_map {
    use std::collections::HashSet;
    use std::fmt;

    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::{TaskRecord, TaskRecordRef};
    use crate::id::TaskId;
    use crate::task::Task;

    pub fn serialize<S: Serializer>(tasks: &[Task], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(tasks.len()))?;
        for task in tasks {
            map.serialize_entry(
                task.id(),
                &TaskRecordRef {
                    name: task.name(),
                    description: task.description(),
                    status: task.status(),
                    progress_percentage: task.progress_percentage(),
                    failure_reason: task.failure_reason(),
                    checkpoints: task.checkpoints(),
                    created_at: task.created_at(),
                    updated_at: task.updated_at(),
                },
            )?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Task>, D::Error> {
        deserializer.deserialize_map(TaskMapVisitor)
    }

    struct TaskMapVisitor;

    impl<'de> Visitor<'de> for TaskMapVisitor {
        type Value = Vec<Task>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of task id to task")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut tasks = Vec::with_capacity(access.size_hint().unwrap_or(0));
            let mut seen = HashSet::new();

            while let Some((key, record)) = access.next_entry::<String, TaskRecord>()? {
                let id = TaskId::new(key).map_err(<A::Error as de::Error>::custom)?;
                if !seen.insert(id.clone()) {
                    return Err(de::Error::custom(format!("duplicate task id '{}'", id)));
                }
                let task = Task::from_parts(
                    id,
                    record.name,
                    record.description,
                    record.status,
                    record.progress_percentage,
                    record.checkpoints,
                    record.failure_reason,
                    record.created_at,
                    record.updated_at,
                )
                .map_err(<A::Error as de::Error>::custom)?;
                tasks.push(task);
            }
            Ok(tasks)
        }
    }
}
