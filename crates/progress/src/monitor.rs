//! The monitor aggregate: a goal, its tasks, and their persistence.

use progmon_core::{Error, GoalState, Recovery, Result, Task, TaskId, TaskStatus, Time};
use progmon_storage::{JsonStateStore, StateStore};
use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::report::StatusReport;

/// Tracks progress toward a goal across an ordered set of tasks.
///
/// All mutation is synchronous and goes through `&mut self`; persistence is
/// explicit via [`Monitor::save`].
pub struct Monitor<S: StateStore = JsonStateStore> {
    state: GoalState,
    store: S,
}

impl Monitor<JsonStateStore> {
    /// Create a fresh monitor whose state lives at `config.state_file`.
    ///
    /// Nothing is written until [`Monitor::save`] is called.
    pub fn new(goal: impl Into<String>, config: &MonitorConfig) -> Self {
        Self::with_store(goal, config.store())
    }

    /// Load the monitor stored at `config.state_file`.
    pub async fn load(config: &MonitorConfig) -> Result<Self> {
        Self::restore(config.store()).await
    }

    /// Load the stored monitor, or create a fresh one if no state file exists.
    pub async fn load_or_create(goal: impl Into<String>, config: &MonitorConfig) -> Result<Self> {
        Self::restore_or_create(goal, config.store()).await
    }
}

impl<S: StateStore> Monitor<S> {
    /// Create a fresh monitor backed by `store`.
    pub fn with_store(goal: impl Into<String>, store: S) -> Self {
        Self {
            state: GoalState::new(goal),
            store,
        }
    }

    /// Rebuild a monitor from whatever `store` holds.
    pub async fn restore(store: S) -> Result<Self> {
        let state = store.load().await?;
        info!(location = %store.location(), tasks = state.tasks.len(), "restored monitor");
        Ok(Self { state, store })
    }

    /// Like [`Monitor::restore`], but starts fresh when nothing is stored.
    /// Corrupt state is still an error.
    pub async fn restore_or_create(goal: impl Into<String>, store: S) -> Result<Self> {
        match store.load().await.map_err(Error::from) {
            Ok(state) => Ok(Self { state, store }),
            Err(Error::NotFound(_)) => {
                debug!(location = %store.location(), "no stored state, creating monitor");
                Ok(Self::with_store(goal, store))
            }
            Err(e) => Err(e),
        }
    }

    /// Persist the full state to the backing store.
    pub async fn save(&self) -> Result<()> {
        self.store.save(&self.state).await?;
        debug!(location = %self.store.location(), "saved monitor");
        Ok(())
    }

    /// The goal being tracked.
    pub fn goal(&self) -> &str {
        &self.state.goal
    }

    /// When the goal was created.
    pub fn created_at(&self) -> Time {
        self.state.created_at
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The underlying goal document.
    pub fn state(&self) -> &GoalState {
        &self.state
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.state.tasks.iter()
    }

    /// Tasks currently in `status`, in insertion order.
    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks().filter(|t| t.status() == status).collect()
    }

    /// Add a pending task. The id must be new to this monitor.
    pub fn add_task(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<&Task> {
        let id = TaskId::new(id)?;
        if self.state.task(&id).is_some() {
            return Err(Error::DuplicateId(id));
        }
        self.state.tasks.push(Task::new(id, name, description));
        Ok(&self.state.tasks[self.state.tasks.len() - 1])
    }

    /// Look up a task by id.
    pub fn get_task(&self, id: &str) -> Result<&Task> {
        self.tasks()
            .find(|t| t.id().as_str() == id)
            .ok_or_else(|| Error::NotFound(format!("task '{}'", id)))
    }

    /// Start a pending task.
    pub fn start(&mut self, id: &str) -> Result<()> {
        self.task_mut(id)?.start()
    }

    /// Set a task's progress; a label also records a checkpoint.
    pub fn update_progress(&mut self, id: &str, percentage: f64, label: Option<&str>) -> Result<()> {
        self.task_mut(id)?.update_progress(percentage, label)
    }

    /// Complete a task that is at 100%.
    pub fn complete(&mut self, id: &str) -> Result<()> {
        self.task_mut(id)?.complete()
    }

    /// Record that a task failed.
    pub fn fail(&mut self, id: &str, reason: impl Into<String>) -> Result<()> {
        self.task_mut(id)?.fail(reason)
    }

    /// Move a failed task back to in progress and return where to resume.
    ///
    /// The task's progress is left as it was; call
    /// [`Monitor::update_progress`] with [`Recovery::percentage`] to roll
    /// back explicitly.
    pub fn recover(&mut self, id: &str) -> Result<Recovery> {
        self.task_mut(id)?.recover()
    }

    /// Mean progress over all tasks, 0 with no tasks.
    pub fn overall_progress(&self) -> f64 {
        let tasks = &self.state.tasks;
        if tasks.is_empty() {
            return 0.0;
        }
        let total: f64 = tasks.iter().map(Task::progress_percentage).sum();
        total / tasks.len() as f64
    }

    /// True iff there is at least one task and all of them are completed.
    pub fn is_goal_achieved(&self) -> bool {
        !self.state.tasks.is_empty()
            && self.tasks().all(|t| t.status() == TaskStatus::Completed)
    }

    /// Read-only snapshot for presentation.
    pub fn status_report(&self) -> StatusReport {
        StatusReport::from_monitor(self)
    }

    fn task_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.state
            .tasks
            .iter_mut()
            .find(|t| t.id().as_str() == id)
            .ok_or_else(|| Error::NotFound(format!("task '{}'", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// In-memory store for tests.
    #[derive(Default)]
    struct MockStore {
        saved: Mutex<Option<String>>,
    }

    #[async_trait::async_trait]
    impl StateStore for MockStore {
        async fn save(&self, state: &GoalState) -> progmon_storage::Result<()> {
            *self.saved.lock().unwrap() = Some(serde_json::to_string(state)?);
            Ok(())
        }

        async fn load(&self) -> progmon_storage::Result<GoalState> {
            match self.saved.lock().unwrap().as_deref() {
                Some(json) => serde_json::from_str(json)
                    .map_err(|e| progmon_storage::StorageError::Corrupt(e.to_string())),
                None => Err(progmon_storage::StorageError::NotFound("memory".into())),
            }
        }

        async fn exists(&self) -> progmon_storage::Result<bool> {
            Ok(self.saved.lock().unwrap().is_some())
        }

        async fn delete(&self) -> progmon_storage::Result<bool> {
            Ok(self.saved.lock().unwrap().take().is_some())
        }

        fn location(&self) -> String {
            "memory".to_string()
        }
    }

    fn create_test_monitor() -> Monitor<MockStore> {
        Monitor::with_store("Publish the corpus", MockStore::default())
    }

    #[test]
    fn test_empty_monitor() {
        let monitor = create_test_monitor();
        assert_eq!(monitor.goal(), "Publish the corpus");
        assert_eq!(monitor.overall_progress(), 0.0);
        assert!(!monitor.is_goal_achieved());
        assert_eq!(monitor.tasks().count(), 0);
    }

    #[test]
    fn test_add_task_starts_pending() {
        let mut monitor = create_test_monitor();
        let task = monitor.add_task("t1", "Fetch", "Download books").unwrap();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.progress_percentage(), 0.0);

        let task = monitor.get_task("t1").unwrap();
        assert_eq!(task.name(), "Fetch");
        assert_eq!(task.description(), "Download books");
    }

    #[test]
    fn test_duplicate_id_leaves_original() {
        let mut monitor = create_test_monitor();
        monitor.add_task("t1", "Fetch", "Download books").unwrap();
        monitor.start("t1").unwrap();
        monitor.update_progress("t1", 20.0, None).unwrap();

        let err = monitor.add_task("t1", "Other", "Something else").unwrap_err();
        assert!(matches!(err, Error::DuplicateId(ref id) if id.as_str() == "t1"));

        assert_eq!(monitor.tasks().count(), 1);
        let task = monitor.get_task("t1").unwrap();
        assert_eq!(task.name(), "Fetch");
        assert_eq!(task.status(), TaskStatus::InProgress);
        assert_eq!(task.progress_percentage(), 20.0);
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut monitor = create_test_monitor();
        assert!(matches!(monitor.add_task("", "x", "y"), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn test_unknown_task_not_found() {
        let mut monitor = create_test_monitor();
        assert!(matches!(monitor.get_task("nope"), Err(Error::NotFound(_))));
        assert!(matches!(monitor.start("nope"), Err(Error::NotFound(_))));
        assert!(matches!(monitor.recover("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_on_pending_is_invalid_transition() {
        let mut monitor = create_test_monitor();
        monitor.add_task("t1", "Fetch", "").unwrap();

        let err = monitor.update_progress("t1", 10.0, None).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        let task = monitor.get_task("t1").unwrap();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.progress_percentage(), 0.0);
    }

    #[test]
    fn test_fail_and_recover_scenario() {
        let mut monitor = create_test_monitor();
        monitor.add_task("t1", "Fetch", "").unwrap();
        monitor.start("t1").unwrap();
        monitor.update_progress("t1", 50.0, Some("half done")).unwrap();
        monitor.fail("t1", "network drop").unwrap();

        let recovery = monitor.recover("t1").unwrap();
        assert_eq!(recovery.percentage(), 50.0);
        assert_eq!(recovery.label(), Some("half done"));

        monitor.update_progress("t1", 100.0, None).unwrap();
        monitor.complete("t1").unwrap();

        let task = monitor.get_task("t1").unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.progress_percentage(), 100.0);
        assert_eq!(task.checkpoints().len(), 1);
        assert!(monitor.is_goal_achieved());
    }

    #[test]
    fn test_complete_at_99_is_precondition_failure() {
        let mut monitor = create_test_monitor();
        monitor.add_task("t1", "Fetch", "").unwrap();
        monitor.start("t1").unwrap();
        monitor.update_progress("t1", 99.0, None).unwrap();

        assert!(matches!(monitor.complete("t1"), Err(Error::PreconditionFailed(_))));
        assert_eq!(monitor.get_task("t1").unwrap().status(), TaskStatus::InProgress);
    }

    #[test]
    fn test_recover_applies_explicitly() {
        let mut monitor = create_test_monitor();
        monitor.add_task("t1", "Fetch", "").unwrap();
        monitor.start("t1").unwrap();
        monitor.update_progress("t1", 40.0, Some("chapter 4")).unwrap();
        monitor.update_progress("t1", 65.0, None).unwrap();
        monitor.fail("t1", "parse error").unwrap();

        let recovery = monitor.recover("t1").unwrap();
        assert_eq!(monitor.get_task("t1").unwrap().progress_percentage(), 65.0);

        monitor.update_progress("t1", recovery.percentage(), None).unwrap();
        let task = monitor.get_task("t1").unwrap();
        assert_eq!(task.progress_percentage(), 40.0);
        assert_eq!(task.checkpoints().len(), 1);
    }

    #[test]
    fn test_overall_progress_and_goal() {
        let mut monitor = create_test_monitor();
        monitor.add_task("a", "A", "").unwrap();
        monitor.add_task("b", "B", "").unwrap();
        monitor.add_task("c", "C", "").unwrap();

        monitor.start("a").unwrap();
        monitor.update_progress("a", 100.0, None).unwrap();
        monitor.complete("a").unwrap();
        monitor.start("b").unwrap();
        monitor.update_progress("b", 50.0, None).unwrap();

        assert_eq!(monitor.overall_progress(), 50.0);
        assert!(!monitor.is_goal_achieved());

        monitor.update_progress("b", 100.0, None).unwrap();
        monitor.complete("b").unwrap();
        monitor.start("c").unwrap();
        monitor.update_progress("c", 100.0, None).unwrap();
        assert_eq!(monitor.overall_progress(), 100.0);
        assert!(!monitor.is_goal_achieved());

        monitor.complete("c").unwrap();
        assert!(monitor.is_goal_achieved());
        assert_eq!(monitor.tasks_with_status(TaskStatus::Completed).len(), 3);
    }

    #[test]
    fn test_tasks_keep_insertion_order() {
        let mut monitor = create_test_monitor();
        for id in ["zz", "aa", "mm"] {
            monitor.add_task(id, id, "").unwrap();
        }
        let ids: Vec<_> = monitor.tasks().map(|t| t.id().as_str()).collect();
        assert_eq!(ids, vec!["zz", "aa", "mm"]);
    }

    #[tokio::test]
    async fn test_restore_or_create_from_empty_store() {
        let monitor = Monitor::restore_or_create("New goal", MockStore::default())
            .await
            .unwrap();
        assert_eq!(monitor.goal(), "New goal");
        assert_eq!(monitor.tasks().count(), 0);
    }

    #[tokio::test]
    async fn test_restore_from_empty_store_is_not_found() {
        let result = Monitor::restore(MockStore::default()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_round_trip_through_state_file() {
        let temp = tempdir().unwrap();
        let config = MonitorConfig::new(temp.path().join("progress_state.json"));

        let mut monitor = Monitor::new("Ship release", &config);
        monitor.add_task("build", "Build", "Compile artifacts").unwrap();
        monitor.add_task("test", "Test", "Run the suite").unwrap();
        monitor.add_task("docs", "Docs", "Write notes").unwrap();

        monitor.start("build").unwrap();
        monitor.update_progress("build", 60.0, Some("compiled")).unwrap();
        monitor.update_progress("build", 100.0, Some("packaged")).unwrap();
        monitor.complete("build").unwrap();

        monitor.start("test").unwrap();
        monitor.update_progress("test", 30.0, Some("unit")).unwrap();
        monitor.fail("test", "flaky runner").unwrap();
        monitor.recover("test").unwrap();

        monitor.save().await.unwrap();

        let loaded = Monitor::load(&config).await.unwrap();
        assert_eq!(loaded.goal(), "Ship release");
        assert_eq!(loaded.state(), monitor.state());

        let ids: Vec<_> = loaded.tasks().map(|t| t.id().as_str()).collect();
        assert_eq!(ids, vec!["build", "test", "docs"]);
        assert_eq!(loaded.get_task("build").unwrap().status(), TaskStatus::Completed);
        assert_eq!(loaded.get_task("test").unwrap().status(), TaskStatus::InProgress);
        assert_eq!(loaded.get_task("docs").unwrap().status(), TaskStatus::Pending);
        assert_eq!(loaded.get_task("build").unwrap().checkpoints().len(), 2);
        assert_eq!(loaded.get_task("test").unwrap().checkpoints()[0].label, "unit");
        assert!(loaded.get_task("test").unwrap().failure_reason().is_none());
    }

    #[tokio::test]
    async fn test_failed_task_round_trips_reason() {
        let temp = tempdir().unwrap();
        let config = MonitorConfig::new(temp.path().join("state.json"));

        let mut monitor = Monitor::new("Goal", &config);
        monitor.add_task("t1", "T1", "").unwrap();
        monitor.start("t1").unwrap();
        monitor.fail("t1", "out of memory").unwrap();
        monitor.save().await.unwrap();

        let mut loaded = Monitor::load(&config).await.unwrap();
        assert_eq!(loaded.get_task("t1").unwrap().failure_reason(), Some("out of memory"));
        assert_eq!(loaded.recover("t1").unwrap(), Recovery::FreshStart);
    }

    #[tokio::test]
    async fn test_load_or_create_keeps_existing_goal() {
        let temp = tempdir().unwrap();
        let config = MonitorConfig::new(temp.path().join("state.json"));

        let fresh = Monitor::load_or_create("First goal", &config).await.unwrap();
        assert_eq!(fresh.goal(), "First goal");
        fresh.save().await.unwrap();

        let again = Monitor::load_or_create("Second goal", &config).await.unwrap();
        assert_eq!(again.goal(), "First goal");
    }

    #[tokio::test]
    async fn test_load_or_create_surfaces_corruption() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        tokio::fs::write(&path, "[]").await.unwrap();

        let result = Monitor::load_or_create("Goal", &MonitorConfig::new(&path)).await;
        assert!(matches!(result, Err(Error::CorruptState(_))));
    }
}
