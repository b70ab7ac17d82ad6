//! The task lifecycle tracker: pending → in-progress → completed, with the
//! single-in-progress invariant enforced per task list and completion gated
//! on an existing implementation log entry.

use std::sync::{Arc, Mutex};

use tracing::info;

use super::{TaskId, TaskMarker, TaskRecord};
use crate::errors::TaskError;
use crate::logs::ImplementationLogStore;
use crate::store::DocumentStore;
use crate::sync::{SyncEvent, SyncHub};

pub struct TaskTracker {
    store: DocumentStore,
    logs: Arc<ImplementationLogStore>,
    hub: Arc<SyncHub>,
    project_id: String,
    // One read-modify-write of a task list at a time.
    mutate_lock: Mutex<()>,
}

impl TaskTracker {
    pub fn new(
        store: DocumentStore,
        logs: Arc<ImplementationLogStore>,
        hub: Arc<SyncHub>,
        project_id: &str,
    ) -> Self {
        Self {
            store,
            logs,
            hub,
            project_id: project_id.to_string(),
            mutate_lock: Mutex::new(()),
        }
    }

    /// Transition a pending task to in-progress.
    ///
    /// Fails with `AlreadyInProgress` if any other task in the list is
    /// in-progress, and with `NotPending` if the task was already started
    /// or completed; pending → completed skips are unrepresentable.
    pub fn start_task(&self, spec: &str, task_id: &TaskId) -> Result<TaskRecord, TaskError> {
        let _guard = self.mutate_lock.lock().expect("task tracker lock poisoned");

        let tasks = self.store.list_tasks(spec)?;
        let task = find_task(&tasks, spec, task_id)?;
        if let Some(active) = tasks.iter().find(|t| t.marker == TaskMarker::InProgress) {
            return Err(TaskError::AlreadyInProgress {
                spec: spec.to_string(),
                in_progress: active.task_id.to_string(),
                requested: task_id.to_string(),
            });
        }
        if task.marker != TaskMarker::Pending {
            return Err(TaskError::NotPending {
                task_id: task_id.to_string(),
                marker: task.marker.to_string(),
            });
        }

        let record = self
            .store
            .set_task_marker(spec, task_id, TaskMarker::InProgress)?;
        info!(spec, task = %task_id, "task started");
        self.publish_status(spec, &record);
        Ok(record)
    }

    /// Transition an in-progress task to completed.
    ///
    /// Requires at least one implementation log entry for the task; a task
    /// without a log is not complete, and that rule fails loudly here
    /// rather than degrading into a silent success.
    pub fn complete_task(&self, spec: &str, task_id: &TaskId) -> Result<TaskRecord, TaskError> {
        let _guard = self.mutate_lock.lock().expect("task tracker lock poisoned");

        let tasks = self.store.list_tasks(spec)?;
        let task = find_task(&tasks, spec, task_id)?;
        if task.marker != TaskMarker::InProgress {
            return Err(TaskError::NotInProgress {
                task_id: task_id.to_string(),
                marker: task.marker.to_string(),
            });
        }
        let has_log = self
            .logs
            .has_entry(spec, task_id.as_str())
            .map_err(anyhow::Error::new)?;
        if !has_log {
            return Err(TaskError::NoImplementationLog {
                spec: spec.to_string(),
                task_id: task_id.to_string(),
            });
        }

        let record = self
            .store
            .set_task_marker(spec, task_id, TaskMarker::Completed)?;
        info!(spec, task = %task_id, "task completed");
        self.publish_status(spec, &record);
        Ok(record)
    }

    fn publish_status(&self, spec: &str, record: &TaskRecord) {
        self.hub.publish(
            &self.project_id,
            &SyncEvent::TaskStatusUpdate {
                spec_name: spec.to_string(),
                task_id: record.task_id.to_string(),
                marker: record.marker,
            },
        );
    }
}

fn find_task<'a>(
    tasks: &'a [TaskRecord],
    spec: &str,
    task_id: &TaskId,
) -> Result<&'a TaskRecord, TaskError> {
    tasks
        .iter()
        .find(|t| &t.task_id == task_id)
        .ok_or_else(|| TaskError::NotFound {
            spec: spec.to_string(),
            task_id: task_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{LogEntryDraft, Statistics};
    use tempfile::TempDir;

    fn setup(tasks_md: &str) -> (TaskTracker, Arc<ImplementationLogStore>, TempDir) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let store = DocumentStore::new(dir.path());
        store.ensure_layout().unwrap();
        store
            .write_artifact(".specflow/specs/demo/tasks.md", tasks_md)
            .unwrap();
        let hub = Arc::new(SyncHub::new());
        let logs = Arc::new(ImplementationLogStore::new(
            store.clone(),
            hub.clone(),
            "proj",
        ));
        let tracker = TaskTracker::new(store, logs.clone(), hub, "proj");
        (tracker, logs, dir)
    }

    fn log_for(logs: &ImplementationLogStore, task_id: &str) {
        logs.append(LogEntryDraft {
            id: None,
            spec_name: "demo".to_string(),
            task_id: task_id.to_string(),
            timestamp: None,
            summary: format!("Implemented task {task_id}"),
            files_modified: vec![],
            files_created: vec![],
            statistics: Statistics::default(),
            artifacts: Default::default(),
        })
        .unwrap();
    }

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    const THREE_TASKS: &str = "- [ ] 1. First\n- [ ] 2. Second\n- [ ] 3. Third\n";

    #[test]
    fn start_task_marks_in_progress() {
        let (tracker, _logs, _dir) = setup(THREE_TASKS);
        let record = tracker.start_task("demo", &id("2")).unwrap();
        assert_eq!(record.marker, TaskMarker::InProgress);
    }

    #[test]
    fn second_start_fails_while_first_in_progress() {
        let (tracker, _logs, _dir) = setup(THREE_TASKS);
        tracker.start_task("demo", &id("2")).unwrap();
        let err = tracker.start_task("demo", &id("3")).unwrap_err();
        match err {
            TaskError::AlreadyInProgress {
                in_progress,
                requested,
                ..
            } => {
                assert_eq!(in_progress, "2");
                assert_eq!(requested, "3");
            }
            other => panic!("Expected AlreadyInProgress, got {other}"),
        }
        // And "2" is still the one in progress.
        let tasks = tracker.store.list_tasks("demo").unwrap();
        let in_progress: Vec<_> = tasks
            .iter()
            .filter(|t| t.marker == TaskMarker::InProgress)
            .collect();
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].task_id.as_str(), "2");
    }

    #[test]
    fn start_unknown_task_fails_not_found() {
        let (tracker, _logs, _dir) = setup(THREE_TASKS);
        let err = tracker.start_task("demo", &id("99")).unwrap_err();
        assert!(matches!(err, TaskError::NotFound { .. }));
    }

    #[test]
    fn start_completed_task_fails_not_pending() {
        let (tracker, logs, _dir) = setup(THREE_TASKS);
        tracker.start_task("demo", &id("1")).unwrap();
        log_for(&logs, "1");
        tracker.complete_task("demo", &id("1")).unwrap();

        let err = tracker.start_task("demo", &id("1")).unwrap_err();
        assert!(matches!(err, TaskError::NotPending { .. }));
    }

    #[test]
    fn complete_without_log_fails() {
        let (tracker, _logs, _dir) = setup(THREE_TASKS);
        tracker.start_task("demo", &id("1")).unwrap();
        let err = tracker.complete_task("demo", &id("1")).unwrap_err();
        assert!(matches!(err, TaskError::NoImplementationLog { .. }));
    }

    #[test]
    fn complete_pending_task_fails_not_in_progress() {
        let (tracker, logs, _dir) = setup(THREE_TASKS);
        log_for(&logs, "1");
        let err = tracker.complete_task("demo", &id("1")).unwrap_err();
        assert!(matches!(err, TaskError::NotInProgress { .. }));
    }

    #[test]
    fn full_lifecycle_persists_and_frees_the_slot() {
        let (tracker, logs, _dir) = setup(THREE_TASKS);
        tracker.start_task("demo", &id("1")).unwrap();
        log_for(&logs, "1");
        let record = tracker.complete_task("demo", &id("1")).unwrap();
        assert_eq!(record.marker, TaskMarker::Completed);

        // The in-progress slot is free again.
        tracker.start_task("demo", &id("2")).unwrap();

        let tasks = tracker.store.list_tasks("demo").unwrap();
        assert_eq!(tasks[0].marker, TaskMarker::Completed);
        assert_eq!(tasks[1].marker, TaskMarker::InProgress);
        assert_eq!(tasks[2].marker, TaskMarker::Pending);
    }

    #[test]
    fn at_most_one_in_progress_at_any_point() {
        let (tracker, logs, _dir) = setup(THREE_TASKS);
        for task in ["1", "2", "3"] {
            tracker.start_task("demo", &id(task)).unwrap();
            let tasks = tracker.store.list_tasks("demo").unwrap();
            assert!(
                tasks
                    .iter()
                    .filter(|t| t.marker == TaskMarker::InProgress)
                    .count()
                    <= 1
            );
            log_for(&logs, task);
            tracker.complete_task("demo", &id(task)).unwrap();
        }
    }

    #[test]
    fn transitions_publish_task_status_updates() {
        let (tracker, _logs, _dir) = setup(THREE_TASKS);
        let hub = tracker.hub.clone();
        let mut sub = hub.subscribe("proj", Some(crate::sync::Topic::TaskStatusUpdate));
        tracker.start_task("demo", &id("1")).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let event = rt.block_on(sub.recv()).unwrap();
        match event {
            SyncEvent::TaskStatusUpdate {
                spec_name,
                task_id,
                marker,
            } => {
                assert_eq!(spec_name, "demo");
                assert_eq!(task_id, "1");
                assert_eq!(marker, TaskMarker::InProgress);
            }
            _ => panic!("Expected TaskStatusUpdate"),
        }
    }
}
