//! Document store: the keyed blob store behind every phase artifact.
//!
//! All durable state lives under `.specflow/` inside the coordinated
//! project directory:
//!
//! ```text
//! .specflow/
//! ├── approvals/
//! │   └── {id}.json
//! └── specs/
//!     └── {spec-name}/
//!         ├── requirements.md
//!         ├── design.md
//!         ├── tasks.md
//!         └── implementation-logs/
//!             └── task-{id}_{timestamp}_{short}.json
//! ```
//!
//! How artifact paths map onto files is this module's concern alone; the
//! coordinators above it speak in paths and spec names.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::errors::{StoreError, TaskError};
use crate::tasks::{TaskId, TaskMarker, TaskRecord, parser};

/// Name of the workflow data directory inside the project root.
pub const WORKFLOW_DIR: &str = ".specflow";

/// File name of the task list artifact within a spec directory.
pub const TASKS_FILE: &str = "tasks.md";

#[derive(Debug, Clone)]
pub struct DocumentStore {
    project_dir: PathBuf,
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            root: project_dir.join(WORKFLOW_DIR),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn workflow_dir(&self) -> &Path {
        &self.root
    }

    pub fn specs_dir(&self) -> PathBuf {
        self.root.join("specs")
    }

    pub fn approvals_dir(&self) -> PathBuf {
        self.root.join("approvals")
    }

    pub fn spec_dir(&self, spec: &str) -> PathBuf {
        self.specs_dir().join(spec)
    }

    pub fn tasks_path(&self, spec: &str) -> PathBuf {
        self.spec_dir(spec).join(TASKS_FILE)
    }

    pub fn logs_dir(&self, spec: &str) -> PathBuf {
        self.spec_dir(spec).join("implementation-logs")
    }

    /// Create the on-disk layout if it does not exist yet.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        fs::create_dir_all(self.specs_dir()).context("Failed to create specs directory")?;
        fs::create_dir_all(self.approvals_dir()).context("Failed to create approvals directory")?;
        Ok(())
    }

    /// Read an artifact by its project-relative path.
    pub fn read_artifact(&self, path: &str) -> Result<String, StoreError> {
        let full = self.project_dir.join(path);
        if !full.exists() {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }
        let content = fs::read_to_string(&full)
            .with_context(|| format!("Failed to read artifact {}", full.display()))?;
        Ok(content)
    }

    /// Write an artifact at its project-relative path, creating parents.
    pub fn write_artifact(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let full = self.project_dir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&full, content)
            .with_context(|| format!("Failed to write artifact {}", full.display()))?;
        Ok(())
    }

    /// List all spec names, sorted.
    pub fn list_specs(&self) -> Result<Vec<String>, StoreError> {
        let specs_dir = self.specs_dir();
        if !specs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&specs_dir)
            .with_context(|| format!("Failed to read {}", specs_dir.display()))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Parse the task list of one spec into structured records.
    pub fn list_tasks(&self, spec: &str) -> Result<Vec<TaskRecord>, TaskError> {
        let path = self.tasks_path(spec);
        if !path.exists() {
            return Err(TaskError::SpecNotFound {
                spec: spec.to_string(),
            });
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read task list {}", path.display()))?;
        Ok(parser::parse_task_list(&content))
    }

    /// Rewrite one task's marker inside the task list document and return
    /// the updated record.
    pub fn set_task_marker(
        &self,
        spec: &str,
        task_id: &TaskId,
        marker: TaskMarker,
    ) -> Result<TaskRecord, TaskError> {
        let path = self.tasks_path(spec);
        if !path.exists() {
            return Err(TaskError::SpecNotFound {
                spec: spec.to_string(),
            });
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read task list {}", path.display()))?;
        let updated =
            parser::set_marker(&content, task_id, marker).ok_or_else(|| TaskError::NotFound {
                spec: spec.to_string(),
                task_id: task_id.to_string(),
            })?;
        fs::write(&path, &updated)
            .with_context(|| format!("Failed to write task list {}", path.display()))?;
        let record = parser::parse_task_list(&updated)
            .into_iter()
            .find(|t| &t.task_id == task_id)
            .ok_or_else(|| TaskError::NotFound {
                spec: spec.to_string(),
                task_id: task_id.to_string(),
            })?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (DocumentStore, TempDir) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let store = DocumentStore::new(dir.path());
        store.ensure_layout().unwrap();
        (store, dir)
    }

    fn write_tasks(store: &DocumentStore, spec: &str, content: &str) {
        let rel = format!("{WORKFLOW_DIR}/specs/{spec}/{TASKS_FILE}");
        store.write_artifact(&rel, content).unwrap();
    }

    #[test]
    fn read_artifact_not_found() {
        let (store, _dir) = setup();
        let err = store.read_artifact("missing.md").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(err.to_string().contains("missing.md"));
    }

    #[test]
    fn write_then_read_artifact() {
        let (store, _dir) = setup();
        store
            .write_artifact(".specflow/specs/demo/design.md", "# Design\n")
            .unwrap();
        let content = store.read_artifact(".specflow/specs/demo/design.md").unwrap();
        assert_eq!(content, "# Design\n");
    }

    #[test]
    fn list_specs_sorted() {
        let (store, _dir) = setup();
        write_tasks(&store, "zeta", "- [ ] 1. A\n");
        write_tasks(&store, "alpha", "- [ ] 1. B\n");
        assert_eq!(store.list_specs().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn list_tasks_missing_spec() {
        let (store, _dir) = setup();
        let err = store.list_tasks("ghost").unwrap_err();
        assert!(matches!(err, TaskError::SpecNotFound { .. }));
    }

    #[test]
    fn set_task_marker_persists() {
        let (store, _dir) = setup();
        write_tasks(&store, "demo", "- [ ] 1. First\n- [ ] 2. Second\n");
        let id: TaskId = "2".parse().unwrap();
        let record = store
            .set_task_marker("demo", &id, TaskMarker::InProgress)
            .unwrap();
        assert_eq!(record.marker, TaskMarker::InProgress);

        let reloaded = store.list_tasks("demo").unwrap();
        assert_eq!(reloaded[0].marker, TaskMarker::Pending);
        assert_eq!(reloaded[1].marker, TaskMarker::InProgress);
    }

    #[test]
    fn set_task_marker_unknown_task() {
        let (store, _dir) = setup();
        write_tasks(&store, "demo", "- [ ] 1. Only\n");
        let id: TaskId = "9".parse().unwrap();
        let err = store
            .set_task_marker("demo", &id, TaskMarker::Completed)
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound { .. }));
    }
}
