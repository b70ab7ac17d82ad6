//! The workflow engine: one façade owning the stores, coordinators, and
//! the sync hub for a single project.
//!
//! Every server handler and CLI command routes through here, so the
//! durable stores have exactly one set of writers and the per-resource
//! serialization in the coordinators actually holds.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::approvals::{ApprovalCoordinator, ApprovalRequest, Decision};
use crate::errors::{ApprovalError, LogError, TaskError};
use crate::logs::{ImplementationLogEntry, ImplementationLogStore, LogEntryDraft, LogFilter};
use crate::store::DocumentStore;
use crate::sync::SyncHub;
use crate::tasks::{TaskId, TaskMarker, TaskRecord, TaskTracker};

/// Per-spec task progress counts, shown by `specflow status` and
/// `GET /api/specs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecSummary {
    pub name: String,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub total: usize,
}

pub struct WorkflowEngine {
    store: DocumentStore,
    approvals: ApprovalCoordinator,
    tracker: TaskTracker,
    logs: Arc<ImplementationLogStore>,
    hub: Arc<SyncHub>,
    project_id: String,
}

impl WorkflowEngine {
    /// Wire up the engine for one project directory. The directory name
    /// doubles as the project id on the push channel.
    pub fn new(project_dir: &Path) -> anyhow::Result<Self> {
        let project_id = project_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        let store = DocumentStore::new(project_dir);
        store.ensure_layout()?;

        let hub = Arc::new(SyncHub::new());
        let logs = Arc::new(ImplementationLogStore::new(
            store.clone(),
            hub.clone(),
            &project_id,
        ));
        let approvals = ApprovalCoordinator::new(&store, hub.clone(), &project_id)?;
        let tracker = TaskTracker::new(store.clone(), logs.clone(), hub.clone(), &project_id);

        Ok(Self {
            store,
            approvals,
            tracker,
            logs,
            hub,
            project_id,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn hub(&self) -> Arc<SyncHub> {
        self.hub.clone()
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    // ── Approval gate ────────────────────────────────────────────────

    pub fn request_approval(
        &self,
        spec_name: &str,
        artifact_path: &str,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.approvals.request(spec_name, artifact_path)
    }

    pub fn approval_status(&self, id: &str) -> Result<ApprovalRequest, ApprovalError> {
        self.approvals.status(id)
    }

    pub fn resolve_approval(
        &self,
        id: &str,
        decision: Decision,
        comment: Option<&str>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.approvals.resolve(id, decision, comment)
    }

    pub fn cleanup_approval(&self, id: &str) -> Result<(), ApprovalError> {
        self.approvals.cleanup(id)
    }

    pub fn list_approvals(&self) -> Vec<ApprovalRequest> {
        self.approvals.list()
    }

    pub fn pending_approvals(&self) -> Vec<ApprovalRequest> {
        self.approvals.pending()
    }

    // ── Task lifecycle ───────────────────────────────────────────────

    pub fn start_task(&self, spec: &str, task_id: &TaskId) -> Result<TaskRecord, TaskError> {
        self.tracker.start_task(spec, task_id)
    }

    pub fn complete_task(&self, spec: &str, task_id: &TaskId) -> Result<TaskRecord, TaskError> {
        self.tracker.complete_task(spec, task_id)
    }

    pub fn list_tasks(&self, spec: &str) -> Result<Vec<TaskRecord>, TaskError> {
        self.store.list_tasks(spec)
    }

    // ── Implementation logs ──────────────────────────────────────────

    pub fn append_log(&self, draft: LogEntryDraft) -> Result<ImplementationLogEntry, LogError> {
        self.logs.append(draft)
    }

    pub fn query_logs(
        &self,
        spec: &str,
        filter: &LogFilter,
    ) -> Result<Vec<ImplementationLogEntry>, LogError> {
        self.logs.query(spec, filter)
    }

    // ── Status summaries ─────────────────────────────────────────────

    /// Task progress per spec, for every spec with a task list. Specs
    /// without a tasks.md yet show up with zero counts.
    pub fn spec_summaries(&self) -> anyhow::Result<Vec<SpecSummary>> {
        let mut summaries = Vec::new();
        for name in self.store.list_specs()? {
            let tasks = match self.store.list_tasks(&name) {
                Ok(tasks) => tasks,
                Err(TaskError::SpecNotFound { .. }) => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            summaries.push(summarize(&name, &tasks));
        }
        Ok(summaries)
    }
}

fn summarize(name: &str, tasks: &[TaskRecord]) -> SpecSummary {
    let count = |marker: TaskMarker| tasks.iter().filter(|t| t.marker == marker).count();
    SpecSummary {
        name: name.to_string(),
        pending: count(TaskMarker::Pending),
        in_progress: count(TaskMarker::InProgress),
        completed: count(TaskMarker::Completed),
        total: tasks.len(),
    }
}
