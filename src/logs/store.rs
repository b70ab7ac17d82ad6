//! Persistence for implementation log entries.
//!
//! Each entry is one pretty-printed JSON file under the owning spec's
//! `implementation-logs/` directory, named so a directory listing roughly
//! reads as a timeline: `task-{taskId}_{timestamp}_{short-id}.json`.
//! Entries are append-only; nothing here mutates or deletes an existing
//! record.

use std::fs;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ImplementationLogEntry, LogEntryDraft};
use crate::errors::LogError;
use crate::store::DocumentStore;
use crate::sync::{SyncEvent, SyncHub};

/// Server-side query filter; resolved before results leave the store so
/// dashboard payloads stay bounded.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Exact task id match.
    pub task_id: Option<String>,
    /// Free-text match against summary and artifact names.
    pub search: Option<String>,
}

pub struct ImplementationLogStore {
    store: DocumentStore,
    hub: Arc<SyncHub>,
    project_id: String,
    // Serializes appends so concurrent callers cannot interleave the
    // write-then-publish sequence for one spec.
    append_lock: Mutex<()>,
}

impl ImplementationLogStore {
    pub fn new(store: DocumentStore, hub: Arc<SyncHub>, project_id: &str) -> Self {
        Self {
            store,
            hub,
            project_id: project_id.to_string(),
            append_lock: Mutex::new(()),
        }
    }

    /// Validate, persist, and broadcast one new log entry. Returns the
    /// stored entry with id and timestamp assigned.
    pub fn append(&self, draft: LogEntryDraft) -> Result<ImplementationLogEntry, LogError> {
        if draft.spec_name.trim().is_empty() {
            return Err(LogError::MissingField { field: "specName" });
        }
        if draft.task_id.trim().is_empty() {
            return Err(LogError::MissingField { field: "taskId" });
        }
        if draft.summary.trim().is_empty() {
            return Err(LogError::MissingField { field: "summary" });
        }
        let spec_dir = self.store.spec_dir(&draft.spec_name);
        if !spec_dir.exists() {
            return Err(LogError::SpecNotFound {
                spec: draft.spec_name.clone(),
            });
        }
        if draft.artifacts.is_empty() {
            // Strongly recommended but not mechanically required.
            warn!(
                spec = %draft.spec_name,
                task = %draft.task_id,
                "log entry has no artifacts; later discovery will not find this work"
            );
        }

        let _guard = self.append_lock.lock().expect("log store lock poisoned");

        let entry = ImplementationLogEntry {
            id: draft.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            spec_name: draft.spec_name,
            task_id: draft.task_id,
            timestamp: draft.timestamp.unwrap_or_else(Utc::now),
            summary: draft.summary,
            files_modified: draft.files_modified,
            files_created: draft.files_created,
            statistics: draft.statistics,
            artifacts: draft.artifacts,
        };

        let logs_dir = self.store.logs_dir(&entry.spec_name);
        fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create {}", logs_dir.display()))
            .map_err(LogError::Other)?;

        let short_id: String = entry.id.chars().take(8).collect();
        let filename = format!(
            "task-{}_{}_{}.json",
            entry.task_id,
            entry.timestamp.format("%Y%m%dT%H%M%S%3f"),
            short_id
        );
        let path = logs_dir.join(filename);
        let json = serde_json::to_string_pretty(&entry)
            .context("Failed to serialize log entry")
            .map_err(LogError::Other)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write log entry {}", path.display()))
            .map_err(LogError::Other)?;

        info!(
            spec = %entry.spec_name,
            task = %entry.task_id,
            id = %entry.id,
            "implementation log entry appended"
        );

        // Dashboards replace their in-memory set wholesale, so the event
        // carries the full current set for the spec.
        let entries = self.load_all(&entry.spec_name)?;
        self.hub.publish(
            &self.project_id,
            &SyncEvent::ImplementationLogUpdate {
                spec_name: entry.spec_name.clone(),
                entries,
            },
        );

        Ok(entry)
    }

    /// Load every entry for a spec in insertion order.
    pub fn load_all(&self, spec: &str) -> Result<Vec<ImplementationLogEntry>, LogError> {
        if !self.store.spec_dir(spec).exists() {
            return Err(LogError::SpecNotFound {
                spec: spec.to_string(),
            });
        }
        let logs_dir = self.store.logs_dir(spec);
        if !logs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&logs_dir)
            .with_context(|| format!("Failed to read {}", logs_dir.display()))
            .map_err(LogError::Other)?
        {
            let path = dir_entry.map_err(anyhow::Error::from)?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read log entry {}", path.display()))
                .map_err(LogError::Other)?;
            let entry: ImplementationLogEntry = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse log entry {}", path.display()))
                .map_err(LogError::Other)?;
            entries.push(entry);
        }
        // File names sort by task id first, so re-establish insertion order.
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    /// Query a spec's entries with the filter resolved server-side.
    /// Results keep insertion order; any further sorting is the caller's.
    pub fn query(
        &self,
        spec: &str,
        filter: &LogFilter,
    ) -> Result<Vec<ImplementationLogEntry>, LogError> {
        let entries = self.load_all(spec)?;
        Ok(entries
            .into_iter()
            .filter(|e| {
                filter
                    .task_id
                    .as_ref()
                    .is_none_or(|task_id| &e.task_id == task_id)
            })
            .filter(|e| {
                filter
                    .search
                    .as_ref()
                    .is_none_or(|query| e.matches_search(query))
            })
            .collect())
    }

    /// Whether at least one entry exists for a task. Used as the
    /// completion precondition by the task tracker.
    pub fn has_entry(&self, spec: &str, task_id: &str) -> Result<bool, LogError> {
        match self.load_all(spec) {
            Ok(entries) => Ok(entries.iter().any(|e| e.task_id == task_id)),
            Err(LogError::SpecNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
