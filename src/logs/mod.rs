//! Implementation log records: one immutable audit entry per completed
//! unit of work, with structured artifact descriptions for later
//! discovery.
//!
//! Field names here are the on-disk and on-the-wire contract consumed by
//! the dashboard; they serialize in camelCase and must stay stable.

pub mod store;

pub use store::{ImplementationLogStore, LogFilter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Code-change statistics for one completed task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub lines_added: u64,
    pub lines_removed: u64,
    pub files_changed: u64,
}

/// An API endpoint created or modified by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub method: String,
    pub path: String,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    pub location: String,
}

/// A UI component created by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<String>,
    pub location: String,
}

/// A utility function created by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub name: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub location: String,
}

/// A class or type created by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassArtifact {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub location: String,
}

/// A frontend-to-backend connection established by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub description: String,
    pub data_flow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// A test executed while completing a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestArtifact {
    pub name: String,
    pub status: TestStatus,
    #[serde(default)]
    pub passed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub location: String,
}

/// The six artifact categories of one log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    #[serde(default)]
    pub api_endpoints: Vec<ApiEndpoint>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub classes: Vec<ClassArtifact>,
    #[serde(default)]
    pub integrations: Vec<Integration>,
    #[serde(default)]
    pub tests: Vec<TestArtifact>,
}

impl Artifacts {
    /// Total artifact count across all six categories. Computed on read,
    /// never stored, so it cannot drift from the underlying arrays.
    pub fn total(&self) -> usize {
        self.api_endpoints.len()
            + self.components.len()
            + self.functions.len()
            + self.classes.len()
            + self.integrations.len()
            + self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// All searchable artifact names, used by free-text queries.
    fn names(&self) -> impl Iterator<Item = &str> {
        self.api_endpoints
            .iter()
            .map(|a| a.path.as_str())
            .chain(self.components.iter().map(|c| c.name.as_str()))
            .chain(self.functions.iter().map(|f| f.name.as_str()))
            .chain(self.classes.iter().map(|c| c.name.as_str()))
            .chain(self.integrations.iter().map(|i| i.description.as_str()))
            .chain(self.tests.iter().map(|t| t.name.as_str()))
    }
}

/// Immutable audit record of one completed task. Owned exclusively by the
/// implementation log store; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationLogEntry {
    pub id: String,
    pub spec_name: String,
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub files_created: Vec<String>,
    pub statistics: Statistics,
    #[serde(default)]
    pub artifacts: Artifacts,
}

impl ImplementationLogEntry {
    /// Case-insensitive free-text match against the summary and all
    /// artifact names.
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.summary.to_lowercase().contains(&needle)
            || self
                .artifacts
                .names()
                .any(|name| name.to_lowercase().contains(&needle))
    }

    pub fn total_artifacts(&self) -> usize {
        self.artifacts.total()
    }
}

/// An entry as submitted by the agent, before the store assigns identity.
/// `id` and `timestamp` are filled in at append time when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub spec_name: String,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub summary: String,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub files_created: Vec<String>,
    pub statistics: Statistics,
    #[serde(default)]
    pub artifacts: Artifacts,
}
