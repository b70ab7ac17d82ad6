//! Approval coordinator: the request/poll/resolve/cleanup cycle that gates
//! progression between workflow phases.
//!
//! Requests reference the artifact by path only, never by content, so the
//! reviewer always reads the current file. The state machine per request id
//! is acyclic (pending → approved | needs-revision → cleaned); after a
//! needs-revision the agent revises the artifact and opens a brand-new
//! request. Cleanup is a deliberate poison pill: an approved request that
//! is never cleaned up keeps blocking the next phase until someone
//! acknowledges it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::ApprovalError;
use crate::store::DocumentStore;
use crate::sync::{SyncEvent, SyncHub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    NeedsRevision,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::NeedsRevision => "needs-revision",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's verdict on one pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    Approve,
    NeedsRevision,
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" | "approved" => Ok(Self::Approve),
            "needs-revision" => Ok(Self::NeedsRevision),
            _ => Err(format!("Invalid decision: {s}")),
        }
    }
}

/// A single pending review of one artifact path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: String,
    pub spec_name: String,
    pub artifact_path: String,
    pub status: ApprovalStatus,
    /// Present iff status is needs-revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    requests: HashMap<String, ApprovalRequest>,
    // Ids already cleaned up, so a second cleanup can be told apart from a
    // request that never existed.
    cleaned: HashSet<String>,
}

pub struct ApprovalCoordinator {
    dir: PathBuf,
    hub: Arc<SyncHub>,
    project_id: String,
    registry: Mutex<Registry>,
}

impl ApprovalCoordinator {
    /// Load the coordinator, picking up any requests persisted by a
    /// previous process.
    pub fn new(store: &DocumentStore, hub: Arc<SyncHub>, project_id: &str) -> anyhow::Result<Self> {
        let dir = store.approvals_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut requests = HashMap::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read approval {}", path.display()))?;
            let request: ApprovalRequest = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse approval {}", path.display()))?;
            requests.insert(request.id.clone(), request);
        }

        Ok(Self {
            dir,
            hub,
            project_id: project_id.to_string(),
            registry: Mutex::new(Registry {
                requests,
                cleaned: HashSet::new(),
            }),
        })
    }

    /// Create a pending request for an artifact path.
    ///
    /// Fails with `Conflict` if a pending request for the same path
    /// already exists; terminal requests for the path do not block.
    pub fn request(
        &self,
        spec_name: &str,
        artifact_path: &str,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let mut registry = self.registry.lock().expect("approval registry poisoned");
        if registry.requests.values().any(|r| {
            r.artifact_path == artifact_path && r.status == ApprovalStatus::Pending
        }) {
            return Err(ApprovalError::Conflict {
                path: artifact_path.to_string(),
            });
        }

        let request = ApprovalRequest {
            id: Uuid::new_v4().to_string(),
            spec_name: spec_name.to_string(),
            artifact_path: artifact_path.to_string(),
            status: ApprovalStatus::Pending,
            reviewer_comment: None,
            created_at: Utc::now(),
        };
        self.persist(&request)?;
        registry
            .requests
            .insert(request.id.clone(), request.clone());
        drop(registry);

        info!(id = %request.id, path = artifact_path, "approval requested");
        self.publish(&request.id, "pending");
        Ok(request)
    }

    /// Current state of a request. Never blocks; callers poll with their
    /// own backoff.
    pub fn status(&self, id: &str) -> Result<ApprovalRequest, ApprovalError> {
        let registry = self.registry.lock().expect("approval registry poisoned");
        if let Some(request) = registry.requests.get(id) {
            return Ok(request.clone());
        }
        if registry.cleaned.contains(id) {
            return Err(ApprovalError::AlreadyCleaned { id: id.to_string() });
        }
        Err(ApprovalError::NotFound { id: id.to_string() })
    }

    /// Record the reviewer's decision on a pending request.
    pub fn resolve(
        &self,
        id: &str,
        decision: Decision,
        comment: Option<&str>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let mut registry = self.registry.lock().expect("approval registry poisoned");
        let request = registry
            .requests
            .get_mut(id)
            .ok_or_else(|| ApprovalError::NotFound { id: id.to_string() })?;
        if request.status.is_terminal() {
            return Err(ApprovalError::AlreadyResolved {
                id: id.to_string(),
                status: request.status.to_string(),
            });
        }
        match decision {
            Decision::Approve => {
                request.status = ApprovalStatus::Approved;
                request.reviewer_comment = None;
            }
            Decision::NeedsRevision => {
                let comment = comment
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or(ApprovalError::MissingComment)?;
                request.status = ApprovalStatus::NeedsRevision;
                request.reviewer_comment = Some(comment.to_string());
            }
        }
        let resolved = request.clone();
        self.persist(&resolved)?;
        drop(registry);

        info!(id, status = resolved.status.as_str(), "approval resolved");
        self.publish(id, resolved.status.as_str());
        Ok(resolved)
    }

    /// Remove a resolved request. The requester must observe a terminal
    /// status first and must treat a cleanup failure as blocking.
    pub fn cleanup(&self, id: &str) -> Result<(), ApprovalError> {
        let mut registry = self.registry.lock().expect("approval registry poisoned");
        if registry.cleaned.contains(id) {
            return Err(ApprovalError::AlreadyCleaned { id: id.to_string() });
        }
        let request = registry
            .requests
            .get(id)
            .ok_or_else(|| ApprovalError::NotFound { id: id.to_string() })?;
        if !request.status.is_terminal() {
            return Err(ApprovalError::NotResolved { id: id.to_string() });
        }

        let path = self.request_path(id);
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove approval {}", path.display()))
            .map_err(ApprovalError::Other)?;
        registry.requests.remove(id);
        registry.cleaned.insert(id.to_string());
        drop(registry);

        info!(id, "approval cleaned up");
        // Invalidation signal only; dashboards re-fetch the approval list.
        self.publish(id, "cleaned");
        Ok(())
    }

    /// All known requests, oldest first.
    pub fn list(&self) -> Vec<ApprovalRequest> {
        let registry = self.registry.lock().expect("approval registry poisoned");
        let mut requests: Vec<ApprovalRequest> = registry.requests.values().cloned().collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        requests
    }

    /// Requests still awaiting a reviewer decision, oldest first.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        self.list()
            .into_iter()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .collect()
    }

    fn request_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn persist(&self, request: &ApprovalRequest) -> Result<(), ApprovalError> {
        let path = self.request_path(&request.id);
        let json = serde_json::to_string_pretty(request)
            .context("Failed to serialize approval request")
            .map_err(ApprovalError::Other)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write approval {}", path.display()))
            .map_err(ApprovalError::Other)?;
        Ok(())
    }

    fn publish(&self, id: &str, status: &str) {
        self.hub.publish(
            &self.project_id,
            &SyncEvent::ApprovalUpdate {
                id: id.to_string(),
                status: status.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (ApprovalCoordinator, Arc<SyncHub>, TempDir) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let store = DocumentStore::new(dir.path());
        store.ensure_layout().unwrap();
        let hub = Arc::new(SyncHub::new());
        let coordinator = ApprovalCoordinator::new(&store, hub.clone(), "proj").unwrap();
        (coordinator, hub, dir)
    }

    #[test]
    fn request_creates_pending() {
        let (coordinator, _hub, _dir) = setup();
        let request = coordinator
            .request("user-auth", ".specflow/specs/user-auth/design.md")
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Pending);
        assert!(request.reviewer_comment.is_none());
        assert_eq!(coordinator.status(&request.id).unwrap().status, ApprovalStatus::Pending);
    }

    #[test]
    fn duplicate_pending_request_conflicts() {
        let (coordinator, _hub, _dir) = setup();
        coordinator.request("user-auth", "design.md").unwrap();
        let err = coordinator.request("user-auth", "design.md").unwrap_err();
        assert!(matches!(err, ApprovalError::Conflict { .. }));
    }

    #[test]
    fn needs_revision_requires_comment() {
        let (coordinator, _hub, _dir) = setup();
        let request = coordinator.request("user-auth", "design.md").unwrap();
        let err = coordinator
            .resolve(&request.id, Decision::NeedsRevision, None)
            .unwrap_err();
        assert!(matches!(err, ApprovalError::MissingComment));
        let err = coordinator
            .resolve(&request.id, Decision::NeedsRevision, Some("   "))
            .unwrap_err();
        assert!(matches!(err, ApprovalError::MissingComment));
    }

    #[test]
    fn scenario_revision_then_new_request_for_same_path() {
        let (coordinator, _hub, _dir) = setup();
        let request = coordinator.request("user-auth", "design.md").unwrap();
        assert_eq!(coordinator.status(&request.id).unwrap().status, ApprovalStatus::Pending);

        let resolved = coordinator
            .resolve(&request.id, Decision::NeedsRevision, Some("add error cases"))
            .unwrap();
        assert_eq!(resolved.status, ApprovalStatus::NeedsRevision);
        assert_eq!(resolved.reviewer_comment.as_deref(), Some("add error cases"));

        // First request is terminal, so a new one for the same path succeeds.
        let second = coordinator.request("user-auth", "design.md").unwrap();
        assert_ne!(second.id, request.id);
        assert_eq!(second.status, ApprovalStatus::Pending);
    }

    #[test]
    fn scenario_approve_cleanup_then_already_cleaned() {
        let (coordinator, _hub, _dir) = setup();
        let request = coordinator.request("user-auth", "design.md").unwrap();
        coordinator
            .resolve(&request.id, Decision::Approve, None)
            .unwrap();
        coordinator.cleanup(&request.id).unwrap();
        let err = coordinator.cleanup(&request.id).unwrap_err();
        assert!(matches!(err, ApprovalError::AlreadyCleaned { .. }));
    }

    #[test]
    fn cleanup_while_pending_fails_not_resolved() {
        let (coordinator, _hub, _dir) = setup();
        let request = coordinator.request("user-auth", "design.md").unwrap();
        let err = coordinator.cleanup(&request.id).unwrap_err();
        assert!(matches!(err, ApprovalError::NotResolved { .. }));
        // Still pending and still listed.
        assert_eq!(coordinator.pending().len(), 1);
    }

    #[test]
    fn resolve_twice_fails_already_resolved() {
        let (coordinator, _hub, _dir) = setup();
        let request = coordinator.request("user-auth", "design.md").unwrap();
        coordinator
            .resolve(&request.id, Decision::Approve, None)
            .unwrap();
        let err = coordinator
            .resolve(&request.id, Decision::Approve, None)
            .unwrap_err();
        match err {
            ApprovalError::AlreadyResolved { status, .. } => assert_eq!(status, "approved"),
            other => panic!("Expected AlreadyResolved, got {other}"),
        }
    }

    #[test]
    fn unknown_ids_fail_not_found() {
        let (coordinator, _hub, _dir) = setup();
        assert!(matches!(
            coordinator.status("nope").unwrap_err(),
            ApprovalError::NotFound { .. }
        ));
        assert!(matches!(
            coordinator.resolve("nope", Decision::Approve, None).unwrap_err(),
            ApprovalError::NotFound { .. }
        ));
        assert!(matches!(
            coordinator.cleanup("nope").unwrap_err(),
            ApprovalError::NotFound { .. }
        ));
    }

    #[test]
    fn requests_survive_reload_from_disk() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path());
        store.ensure_layout().unwrap();
        let hub = Arc::new(SyncHub::new());
        let first = ApprovalCoordinator::new(&store, hub.clone(), "proj").unwrap();
        let request = first.request("user-auth", "design.md").unwrap();

        let second = ApprovalCoordinator::new(&store, hub, "proj").unwrap();
        let loaded = second.status(&request.id).unwrap();
        assert_eq!(loaded.artifact_path, "design.md");
        assert_eq!(loaded.status, ApprovalStatus::Pending);
    }

    #[test]
    fn cleanup_removes_the_persisted_file() {
        let (coordinator, _hub, dir) = setup();
        let request = coordinator.request("user-auth", "design.md").unwrap();
        let path = dir
            .path()
            .join(".specflow/approvals")
            .join(format!("{}.json", request.id));
        assert!(path.exists());
        coordinator
            .resolve(&request.id, Decision::Approve, None)
            .unwrap();
        coordinator.cleanup(&request.id).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn resolve_publishes_approval_update() {
        let (coordinator, hub, _dir) = setup();
        let mut sub = hub.subscribe("proj", Some(crate::sync::Topic::ApprovalUpdate));
        let request = coordinator.request("user-auth", "design.md").unwrap();
        coordinator
            .resolve(&request.id, Decision::Approve, None)
            .unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let first = rt.block_on(sub.recv()).unwrap();
        let second = rt.block_on(sub.recv()).unwrap();
        match (first, second) {
            (
                SyncEvent::ApprovalUpdate { status: s1, .. },
                SyncEvent::ApprovalUpdate { status: s2, .. },
            ) => {
                assert_eq!(s1, "pending");
                assert_eq!(s2, "approved");
            }
            _ => panic!("Expected two approval updates"),
        }
    }
}
