//! Typed error hierarchy for the specflow coordination engine.
//!
//! Four top-level enums cover the four stateful subsystems:
//! - `StoreError` — document store artifact access failures
//! - `ApprovalError` — approval gate state machine violations
//! - `TaskError` — task lifecycle violations
//! - `LogError` — implementation log validation failures
//!
//! All variants are terminal, synchronous, caller-visible failures. Nothing
//! here is retried internally; retry is the caller's decision.

use thiserror::Error;

/// Errors from the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Artifact not found: {path}")]
    NotFound { path: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the approval coordinator.
///
/// The state machine per request id is acyclic: pending → {approved,
/// needs-revision} → cleaned. Every invalid transition maps to its own
/// variant so callers can self-correct without inspecting internal state.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("A pending approval already exists for {path}")]
    Conflict { path: String },

    #[error("Approval {id} not found")]
    NotFound { id: String },

    #[error("Approval {id} is already resolved as {status}")]
    AlreadyResolved { id: String, status: String },

    #[error("Approval {id} has already been cleaned up")]
    AlreadyCleaned { id: String },

    #[error("Approval {id} is still pending; it must be resolved before cleanup")]
    NotResolved { id: String },

    #[error("Decision needs-revision requires a reviewer comment")]
    MissingComment,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the task lifecycle tracker.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Spec {spec} has no task list")]
    SpecNotFound { spec: String },

    #[error("Task {task_id} not found in spec {spec}")]
    NotFound { spec: String, task_id: String },

    #[error("Task {in_progress} is already in progress in spec {spec}; complete it before starting {requested}")]
    AlreadyInProgress {
        spec: String,
        in_progress: String,
        requested: String,
    },

    #[error("Task {task_id} is {marker}, not pending; only pending tasks can be started")]
    NotPending { task_id: String, marker: String },

    #[error("Task {task_id} is {marker}, not in progress; start it before completing")]
    NotInProgress { task_id: String, marker: String },

    #[error("No implementation log entry exists for task {task_id} in spec {spec}; log the implementation before completing")]
    NoImplementationLog { spec: String, task_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the implementation log store.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Implementation log entry is missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Spec {spec} does not exist")]
    SpecNotFound { spec: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_conflict_carries_path() {
        let err = ApprovalError::Conflict {
            path: "specs/user-auth/design.md".to_string(),
        };
        assert!(err.to_string().contains("specs/user-auth/design.md"));
        assert!(matches!(err, ApprovalError::Conflict { .. }));
    }

    #[test]
    fn approval_already_resolved_carries_status() {
        let err = ApprovalError::AlreadyResolved {
            id: "abc".to_string(),
            status: "approved".to_string(),
        };
        assert!(err.to_string().contains("approved"));
    }

    #[test]
    fn task_already_in_progress_names_both_tasks() {
        let err = TaskError::AlreadyInProgress {
            spec: "user-auth".to_string(),
            in_progress: "2".to_string(),
            requested: "3".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains('2'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn task_no_implementation_log_is_matchable() {
        let err = TaskError::NoImplementationLog {
            spec: "user-auth".to_string(),
            task_id: "2.1".to_string(),
        };
        assert!(matches!(err, TaskError::NoImplementationLog { .. }));
        assert!(err.to_string().contains("2.1"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StoreError::NotFound {
            path: "x".to_string(),
        });
        assert_std_error(&ApprovalError::MissingComment);
        assert_std_error(&TaskError::SpecNotFound {
            spec: "x".to_string(),
        });
        assert_std_error(&LogError::MissingField { field: "summary" });
    }

    #[test]
    fn anyhow_errors_convert_into_each_subsystem() {
        let store: StoreError = anyhow::anyhow!("disk full").into();
        assert!(matches!(store, StoreError::Other(_)));
        let approval: ApprovalError = anyhow::anyhow!("disk full").into();
        assert!(matches!(approval, ApprovalError::Other(_)));
    }
}
