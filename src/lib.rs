//! Coordination engine for spec-driven development workflows.
//!
//! An agent drives specs through phases behind human approval gates: an
//! approval coordinator gates phase advancement, a task tracker enforces
//! one in-progress task per spec, an implementation log store keeps the
//! per-task audit trail, and a sync hub pushes state changes to dashboard
//! clients over WebSocket.

pub mod approvals;
pub mod cmd;
pub mod dashboard;
pub mod errors;
pub mod logs;
pub mod server;
pub mod store;
pub mod sync;
pub mod tasks;
pub mod workflow;
