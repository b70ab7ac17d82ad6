//! Realtime sync hub: per-project broadcast of state-change events.
//!
//! The hub is a cache-invalidation signal, not an event log. Delivery is
//! at-most-once and best-effort with no replay buffer; a subscriber that
//! connects after an event must reconcile by re-querying the durable
//! stores. Publishing never blocks and never fails the mutating caller.

pub mod ws;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::logs::ImplementationLogEntry;
use crate::tasks::TaskMarker;

/// Buffered events per project channel before slow subscribers lag.
const CHANNEL_CAPACITY: usize = 256;

/// Named event topics carried by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    TaskStatusUpdate,
    ApprovalUpdate,
    ImplementationLogUpdate,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskStatusUpdate => "task-status-update",
            Self::ApprovalUpdate => "approval-update",
            Self::ImplementationLogUpdate => "implementation-log-update",
        }
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task-status-update" => Ok(Self::TaskStatusUpdate),
            "approval-update" => Ok(Self::ApprovalUpdate),
            "implementation-log-update" => Ok(Self::ImplementationLogUpdate),
            _ => Err(format!("Unknown topic: {s}")),
        }
    }
}

/// A state-change event pushed to dashboard subscribers.
///
/// Serialized as `{"type": "<topic>", "data": {...}}` with camelCase data
/// fields; this shape is part of the dashboard compatibility surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum SyncEvent {
    TaskStatusUpdate {
        spec_name: String,
        task_id: String,
        marker: TaskMarker,
    },
    ApprovalUpdate {
        id: String,
        status: String,
    },
    ImplementationLogUpdate {
        spec_name: String,
        entries: Vec<ImplementationLogEntry>,
    },
}

impl SyncEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::TaskStatusUpdate { .. } => Topic::TaskStatusUpdate,
            Self::ApprovalUpdate { .. } => Topic::ApprovalUpdate,
            Self::ImplementationLogUpdate { .. } => Topic::ImplementationLogUpdate,
        }
    }
}

/// Per-project fan-out over transient broadcast channels.
///
/// A project channel is created on first subscription and reclaimed once
/// its last subscriber has disconnected (lazily, at the next publish). The
/// hub holds no durable state.
pub struct SyncHub {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl SyncHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a project's events, optionally filtered to one topic.
    pub fn subscribe(&self, project_id: &str, topic: Option<Topic>) -> Subscription {
        Subscription {
            rx: self.subscribe_raw(project_id),
            topic,
        }
    }

    /// Subscribe to the raw serialized event stream of a project. Used by
    /// the WebSocket layer, which forwards frames without deserializing.
    pub fn subscribe_raw(&self, project_id: &str) -> broadcast::Receiver<String> {
        let mut channels = self.channels.lock().expect("sync hub lock poisoned");
        channels
            .entry(project_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to all current subscribers of a project.
    ///
    /// Fire-and-forget: serialization failures are logged and swallowed,
    /// and a project with no subscribers drops the event silently. The
    /// durable truth is always the underlying store.
    pub fn publish(&self, project_id: &str, event: &SyncEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                warn!(project = project_id, error = %e, "failed to serialize sync event");
                return;
            }
        };
        let mut channels = self.channels.lock().expect("sync hub lock poisoned");
        if let Some(tx) = channels.get(project_id) {
            if tx.send(payload).is_err() || tx.receiver_count() == 0 {
                // Last subscriber is gone; reclaim the channel.
                channels.remove(project_id);
                debug!(project = project_id, "reclaimed idle project channel");
            }
        }
    }

    /// Number of live subscriber connections for a project.
    pub fn subscriber_count(&self, project_id: &str) -> usize {
        let channels = self.channels.lock().expect("sync hub lock poisoned");
        channels
            .get(project_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A topic-filtered subscription to one project's event stream.
pub struct Subscription {
    rx: broadcast::Receiver<String>,
    topic: Option<Topic>,
}

impl Subscription {
    /// Receive the next matching event, or `None` once the channel closes.
    /// Lagged events are skipped: missing a push is recoverable by
    /// re-querying the store, so there is nothing to replay.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => match serde_json::from_str::<SyncEvent>(&payload) {
                    Ok(event) => {
                        if self.topic.is_none_or(|t| t == event.topic()) {
                            return Some(event);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping undecodable sync event");
                    }
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "subscriber lagged; continuing");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
