//! Dashboard query/filter layer: a pure in-memory transform over the
//! implementation log set of one selected spec.
//!
//! Holds no persistence of its own. The set is loaded from the store and
//! replaced wholesale when a push event arrives for the selected spec;
//! every filter or sort change re-sorts the full set, which stays cheap at
//! one spec's log volume.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::logs::ImplementationLogEntry;
use crate::sync::SyncEvent;
use crate::tasks::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Timestamp,
    TaskId,
    LinesAdded,
    FilesChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Filter and sort state for one dashboard view of a spec's log timeline.
pub struct LogBrowser {
    spec_name: String,
    entries: Vec<ImplementationLogEntry>,
    search: Option<String>,
    task_filter: Option<String>,
    sort_key: SortKey,
    sort_direction: SortDirection,
}

impl LogBrowser {
    pub fn new(spec_name: &str) -> Self {
        Self {
            spec_name: spec_name.to_string(),
            entries: Vec::new(),
            search: None,
            task_filter: None,
            sort_key: SortKey::default(),
            sort_direction: SortDirection::default(),
        }
    }

    pub fn spec_name(&self) -> &str {
        &self.spec_name
    }

    /// Replace the in-memory set, e.g. from an initial query on connect.
    pub fn load(&mut self, entries: Vec<ImplementationLogEntry>) {
        self.entries = entries;
    }

    pub fn set_search(&mut self, query: Option<&str>) {
        self.search = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
    }

    pub fn set_task_filter(&mut self, task_id: Option<&str>) {
        self.task_filter = task_id
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
    }

    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.sort_key = key;
        self.sort_direction = direction;
    }

    /// Apply a push event. Only `implementation-log-update` for the
    /// selected spec changes anything, and it replaces the set wholesale;
    /// merging incrementally would buy nothing at this volume and could
    /// drift from the store.
    pub fn apply_event(&mut self, event: &SyncEvent) {
        if let SyncEvent::ImplementationLogUpdate { spec_name, entries } = event
            && *spec_name == self.spec_name
        {
            self.entries = entries.clone();
        }
    }

    /// The currently visible timeline: filter first, then one full sort.
    pub fn visible(&self) -> Vec<&ImplementationLogEntry> {
        let mut visible: Vec<&ImplementationLogEntry> = self
            .entries
            .iter()
            .filter(|entry| {
                self.task_filter
                    .as_deref()
                    .is_none_or(|task| entry.task_id == task)
            })
            .filter(|entry| {
                self.search
                    .as_deref()
                    .is_none_or(|query| entry.matches_search(query))
            })
            .collect();

        visible.sort_by(|a, b| {
            let ordering = match self.sort_key {
                SortKey::Timestamp => a.timestamp.cmp(&b.timestamp),
                SortKey::TaskId => compare_task_ids(&a.task_id, &b.task_id),
                SortKey::LinesAdded => a.statistics.lines_added.cmp(&b.statistics.lines_added),
                SortKey::FilesChanged => {
                    a.statistics.files_changed.cmp(&b.statistics.files_changed)
                }
            };
            // Tie-break on timestamp so equal keys keep timeline order.
            let ordering = ordering.then_with(|| a.timestamp.cmp(&b.timestamp));
            match self.sort_direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        visible
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hierarchical numeric comparison of task ids, falling back to plain
/// string order for ids that are not dotted-numeric.
fn compare_task_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<TaskId>(), b.parse::<TaskId>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
