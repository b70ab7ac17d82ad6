//! Task lifecycle types: hierarchical task ids, status markers, and the
//! per-task records parsed out of a spec's task list document.
//!
//! The system of record is the structured [`TaskRecord`]; the checkbox
//! syntax in `tasks.md` is a serialization concern handled by
//! [`parser`](crate::tasks::parser).

pub mod parser;
pub mod tracker;

pub use tracker::TaskTracker;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A hierarchical task id such as `"2"`, `"2.1"`, or `"10.3.1"`.
///
/// Ordering is numeric per dotted segment, with missing trailing segments
/// treated as zero, so `"2" < "2.1" < "10"` regardless of string length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> impl Iterator<Item = u64> + '_ {
        // Validated at construction, so every segment parses.
        self.0.split('.').map(|s| s.parse().unwrap_or(0))
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('.');
        if s.is_empty() {
            return Err("Task id must not be empty".to_string());
        }
        for segment in s.split('.') {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("Invalid task id: {s}"));
            }
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for TaskId {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut a = self.segments();
        let mut b = other.segments();
        loop {
            match (a.next(), b.next()) {
                (None, None) => break,
                // Missing trailing segments compare as zero.
                (x, y) => match x.unwrap_or(0).cmp(&y.unwrap_or(0)) {
                    Ordering::Equal => continue,
                    ord => return ord,
                },
            }
        }
        // Keep Ord consistent with the string-based Eq ("2" vs "2.0").
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for TaskId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Status marker of one task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskMarker {
    Pending,
    InProgress,
    Completed,
}

impl TaskMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    /// The checkbox character used in the task list document.
    pub fn checkbox_char(&self) -> char {
        match self {
            Self::Pending => ' ',
            Self::InProgress => '-',
            Self::Completed => 'x',
        }
    }

    pub fn from_checkbox_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(Self::Pending),
            '-' => Some(Self::InProgress),
            'x' | 'X' => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskMarker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid task marker: {s}")),
        }
    }
}

/// One atomic unit of planned work inside a task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub description: String,
    pub marker: TaskMarker,
    /// Position of the task within its document, in authored order.
    pub ordinal: usize,
}
