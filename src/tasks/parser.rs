//! Parser for the checkbox-encoded task list document.
//!
//! Task lines follow the checkbox convention:
//!
//! ```markdown
//! - [ ] 1. Set up the project skeleton
//! - [-] 2.1 Build the request parser
//! - [x] 2.2 Wire the parser into the router
//! ```
//!
//! `[ ]` is pending, `[-]` is in progress, `[x]` is completed. Lines that do
//! not match the shape (headings, prose, `_Prompt` fields) are passed through
//! untouched; only the marker character is ever rewritten.

use super::{TaskId, TaskMarker, TaskRecord};

/// Parse all task records out of a task list document, in authored order.
pub fn parse_task_list(content: &str) -> Vec<TaskRecord> {
    let mut records = Vec::new();
    for line in content.lines() {
        if let Some((task_id, marker, description)) = parse_task_line(line) {
            records.push(TaskRecord {
                task_id,
                marker,
                description,
                ordinal: records.len(),
            });
        }
    }
    records
}

/// Rewrite the marker of one task in the document, preserving everything
/// else byte for byte. Returns `None` if the task id is not present.
pub fn set_marker(content: &str, task_id: &TaskId, marker: TaskMarker) -> Option<String> {
    let mut found = false;
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let stripped = line.strip_suffix('\n').unwrap_or(line);
        match parse_task_line(stripped) {
            Some((id, _, _)) if !found && id == *task_id => {
                found = true;
                out.push_str(&rewrite_marker(stripped, marker));
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => out.push_str(line),
        }
    }
    found.then_some(out)
}

/// Parse a single line as a task entry: `- [<marker>] <id>[.] <description>`.
fn parse_task_line(line: &str) -> Option<(TaskId, TaskMarker, String)> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix("- [")?;
    let mut chars = rest.chars();
    let marker = TaskMarker::from_checkbox_char(chars.next()?)?;
    let rest = chars.as_str().strip_prefix("] ")?;
    let (id_token, description) = match rest.split_once(char::is_whitespace) {
        Some((id, desc)) => (id, desc.trim().to_string()),
        None => (rest, String::new()),
    };
    let task_id: TaskId = id_token.parse().ok()?;
    Some((task_id, marker, description))
}

/// Replace the checkbox character in an already-validated task line.
fn rewrite_marker(line: &str, marker: TaskMarker) -> String {
    let open = line.find("- [").expect("caller validated task line") + 3;
    let mut out = String::with_capacity(line.len());
    out.push_str(&line[..open]);
    out.push(marker.checkbox_char());
    // Skip the old marker character; valid markers are single-byte ASCII.
    out.push_str(&line[open + line[open..].chars().next().map_or(1, char::len_utf8)..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# Tasks

- [ ] 1. Set up project
  - some note under the task
- [-] 2.1 Build parser
- [x] 2.2 Wire parser into router
- [ ] 10. Final integration

_Prompt: not a task line_
";

    #[test]
    fn parses_only_task_lines() {
        let tasks = parse_task_list(DOC);
        assert_eq!(tasks.len(), 4);
        let ids: Vec<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2.1", "2.2", "10"]);
    }

    #[test]
    fn parses_markers_and_descriptions() {
        let tasks = parse_task_list(DOC);
        assert_eq!(tasks[0].marker, TaskMarker::Pending);
        assert_eq!(tasks[1].marker, TaskMarker::InProgress);
        assert_eq!(tasks[2].marker, TaskMarker::Completed);
        assert_eq!(tasks[0].description, "Set up project");
        assert_eq!(tasks[1].description, "Build parser");
    }

    #[test]
    fn ordinals_follow_authored_order() {
        let tasks = parse_task_list(DOC);
        let ordinals: Vec<usize> = tasks.iter().map(|t| t.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }

    #[test]
    fn strips_trailing_dot_from_numbered_ids() {
        let tasks = parse_task_list("- [ ] 3. Do the thing\n");
        assert_eq!(tasks[0].task_id.as_str(), "3");
    }

    #[test]
    fn set_marker_rewrites_only_the_target_line() {
        let id: TaskId = "2.1".parse().unwrap();
        let updated = set_marker(DOC, &id, TaskMarker::Completed).unwrap();
        assert!(updated.contains("- [x] 2.1 Build parser"));
        // Everything else is untouched.
        assert!(updated.contains("- [ ] 1. Set up project"));
        assert!(updated.contains("  - some note under the task"));
        assert!(updated.contains("_Prompt: not a task line_"));
        assert_eq!(updated.len(), DOC.len());
    }

    #[test]
    fn set_marker_returns_none_for_unknown_task() {
        let id: TaskId = "99".parse().unwrap();
        assert!(set_marker(DOC, &id, TaskMarker::Completed).is_none());
    }

    #[test]
    fn set_marker_round_trips_through_parse() {
        let id: TaskId = "10".parse().unwrap();
        let updated = set_marker(DOC, &id, TaskMarker::InProgress).unwrap();
        let tasks = parse_task_list(&updated);
        let task = tasks.iter().find(|t| t.task_id == id).unwrap();
        assert_eq!(task.marker, TaskMarker::InProgress);
    }

    #[test]
    fn ignores_malformed_checkbox_lines() {
        let tasks = parse_task_list("- [?] 1. Bad marker\n- [ ] notanid Do it\n");
        assert!(tasks.is_empty());
    }

    #[test]
    fn handles_indented_subtasks() {
        let doc = "- [ ] 4. Parent\n  - [ ] 4.1 Child\n";
        let tasks = parse_task_list(doc);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].task_id.as_str(), "4.1");
    }
}
