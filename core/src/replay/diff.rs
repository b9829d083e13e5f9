use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::model::{ChangeEntry, TaskResultRecord};

pub const NEW_TASK_OR_RENAMED: &str = "new_task_or_renamed";
pub const EVIDENCE_PATH_CHANGED: &str = "evidence_path_changed";
pub const REMOVED_SINCE_LAST_RUN: &str = "removed_since_last_run";

struct PreviousResult {
    status: Option<String>,
    evidence_path: Option<String>,
}

/// Changes between this run and the previous report, matched by task title.
///
/// The previous report is read loosely from raw JSON so that reports
/// written by older versions still diff.
pub fn compute_changes(current: &[TaskResultRecord], previous: Option<&Value>) -> Vec<ChangeEntry> {
    let Some(prev) = previous else {
        return Vec::new();
    };

    let mut prev_order = Vec::new();
    let mut prev_by_title: HashMap<String, PreviousResult> = HashMap::new();
    if let Some(items) = prev.get("results").and_then(|r| r.as_array()) {
        for item in items {
            let Some(title) = item.get("title").and_then(|t| t.as_str()) else {
                continue;
            };
            if prev_by_title.contains_key(title) {
                continue;
            }
            prev_order.push(title.to_string());
            prev_by_title.insert(
                title.to_string(),
                PreviousResult {
                    status: get_str(item, "status"),
                    evidence_path: get_str(item, "evidence_path"),
                },
            );
        }
    }

    let mut changes = Vec::new();
    let mut seen = HashSet::new();
    for r in current {
        if !seen.insert(r.title.as_str()) {
            continue;
        }
        let change = match prev_by_title.get(&r.title) {
            None => Some(NEW_TASK_OR_RENAMED.to_string()),
            Some(p) if p.status.as_deref() != Some(r.status.as_str()) => Some(format!(
                "status changed ({} -> {})",
                p.status.as_deref().unwrap_or("unknown"),
                r.status
            )),
            Some(p) if p.evidence_path != r.evidence_path => {
                Some(EVIDENCE_PATH_CHANGED.to_string())
            }
            Some(_) => None,
        };
        if let Some(change) = change {
            changes.push(ChangeEntry {
                task: r.title.clone(),
                change,
            });
        }
    }

    for title in prev_order {
        if !seen.contains(title.as_str()) {
            changes.push(ChangeEntry {
                task: title,
                change: REMOVED_SINCE_LAST_RUN.to_string(),
            });
        }
    }

    changes
}

fn get_str(v: &Value, k: &str) -> Option<String> {
    v.get(k).and_then(|x| x.as_str()).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(title: &str, status: &str, path: Option<&str>) -> TaskResultRecord {
        TaskResultRecord {
            title: title.into(),
            tool: "aws_console_screenshot".into(),
            task_key: String::new(),
            status: status.into(),
            evidence_path: path.map(str::to_string),
            result: None,
            error: None,
            params: Default::default(),
            duration_ms: 0,
        }
    }

    #[test]
    fn test_no_previous_report() {
        assert!(compute_changes(&[record("a", "success", None)], None).is_empty());
    }

    #[test]
    fn test_all_change_kinds() {
        let previous = json!({
            "results": [
                {"title": "flipped", "status": "error"},
                {"title": "moved", "status": "success", "evidence_path": "/old.png"},
                {"title": "same", "status": "success", "evidence_path": "/same.png"},
                {"title": "gone", "status": "success"},
            ]
        });
        let current = vec![
            record("flipped", "success", None),
            record("moved", "success", Some("/new.png")),
            record("same", "success", Some("/same.png")),
            record("fresh", "skipped", None),
        ];

        let changes = compute_changes(&current, Some(&previous));
        let pairs: Vec<(&str, &str)> = changes
            .iter()
            .map(|c| (c.task.as_str(), c.change.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("flipped", "status changed (error -> success)"),
                ("moved", EVIDENCE_PATH_CHANGED),
                ("fresh", NEW_TASK_OR_RENAMED),
                ("gone", REMOVED_SINCE_LAST_RUN),
            ]
        );
    }

    #[test]
    fn test_malformed_previous_report_treats_everything_as_new() {
        let changes = compute_changes(&[record("a", "success", None)], Some(&json!("garbage")));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change, NEW_TASK_OR_RENAMED);
    }
}
