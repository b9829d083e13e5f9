use chrono::Utc;
use serde_json::Value;

use super::diff::compute_changes;
use super::model::{ReplaySummary, TaskResultRecord, TaskTotals};

/// Assemble the report for a run. `previous` is the raw prior report; its
/// own `previous_report` is dropped so history stays one generation deep.
pub fn build_summary(
    fiscal_year: &str,
    rfi: &str,
    user_request: Option<&str>,
    results: Vec<TaskResultRecord>,
    previous: Option<Value>,
) -> ReplaySummary {
    let changes = compute_changes(&results, previous.as_ref());
    let previous_report = previous.map(|mut prev| {
        if let Some(obj) = prev.as_object_mut() {
            obj.remove("previous_report");
        }
        prev
    });

    ReplaySummary {
        generated_at: Utc::now(),
        fiscal_year: fiscal_year.to_string(),
        rfi: rfi.to_string(),
        user_request: user_request
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        task_totals: TaskTotals::count(&results),
        results,
        changes_since_last_run: changes,
        previous_report,
    }
}

pub fn format_text(summary: &ReplaySummary) -> String {
    let mut out = String::new();
    let t = &summary.task_totals;

    out.push_str(&format!(
        "Replay report {} / {}\n",
        summary.fiscal_year, summary.rfi
    ));
    out.push_str(&format!("generated_at: {}\n", summary.generated_at.to_rfc3339()));
    out.push_str(&format!(
        "tasks: {} (success {}, error {}, other {})\n",
        t.total(),
        t.success,
        t.error,
        t.other
    ));

    if !summary.results.is_empty() {
        out.push_str("\nResults:\n");
        for r in &summary.results {
            out.push_str(&format!("- [{}] {} ({})", r.status, r.title, r.tool));
            if let Some(path) = r.evidence_path.as_deref() {
                out.push_str(&format!(" -> {}", path));
            }
            if let Some(err) = r.error.as_deref() {
                out.push_str(&format!(": {}", err));
            }
            out.push('\n');
        }
    }

    out.push_str("\nChanges since last run:\n");
    if summary.previous_report.is_none() {
        out.push_str("- (no previous report)\n");
    } else if summary.changes_since_last_run.is_empty() {
        out.push_str("- (none)\n");
    } else {
        for c in &summary.changes_since_last_run {
            out.push_str(&format!("- {}: {}\n", c.task, c.change));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(title: &str, status: &str) -> TaskResultRecord {
        TaskResultRecord {
            title: title.into(),
            tool: "collect_document".into(),
            task_key: String::new(),
            status: status.into(),
            evidence_path: None,
            result: None,
            error: (status == "error").then(|| "boom".to_string()),
            params: Default::default(),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_previous_report_is_one_generation_deep() {
        let previous = json!({
            "results": [{"title": "a", "status": "error"}],
            "previous_report": {"results": []},
        });
        let summary = build_summary(
            "FY2024",
            "RFI-1",
            Some("  "),
            vec![record("a", "success"), record("b", "skipped")],
            Some(previous),
        );

        assert_eq!(summary.task_totals, TaskTotals { success: 1, error: 0, other: 1 });
        assert!(summary.user_request.is_none());
        let prev = summary.previous_report.as_ref().unwrap();
        assert!(prev.get("previous_report").is_none());
        assert_eq!(summary.changes_since_last_run.len(), 2);
    }

    #[test]
    fn test_format_text() {
        let summary = build_summary("FY2024", "RFI-1", None, vec![record("a", "error")], None);
        let text = format_text(&summary);
        assert!(text.contains("Replay report FY2024 / RFI-1"));
        assert!(text.contains("success 0, error 1, other 0"));
        assert!(text.contains("- [error] a (collect_document): boom"));
        assert!(text.contains("(no previous report)"));
    }
}
