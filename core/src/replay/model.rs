use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::{ParamMap, STATUS_ERROR, STATUS_SUCCESS};

/// Outcome of one playbook task in one replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultRecord {
    pub title: String,
    pub tool: String,
    /// `tool|service|account|region`; stable across title renames.
    #[serde(default)]
    pub task_key: String,
    pub status: String,
    #[serde(default)]
    pub evidence_path: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub params: ParamMap,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTotals {
    pub success: usize,
    pub error: usize,
    pub other: usize,
}

impl TaskTotals {
    pub fn count(results: &[TaskResultRecord]) -> Self {
        let mut totals = Self::default();
        for r in results {
            match r.status.as_str() {
                STATUS_SUCCESS => totals.success += 1,
                STATUS_ERROR => totals.error += 1,
                _ => totals.other += 1,
            }
        }
        totals
    }

    pub fn total(&self) -> usize {
        self.success + self.error + self.other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub task: String,
    pub change: String,
}

/// The persisted replay report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub generated_at: DateTime<Utc>,
    pub fiscal_year: String,
    pub rfi: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_request: Option<String>,
    pub task_totals: TaskTotals,
    pub results: Vec<TaskResultRecord>,
    #[serde(default)]
    pub changes_since_last_run: Vec<ChangeEntry>,
    /// The report this one replaced, one generation deep.
    #[serde(default)]
    pub previous_report: Option<Value>,
}

/// What `replay` hands back: `{status, result}` or `{status, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ReplaySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
}

impl ReplayOutcome {
    pub fn success(summary: ReplaySummary, report_path: Option<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            result: Some(summary),
            error: None,
            report_path,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            result: None,
            error: Some(message.into()),
            report_path: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}
