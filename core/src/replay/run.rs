use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use crate::playbook::{PlaybookStore, PlaybookTask};
use crate::tool::{ParamMap, ToolExecutor, ToolResponse, STATUS_ERROR, STATUS_SKIPPED};

use super::model::{ReplayOutcome, TaskResultRecord};
use super::overrides::ReplayOverrides;
use super::progress::ReplayProgress;
use super::report::build_summary;

/// Re-runs a stored playbook through a [`ToolExecutor`], one task at a
/// time, and writes a report with the delta against the previous run.
pub struct PlaybookReplayer {
    store: PlaybookStore,
    executor: Arc<dyn ToolExecutor>,
    show_progress: bool,
}

impl PlaybookReplayer {
    pub fn new(store: PlaybookStore, executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            store,
            executor,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn store(&self) -> &PlaybookStore {
        &self.store
    }

    /// Replay every task of the `(fiscal_year, rfi)` playbook.
    ///
    /// Only a missing or unreadable playbook ends the run early. Executor
    /// errors and panics become per-task `error` results and a report is
    /// always written.
    pub async fn replay(
        &self,
        fiscal_year: &str,
        rfi: &str,
        user_request: &str,
        overrides: &ReplayOverrides,
    ) -> ReplayOutcome {
        let playbook = match self.store.load_playbook(fiscal_year, rfi) {
            Ok(Some(pb)) => pb,
            Ok(None) => {
                tracing::error!(fiscal_year = %fiscal_year, rfi = %rfi, "no playbook found");
                return ReplayOutcome::error(format!(
                    "no playbook found for {} / {}",
                    fiscal_year, rfi
                ));
            }
            Err(e) => {
                tracing::error!(fiscal_year = %fiscal_year, rfi = %rfi, error = %e, "failed to load playbook");
                return ReplayOutcome::error(e.to_string());
            }
        };

        let executor = self.executor.clone();
        if std::panic::catch_unwind(AssertUnwindSafe(|| executor.set_current_request(user_request)))
            .is_err()
        {
            tracing::warn!("set_current_request panicked, continuing");
        }

        let previous = match self.store.load_report(fiscal_year, rfi) {
            Ok(prev) => prev,
            Err(e) => {
                tracing::warn!(error = %e, "previous report unreadable, diffing against nothing");
                None
            }
        };

        tracing::info!(
            fiscal_year = %fiscal_year,
            rfi = %rfi,
            tasks = playbook.tasks.len(),
            "replay started"
        );

        let mut progress = ReplayProgress::new(playbook.tasks.len(), self.show_progress);
        let mut results = Vec::with_capacity(playbook.tasks.len());
        for task in &playbook.tasks {
            progress.start_task(&task.title);
            let record = self.run_task(task, overrides).await;
            progress.finish_task(&record.title, &record.status, record.duration_ms);
            results.push(record);
        }

        let summary = build_summary(fiscal_year, rfi, Some(user_request), results, previous);
        progress.finish(&summary.task_totals);

        tracing::info!(
            success = summary.task_totals.success,
            error = summary.task_totals.error,
            other = summary.task_totals.other,
            changes = summary.changes_since_last_run.len(),
            "replay finished"
        );

        match self.store.save_report(fiscal_year, rfi, &summary) {
            Ok(path) => ReplayOutcome::success(summary, Some(path.to_string_lossy().to_string())),
            Err(e) => {
                tracing::error!(error = %e, "failed to write replay report");
                ReplayOutcome {
                    result: Some(summary),
                    ..ReplayOutcome::error(format!("failed to write replay report: {}", e))
                }
            }
        }
    }

    async fn run_task(&self, task: &PlaybookTask, overrides: &ReplayOverrides) -> TaskResultRecord {
        let params = overrides.merge_params(task);
        let mut record = TaskResultRecord {
            title: task.title.clone(),
            tool: task.tool.clone(),
            task_key: task.task_key(),
            status: STATUS_SKIPPED.to_string(),
            evidence_path: None,
            result: None,
            error: None,
            params: ParamMap::new(),
            duration_ms: 0,
        };

        let missing = missing_after_merge(task, &params);
        if !missing.is_empty() {
            let reason = format!("missing required fields: {}", missing.join(", "));
            tracing::warn!(task = %task.title, reason = %reason, "task skipped");
            record.error = Some(reason);
            record.params = params;
            return record;
        }

        let started = Instant::now();
        let call = AssertUnwindSafe(self.executor.execute_tool(&task.tool, &params)).catch_unwind();
        let response = match call.await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => ToolResponse::error(e.to_string()),
            Err(_) => ToolResponse::error("tool executor panicked"),
        };
        record.duration_ms = started.elapsed().as_millis() as u64;

        if response.status == STATUS_ERROR {
            tracing::warn!(
                task = %task.title,
                tool = %task.tool,
                error = response.error.as_deref().unwrap_or(""),
                "task failed"
            );
        } else {
            tracing::debug!(task = %task.title, status = %response.status, "task finished");
        }

        record.evidence_path = response.evidence_path();
        record.status = response.status;
        record.result = response.result;
        record.error = response.error;
        record.params = params;
        record
    }
}

/// Required fields still blank once overrides are applied.
fn missing_after_merge(task: &PlaybookTask, params: &ParamMap) -> Vec<&'static str> {
    task.missing_fields()
        .into_iter()
        .filter(|field| {
            *field == "tool"
                || params
                    .get(*field)
                    .and_then(|v| v.as_str())
                    .map_or(true, |v| v.trim().is_empty())
        })
        .collect()
}
