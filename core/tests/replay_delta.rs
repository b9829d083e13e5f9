mod common;

use std::sync::Arc;

use common::{entry, saved_playbook, store, Script, ScriptedExecutor};
use evidex_core::replay::{
    PlaybookReplayer, ReplayOverrides, TaskTotals, EVIDENCE_PATH_CHANGED, NEW_TASK_OR_RENAMED,
};
use evidex_core::tool::{ParamValue, ToolExecutor};
use pretty_assertions::assert_eq;

fn replayer(dir: &tempfile::TempDir, exec: &Arc<ScriptedExecutor>) -> PlaybookReplayer {
    let executor: Arc<dyn ToolExecutor> = exec.clone();
    PlaybookReplayer::new(store(dir), executor)
}

#[tokio::test]
async fn missing_playbook_is_an_error_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let exec = ScriptedExecutor::new();
    let outcome = replayer(&dir, &exec)
        .replay("FY2024", "RFI-404", "collect", &ReplayOverrides::default())
        .await;

    assert!(!outcome.is_success());
    assert!(outcome.error.unwrap().contains("no playbook"));
    assert!(exec.calls().is_empty());
    assert!(!store(&dir).report_path("FY2024", "RFI-404").unwrap().exists());
}

#[tokio::test]
async fn status_change_is_reported_on_second_run() {
    let dir = tempfile::tempdir().unwrap();
    let pb = saved_playbook(
        &store(&dir),
        "RFI-1",
        &[entry("RDS_Backups.png", "aws_console_screenshot", "rds", Some("111111111111"))],
    );
    let title = pb.tasks[0].title.clone();

    let exec = ScriptedExecutor::new();
    exec.script("aws_console_screenshot", Script::Fail("console timeout"));
    let first = replayer(&dir, &exec)
        .replay("FY2024", "RFI-1", "FY2024 evidence", &ReplayOverrides::default())
        .await;
    let first = first.result.unwrap();
    assert_eq!(first.task_totals, TaskTotals { success: 0, error: 1, other: 0 });
    assert!(first.previous_report.is_none());
    assert!(first.changes_since_last_run.is_empty());

    exec.script("aws_console_screenshot", Script::Ok("/evidence/rds.png"));
    let second = replayer(&dir, &exec)
        .replay("FY2024", "RFI-1", "FY2024 evidence", &ReplayOverrides::default())
        .await;
    assert!(second.is_success());
    let second = second.result.unwrap();
    assert_eq!(second.changes_since_last_run.len(), 1);
    assert_eq!(second.changes_since_last_run[0].task, title);
    assert_eq!(
        second.changes_since_last_run[0].change,
        "status changed (error -> success)"
    );
    assert_eq!(second.results[0].evidence_path.as_deref(), Some("/evidence/rds.png"));

    let embedded = second.previous_report.as_ref().unwrap();
    assert_eq!(embedded["task_totals"]["error"], 1);
    assert!(embedded.get("previous_report").map_or(true, |v| v.is_null()));

    assert_eq!(
        exec.requests.lock().unwrap().as_slice(),
        ["FY2024 evidence", "FY2024 evidence"]
    );
}

#[tokio::test]
async fn new_task_and_evidence_path_change() {
    let dir = tempfile::tempdir().unwrap();
    let store_ = store(&dir);
    let exec = ScriptedExecutor::new();
    exec.script("aws_console_screenshot", Script::Ok("/evidence/v1.png"));

    saved_playbook(
        &store_,
        "RFI-2",
        &[entry("RDS_Backups.png", "aws_console_screenshot", "rds", Some("1"))],
    );
    replayer(&dir, &exec)
        .replay("FY2024", "RFI-2", "", &ReplayOverrides::default())
        .await;

    let pb = saved_playbook(
        &store_,
        "RFI-2",
        &[
            entry("RDS_Backups.png", "aws_console_screenshot", "rds", Some("1")),
            entry("S3_Encryption.png", "aws_export_data", "s3", Some("1")),
        ],
    );
    exec.script("aws_console_screenshot", Script::Ok("/evidence/v2.png"));
    let outcome = replayer(&dir, &exec)
        .replay("FY2024", "RFI-2", "", &ReplayOverrides::default())
        .await;

    let changes = outcome.result.unwrap().changes_since_last_run;
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].task, pb.tasks[0].title);
    assert_eq!(changes[0].change, EVIDENCE_PATH_CHANGED);
    assert_eq!(changes[1].task, pb.tasks[1].title);
    assert_eq!(changes[1].change, NEW_TASK_OR_RENAMED);
}

#[tokio::test]
async fn executor_errors_and_panics_do_not_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    saved_playbook(
        &store(&dir),
        "RFI-3",
        &[
            entry("A.png", "raises", "rds", Some("1")),
            entry("B.png", "panics", "rds", Some("1")),
            entry("C.png", "aws_console_screenshot", "rds", None),
            entry("D.png", "aws_console_screenshot", "rds", Some("1")),
        ],
    );

    let exec = ScriptedExecutor::new();
    exec.script("raises", Script::Err("connection reset"));
    exec.script("panics", Script::Panic);

    let outcome = replayer(&dir, &exec)
        .replay("FY2024", "RFI-3", "", &ReplayOverrides::default())
        .await;
    assert!(outcome.is_success());
    let summary = outcome.result.unwrap();

    let statuses: Vec<&str> = summary.results.iter().map(|r| r.status.as_str()).collect();
    assert_eq!(statuses, vec!["error", "error", "skipped", "success"]);
    assert_eq!(summary.task_totals, TaskTotals { success: 1, error: 2, other: 1 });
    assert!(summary.results[0].error.as_deref().unwrap().contains("connection reset"));
    assert!(summary.results[2].error.as_deref().unwrap().contains("account"));

    // The skipped task never reached the executor.
    assert_eq!(exec.calls().len(), 3);
    assert!(store(&dir).report_path("FY2024", "RFI-3").unwrap().exists());
}

#[tokio::test]
async fn overrides_reach_the_executor() {
    let dir = tempfile::tempdir().unwrap();
    saved_playbook(
        &store(&dir),
        "RFI-4",
        &[entry("CloudTrail.png", "aws_console_screenshot", "cloudtrail", None)],
    );

    let exec = ScriptedExecutor::new();
    let overrides = ReplayOverrides {
        account: Some("999999999999".into()),
        start_date: Some("2024-01-01".into()),
        end_date: Some("2024-12-31".into()),
        ..Default::default()
    };
    let outcome = replayer(&dir, &exec)
        .replay("FY2025", "RFI-4", "", &overrides)
        .await;
    // Playbook was saved under FY2024.
    assert!(!outcome.is_success());

    let outcome = replayer(&dir, &exec)
        .replay("FY2024", "RFI-4", "", &overrides)
        .await;
    assert_eq!(outcome.result.unwrap().task_totals.success, 1);

    let (_, params) = &exec.calls()[0];
    assert_eq!(params["account"], ParamValue::from("999999999999"));
    assert_eq!(params["start_date"], ParamValue::from("2024-01-01"));
    assert_eq!(params["filter_by_date"], ParamValue::Bool(true));
    assert_eq!(params["region"], ParamValue::from("us-east-1"));
}
