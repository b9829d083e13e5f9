mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{Script, ScriptedExecutor};
use evidex_core::executor::{BatchStatus, ParallelExecutor};
use evidex_core::tool::{param_str, FanOutToolExecutor, ParamMap, ParamValue, ToolExecutor};
use serde_json::json;

fn params(pairs: &[(&str, &str)]) -> ParamMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), ParamValue::from(*v)))
        .collect()
}

#[tokio::test]
async fn partition_of_raised_error_and_success() {
    let executor = ParallelExecutor::new(4);
    let list = vec![
        params(&[("mode", "raise")]),
        params(&[("mode", "error")]),
        params(&[("mode", "ok")]),
    ];

    let outcome = executor
        .execute_parallel(
            |p: ParamMap| async move {
                match param_str(&p, "mode") {
                    Some("raise") => Err(anyhow::anyhow!("boom")),
                    Some("error") => Ok(json!({"status": "error", "error": "denied"})),
                    _ => Ok(json!({"status": "success"})),
                }
            },
            list,
            "partition",
        )
        .await;

    assert_eq!(outcome.successful, 1);
    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.status, BatchStatus::PartialSuccess);
    assert_eq!(outcome.failures[0]["error"], "boom");
    assert_eq!(outcome.failures[0]["params"]["mode"], "raise");
    assert_eq!(outcome.failures[1]["error"], "denied");
}

#[tokio::test]
async fn panics_are_isolated() {
    let executor = ParallelExecutor::new(2);
    let outcome = executor
        .execute_parallel(
            |p: ParamMap| async move {
                if param_str(&p, "n") == Some("1") {
                    panic!("worker blew up");
                }
                Ok::<_, anyhow::Error>(json!({"n": param_str(&p, "n")}))
            },
            vec![params(&[("n", "0")]), params(&[("n", "1")]), params(&[("n", "2")])],
            "panics",
        )
        .await;

    assert_eq!(outcome.successful, 2);
    assert_eq!(outcome.failed, 1);
    assert!(outcome.failures[0]["error"]
        .as_str()
        .unwrap()
        .contains("worker blew up"));
    assert_eq!(outcome.results[0]["n"], "0");
    assert_eq!(outcome.results[1]["n"], "2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_target_runs_on_the_calling_thread() {
    let caller = std::thread::current().id();
    let seen = Arc::new(Mutex::new(None));
    let seen_in = seen.clone();

    let outcome = ParallelExecutor::new(4)
        .execute_parallel(
            move |_p: ParamMap| {
                let seen = seen_in.clone();
                async move {
                    *seen.lock().unwrap() = Some(std::thread::current().id());
                    Ok::<_, anyhow::Error>(json!({"status": "success"}))
                }
            },
            vec![params(&[("aws_account", "1")])],
            "inline",
        )
        .await;

    assert_eq!(outcome.status, BatchStatus::Success);
    assert_eq!(*seen.lock().unwrap(), Some(caller));
}

#[tokio::test]
async fn empty_input_is_success_with_zero_totals() {
    let outcome = ParallelExecutor::new(2)
        .execute_parallel(
            |_p: ParamMap| async { Ok::<_, anyhow::Error>(json!({})) },
            Vec::new(),
            "empty",
        )
        .await;
    assert_eq!(outcome.status, BatchStatus::Success);
    assert_eq!((outcome.total, outcome.successful, outcome.failed), (0, 0, 0));
}

#[tokio::test]
async fn concurrency_is_bounded_by_max_workers() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (f, p) = (in_flight.clone(), peak.clone());

    let list = (0..8).map(|i| params(&[("i", &i.to_string())])).collect();
    let outcome = ParallelExecutor::new(2)
        .execute_parallel(
            move |_p: ParamMap| {
                let (f, p) = (f.clone(), p.clone());
                async move {
                    let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    f.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(json!({"status": "success"}))
                }
            },
            list,
            "bounded",
        )
        .await;

    assert_eq!(outcome.successful, 8);
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn fan_out_executor_expands_accounts_and_regions() {
    let inner = ScriptedExecutor::new();
    inner.script("aws_export_data", Script::Ok("/evidence/export.csv"));
    let fan_out = FanOutToolExecutor::new(inner.clone(), Arc::new(ParallelExecutor::new(4)));

    let resp = fan_out
        .execute_tool(
            "aws_export_data",
            &params(&[("aws_account", "a,b"), ("aws_region", "r1 r2"), ("service", "iam")]),
        )
        .await
        .unwrap();

    assert_eq!(resp.status, "success");
    assert!(resp.error.is_none());
    let result = resp.result.unwrap();
    assert_eq!(result["total"], 4);
    assert_eq!(result["status"], "success");

    let mut pairs: Vec<(String, String)> = inner
        .calls()
        .iter()
        .map(|(_, p)| {
            (
                param_str(p, "aws_account").unwrap().to_string(),
                param_str(p, "aws_region").unwrap().to_string(),
            )
        })
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("a".into(), "r1".into()),
            ("a".into(), "r2".into()),
            ("b".into(), "r1".into()),
            ("b".into(), "r2".into()),
        ]
    );
}

#[tokio::test]
async fn fan_out_executor_reports_total_failure_as_error() {
    let inner = ScriptedExecutor::new();
    inner.script("aws_console_screenshot", Script::Fail("denied"));
    let fan_out = FanOutToolExecutor::new(inner.clone(), Arc::new(ParallelExecutor::new(2)));

    let resp = fan_out
        .execute_tool(
            "aws_console_screenshot",
            &params(&[("account", "a b"), ("region", "r1")]),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, "error");
    assert!(resp.error.unwrap().contains("2 of 2"));
}

#[tokio::test]
async fn fan_out_executor_passes_single_targets_through() {
    let inner = ScriptedExecutor::new();
    let fan_out = FanOutToolExecutor::new(inner.clone(), Arc::new(ParallelExecutor::new(2)))
        .restrict_to(["aws_export_data"]);

    let resp = fan_out
        .execute_tool("aws_console_screenshot", &params(&[("account", "a,b"), ("region", "r1")]))
        .await
        .unwrap();
    assert_eq!(resp.result.unwrap()["evidence_path"], "/evidence/default.png");
    assert_eq!(inner.calls().len(), 1);

    fan_out.set_current_request("quarterly");
    assert_eq!(inner.requests.lock().unwrap().as_slice(), ["quarterly"]);
}
