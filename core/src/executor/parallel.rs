//! Fan-out of one request over many independent (account, region) targets.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::tool::{param_str, ParamMap, ParamValue, STATUS_ERROR};

use super::strategy::{ConcurrencyContext, ConcurrencyStrategy};
use super::system::SystemSampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Error,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Success => "success",
            BatchStatus::PartialSuccess => "partial_success",
            BatchStatus::Error => "error",
        }
    }

    fn from_counts(successful: usize, failed: usize) -> Self {
        if failed == 0 {
            BatchStatus::Success
        } else if successful == 0 {
            BatchStatus::Error
        } else {
            BatchStatus::PartialSuccess
        }
    }
}

/// Aggregate of one `execute_parallel` call. `results` and `failures` are
/// ordered by the position of their parameter set in the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelOutcome {
    pub status: BatchStatus,
    pub task_name: String,
    pub results: Vec<Value>,
    pub failures: Vec<Value>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

pub struct ParallelExecutor {
    max_workers: usize,
    strategy: Option<Arc<dyn ConcurrencyStrategy>>,
    sampler: Mutex<Option<SystemSampler>>,
}

impl ParallelExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            strategy: None,
            sampler: Mutex::new(None),
        }
    }

    /// Let `strategy` pick the worker bound per call, using `max_workers`
    /// as the base concurrency.
    pub fn with_strategy(max_workers: usize, strategy: Arc<dyn ConcurrencyStrategy>) -> Self {
        Self {
            max_workers: max_workers.max(1),
            strategy: Some(strategy),
            sampler: Mutex::new(None),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `execute_func` once per parameter set.
    ///
    /// A single parameter set runs inline on the calling task. Larger batches
    /// are spawned onto the runtime, bounded by the worker limit. Every call
    /// is isolated: an `Err`, a panic, or a returned `{"status": "error"}`
    /// lands in `failures` without affecting siblings.
    pub async fn execute_parallel<F, Fut>(
        &self,
        execute_func: F,
        params_list: Vec<ParamMap>,
        task_name: &str,
    ) -> ParallelOutcome
    where
        F: Fn(ParamMap) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let total = params_list.len();
        let mut settled: Vec<(usize, Result<Value, Value>)> = Vec::with_capacity(total);

        if total == 1 {
            if let Some(params) = params_list.into_iter().next() {
                let call = AssertUnwindSafe(execute_func(params.clone())).catch_unwind();
                let raw = match call.await {
                    Ok(res) => res.map_err(|e| e.to_string()),
                    Err(panic) => Err(panic_message(panic.as_ref())),
                };
                settled.push((0, classify(&params, raw)));
            }
        } else if total > 1 {
            let workers = self.worker_limit(total);
            tracing::info!(
                task = %task_name,
                targets = total,
                workers,
                "fanning out request"
            );

            let sem = Arc::new(Semaphore::new(workers));
            let mut futs = FuturesUnordered::new();

            for (index, params) in params_list.into_iter().enumerate() {
                let sem = sem.clone();
                let func = execute_func.clone();
                let call_params = params.clone();
                let handle = tokio::spawn(async move {
                    let _permit = sem
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("worker pool closed unexpectedly"))?;
                    func(call_params).await
                });
                futs.push(async move { (index, params, handle.await) });
            }

            while let Some((index, params, joined)) = futs.next().await {
                let raw = match joined {
                    Ok(res) => res.map_err(|e| e.to_string()),
                    Err(join_err) if join_err.is_panic() => {
                        Err(panic_message(join_err.into_panic().as_ref()))
                    }
                    Err(join_err) => Err(join_err.to_string()),
                };
                settled.push((index, classify(&params, raw)));
            }
        }

        settled.sort_by_key(|(index, _)| *index);

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (_, outcome) in settled {
            match outcome {
                Ok(v) => results.push(v),
                Err(v) => failures.push(v),
            }
        }

        let successful = results.len();
        let failed = failures.len();
        let status = BatchStatus::from_counts(successful, failed);

        if failed > 0 {
            tracing::warn!(task = %task_name, successful, failed, "fan-out finished with failures");
        } else {
            tracing::debug!(task = %task_name, successful, "fan-out finished");
        }

        ParallelOutcome {
            status,
            task_name: task_name.to_string(),
            results,
            failures,
            total,
            successful,
            failed,
        }
    }

    fn worker_limit(&self, pending: usize) -> usize {
        let Some(strategy) = self.strategy.as_ref() else {
            return self.max_workers.min(pending).max(1);
        };

        let load = match self.sampler.lock() {
            Ok(mut guard) => Some(guard.get_or_insert_with(SystemSampler::new).sample()),
            Err(_) => None,
        };
        let context = ConcurrencyContext {
            cpu_usage: load.map(|l| l.cpu_usage).unwrap_or(0.0),
            memory_usage: load.map(|l| l.memory_usage).unwrap_or(0.0),
            pending_targets: pending,
            base_concurrency: self.max_workers,
        };
        strategy
            .calculate_concurrency(&context)
            .min(pending)
            .max(1)
    }
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new(num_cpus::get().max(1))
    }
}

fn classify(params: &ParamMap, raw: Result<Value, String>) -> Result<Value, Value> {
    match raw {
        Ok(v) if v.get("status").and_then(Value::as_str) == Some(STATUS_ERROR) => Err(v),
        Ok(v) => Ok(v),
        Err(error) => Err(json!({
            "status": STATUS_ERROR,
            "error": error,
            "params": params,
        })),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

const ACCOUNT_KEYS: [&str; 2] = ["aws_account", "account"];
const REGION_KEYS: [&str; 2] = ["aws_region", "region"];

/// Expand a request carrying comma/space separated account and region lists
/// into one parameter set per (account, region) pair.
///
/// When either list is missing or empty the request is returned unchanged.
pub fn parse_multi_account_request(params: &ParamMap) -> Vec<ParamMap> {
    let Some((account_key, accounts)) = split_list(params, &ACCOUNT_KEYS) else {
        return vec![params.clone()];
    };
    let Some((region_key, regions)) = split_list(params, &REGION_KEYS) else {
        return vec![params.clone()];
    };

    let mut expanded = Vec::with_capacity(accounts.len() * regions.len());
    for account in &accounts {
        for region in &regions {
            let mut p = params.clone();
            p.insert(account_key.to_string(), ParamValue::from(account.as_str()));
            p.insert(region_key.to_string(), ParamValue::from(region.as_str()));
            expanded.push(p);
        }
    }
    expanded
}

fn split_list<'a>(params: &ParamMap, keys: &[&'a str]) -> Option<(&'a str, Vec<String>)> {
    keys.iter().find_map(|key| {
        let raw = param_str(params, key)?;
        let items: Vec<String> = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        (!items.is_empty()).then_some((*key, items))
    })
}
