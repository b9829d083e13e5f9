use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::DistributedConfig;
use crate::error::ExecutorError;
use crate::executor::system::SystemSampler;

use super::queue::PriorityQueue;
use super::task::{SubmitOptions, TaskContext, TaskFn, TaskRecord, TaskSnapshot};
use super::transitions::TaskStatus;
use super::worker::{Worker, WorkerKind, WorkerSnapshot};

pub type FailureCallback = Arc<dyn Fn(&TaskSnapshot) + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorStats {
    pub pending: usize,
    pub running: usize,
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub queued: usize,
    pub workers: Vec<WorkerSnapshot>,
}

/// Priority-ordered task dispatch onto a fixed pool of workers.
///
/// Local workers are tokio tasks pulling from a shared max-heap. A
/// coordinator ticks every `tick_ms` to refresh worker health and fail
/// (and cancel) tasks that outlive their timeout.
pub struct DistributedExecutor {
    inner: Arc<Inner>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    config: DistributedConfig,
    tasks: Mutex<HashMap<String, TaskRecord>>,
    workers: Mutex<HashMap<String, Worker>>,
    queue: PriorityQueue,
    failure_callbacks: Mutex<Vec<FailureCallback>>,
    sampler: Mutex<Option<SystemSampler>>,
    shutdown: CancellationToken,
    running: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DistributedExecutor {
    pub fn new(config: DistributedConfig) -> Self {
        let mut workers = HashMap::new();
        for i in 0..config.local_workers.max(1) {
            let w = Worker::local(format!("local-{i}"));
            workers.insert(w.id.clone(), w);
        }
        for endpoint in &config.remote_workers {
            let w = Worker::remote(endpoint.clone());
            workers.insert(w.id.clone(), w);
        }

        Self {
            inner: Arc::new(Inner {
                config,
                tasks: Mutex::new(HashMap::new()),
                workers: Mutex::new(workers),
                queue: PriorityQueue::new(),
                failure_callbacks: Mutex::new(Vec::new()),
                sampler: Mutex::new(None),
                shutdown: CancellationToken::new(),
                running: AtomicBool::new(false),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the local worker loops and the coordinator. Must be called from
    /// within a tokio runtime. Calling it twice is a no-op.
    pub fn start(&self) -> Result<(), ExecutorError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(ExecutorError::ShutDown);
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let local_ids: Vec<String> = lock(&self.inner.workers)
            .values()
            .filter(|w| w.kind == WorkerKind::Local)
            .map(|w| w.id.clone())
            .collect();

        let mut handles = lock(&self.handles);
        for worker_id in local_ids {
            let inner = self.inner.clone();
            handles.push(tokio::spawn(worker_loop(inner, worker_id)));
        }
        handles.push(tokio::spawn(coordinator_loop(self.inner.clone())));

        tracing::info!(
            workers = handles.len() - 1,
            tick_ms = self.inner.config.tick_ms,
            "distributed executor started"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst) && !self.inner.shutdown.is_cancelled()
    }

    /// Queue an async job. The closure is called once per attempt.
    pub fn submit<F, Fut>(
        &self,
        name: impl Into<String>,
        options: SubmitOptions,
        func: F,
    ) -> Result<String, ExecutorError>
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        if self.inner.shutdown.is_cancelled() {
            return Err(ExecutorError::ShutDown);
        }

        let func: TaskFn = Arc::new(move |ctx| func(ctx).boxed());
        let id = Uuid::new_v4().to_string();
        let max_retries = options.max_retries.unwrap_or(self.inner.config.max_retries);
        let timeout = options.timeout.or_else(|| {
            (self.inner.config.task_timeout_secs > 0)
                .then(|| Duration::from_secs(self.inner.config.task_timeout_secs))
        });

        let record = TaskRecord::new(
            id.clone(),
            name.into(),
            options.priority,
            max_retries,
            timeout,
            func,
        );
        tracing::debug!(task_id = %id, name = %record.name, priority = ?options.priority, "task submitted");

        lock(&self.inner.tasks).insert(id.clone(), record);
        self.inner.queue.push(id.clone(), options.priority);
        Ok(id)
    }

    /// Current state of a task; with `wait`, block until it is terminal or
    /// `timeout` elapses.
    pub async fn get_task_result(
        &self,
        task_id: &str,
        wait: bool,
        timeout: Option<Duration>,
    ) -> Result<TaskSnapshot, ExecutorError> {
        let mut rx = {
            let tasks = lock(&self.inner.tasks);
            let record = tasks
                .get(task_id)
                .ok_or_else(|| ExecutorError::TaskNotFound(task_id.to_string()))?;
            if !wait || record.status.is_terminal() {
                return Ok(record.snapshot());
            }
            if !self.is_running() {
                return Err(ExecutorError::NotRunning);
            }
            record.status_tx.subscribe()
        };

        let waiting = async {
            // The sender lives in the task map, which outlives this call.
            let _ = rx.wait_for(|status| status.is_terminal()).await;
        };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, waiting)
                .await
                .map_err(|_| ExecutorError::WaitTimeout(limit.as_millis() as u64))?,
            None => waiting.await,
        }

        self.task(task_id)
            .ok_or_else(|| ExecutorError::TaskNotFound(task_id.to_string()))
    }

    pub fn task(&self, task_id: &str) -> Option<TaskSnapshot> {
        lock(&self.inner.tasks).get(task_id).map(TaskRecord::snapshot)
    }

    /// Cancel a queued or running task. Returns false if it already finished.
    pub fn cancel_task(&self, task_id: &str) -> Result<bool, ExecutorError> {
        let mut tasks = lock(&self.inner.tasks);
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| ExecutorError::TaskNotFound(task_id.to_string()))?;
        if record.status.is_terminal() {
            return Ok(false);
        }
        record.transition(TaskStatus::Cancelled)?;
        record.error = Some(ExecutorError::Cancelled.to_string());
        if let Some(token) = record.cancel.take() {
            token.cancel();
        }
        tracing::info!(task_id = %task_id, "task cancelled");
        Ok(true)
    }

    pub fn on_failure<F>(&self, callback: F)
    where
        F: Fn(&TaskSnapshot) + Send + Sync + 'static,
    {
        lock(&self.inner.failure_callbacks).push(Arc::new(callback));
    }

    pub fn record_heartbeat(&self, worker_id: &str) -> Result<(), ExecutorError> {
        let mut workers = lock(&self.inner.workers);
        let worker = workers
            .get_mut(worker_id)
            .ok_or_else(|| ExecutorError::WorkerNotFound(worker_id.to_string()))?;
        worker.last_heartbeat = Instant::now();
        worker.healthy = true;
        Ok(())
    }

    pub fn workers(&self) -> Vec<WorkerSnapshot> {
        let mut out: Vec<WorkerSnapshot> = lock(&self.inner.workers)
            .values()
            .map(Worker::snapshot)
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn stats(&self) -> ExecutorStats {
        let mut stats = ExecutorStats::default();
        for record in lock(&self.inner.tasks).values() {
            match record.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Retrying => stats.retrying += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats.queued = self.inner.queue.len();
        stats.workers = self.workers();
        stats
    }

    /// Stop all loops, cancel in-flight work and mark unfinished tasks cancelled.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = lock(&self.handles).drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        let mut tasks = lock(&self.inner.tasks);
        for record in tasks.values_mut() {
            if !record.status.is_terminal() {
                let _ = record.transition(TaskStatus::Cancelled);
                record.error = Some(ExecutorError::ShutDown.to_string());
            }
        }
        self.inner.running.store(false, Ordering::SeqCst);
        tracing::info!("distributed executor stopped");
    }
}

impl Drop for DistributedExecutor {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

enum Attempt {
    Finished(Result<Value, String>),
    Interrupted,
}

async fn worker_loop(inner: Arc<Inner>, worker_id: String) {
    loop {
        let entry = tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            entry = inner.queue.pop() => entry,
        };
        inner.run_task(&worker_id, &entry.task_id).await;
    }
    tracing::debug!(worker = %worker_id, "worker loop exited");
}

async fn coordinator_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(inner.config.tick_ms.max(1)));
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                inner.check_workers();
                inner.check_timeouts();
            }
        }
    }
}

impl Inner {
    async fn run_task(&self, worker_id: &str, task_id: &str) {
        let (func, ctx) = {
            let mut tasks = lock(&self.tasks);
            let Some(record) = tasks.get_mut(task_id) else {
                return;
            };
            // Cancelled while queued.
            if !record.status.is_dispatchable() {
                return;
            }
            if record.transition(TaskStatus::Running).is_err() {
                return;
            }
            let token = self.shutdown.child_token();
            record.cancel = Some(token.clone());
            record.worker_id = Some(worker_id.to_string());
            record.started_at = Some(Utc::now());
            record.started_instant = Some(Instant::now());
            let ctx = TaskContext {
                task_id: task_id.to_string(),
                attempt: record.retries,
                cancel: token,
            };
            (record.func.clone(), ctx)
        };

        self.set_current_task(worker_id, Some(task_id));
        tracing::debug!(worker = %worker_id, task_id = %task_id, attempt = ctx.attempt, "task started");

        let cancel = ctx.cancel.clone();
        let call = AssertUnwindSafe(func(ctx)).catch_unwind();
        let attempt = tokio::select! {
            _ = cancel.cancelled() => Attempt::Interrupted,
            res = call => Attempt::Finished(match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("task panicked".to_string()),
            }),
        };

        self.set_current_task(worker_id, None);

        match attempt {
            // Whoever cancelled the token already recorded the final status.
            Attempt::Interrupted => {}
            Attempt::Finished(Ok(value)) => self.complete(worker_id, task_id, value),
            Attempt::Finished(Err(error)) => self.fail_attempt(worker_id, task_id, error),
        }
    }

    fn complete(&self, worker_id: &str, task_id: &str, value: Value) {
        {
            let mut tasks = lock(&self.tasks);
            let Some(record) = tasks.get_mut(task_id) else {
                return;
            };
            if record.status != TaskStatus::Running {
                return;
            }
            record.cancel = None;
            record.result = Some(value);
            record.error = None;
            let _ = record.transition(TaskStatus::Completed);
        }
        if let Some(worker) = lock(&self.workers).get_mut(worker_id) {
            worker.completed += 1;
        }
        tracing::debug!(task_id = %task_id, "task completed");
    }

    fn fail_attempt(&self, worker_id: &str, task_id: &str, error: String) {
        let failed = {
            let mut tasks = lock(&self.tasks);
            let Some(record) = tasks.get_mut(task_id) else {
                return;
            };
            if record.status != TaskStatus::Running {
                return;
            }
            record.cancel = None;
            record.retries += 1;
            record.error = Some(error.clone());

            if record.retries <= record.max_retries {
                let _ = record.transition(TaskStatus::Retrying);
                tracing::warn!(
                    task_id = %task_id,
                    retry = record.retries,
                    max_retries = record.max_retries,
                    error = %error,
                    "task failed, retrying"
                );
                self.queue.push(task_id.to_string(), record.priority);
                None
            } else {
                let _ = record.transition(TaskStatus::Failed);
                tracing::error!(task_id = %task_id, error = %error, "task failed permanently");
                Some(record.snapshot())
            }
        };

        if let Some(worker) = lock(&self.workers).get_mut(worker_id) {
            worker.failed += 1;
        }
        if let Some(snapshot) = failed {
            self.notify_failure(&snapshot);
        }
    }

    fn notify_failure(&self, snapshot: &TaskSnapshot) {
        let callbacks: Vec<FailureCallback> = lock(&self.failure_callbacks).clone();
        for cb in callbacks {
            if std::panic::catch_unwind(AssertUnwindSafe(|| cb(snapshot))).is_err() {
                tracing::warn!(task_id = %snapshot.id, "failure callback panicked");
            }
        }
    }

    fn set_current_task(&self, worker_id: &str, task_id: Option<&str>) {
        if let Some(worker) = lock(&self.workers).get_mut(worker_id) {
            worker.current_task = task_id.map(str::to_string);
        }
    }

    fn check_workers(&self) {
        let load = lock(&self.sampler)
            .get_or_insert_with(SystemSampler::new)
            .sample();
        let heartbeat_timeout = Duration::from_secs(self.config.heartbeat_timeout_secs);

        for worker in lock(&self.workers).values_mut() {
            if worker.kind == WorkerKind::Local {
                worker.record_load(load);
            }
            let was_healthy = worker.healthy;
            if !worker.check_health(heartbeat_timeout) && was_healthy {
                tracing::warn!(worker = %worker.id, "worker missed heartbeat, marked unhealthy");
            }
        }
    }

    fn check_timeouts(&self) {
        let mut expired = Vec::new();
        {
            let mut tasks = lock(&self.tasks);
            for record in tasks.values_mut() {
                if !record.timed_out() {
                    continue;
                }
                let limit_ms = record
                    .timeout
                    .map(|t| t.as_millis() as u64)
                    .unwrap_or_default();
                record.error = Some(ExecutorError::TaskTimeout(limit_ms).to_string());
                let _ = record.transition(TaskStatus::Failed);
                if let Some(token) = record.cancel.take() {
                    token.cancel();
                }
                if let Some(worker_id) = record.worker_id.as_deref() {
                    tracing::warn!(task_id = %record.id, worker = %worker_id, "task timed out");
                }
                expired.push(record.snapshot());
            }
        }

        if expired.is_empty() {
            return;
        }
        {
            let mut workers = lock(&self.workers);
            for snapshot in &expired {
                if let Some(worker) = snapshot
                    .worker_id
                    .as_deref()
                    .and_then(|id| workers.get_mut(id))
                {
                    worker.failed += 1;
                }
            }
        }
        for snapshot in &expired {
            self.notify_failure(snapshot);
        }
    }
}
