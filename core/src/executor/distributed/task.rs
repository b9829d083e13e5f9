use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;

use super::transitions::TaskStatus;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    #[default]
    Normal = 2,
    High = 3,
    Critical = 4,
}

/// Handed to every attempt of a task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    /// Zero for the first attempt.
    pub attempt: u32,
    /// Cancelled on timeout, explicit cancel or executor shutdown.
    pub cancel: CancellationToken,
}

pub type TaskFn =
    Arc<dyn Fn(TaskContext) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub priority: TaskPriority,
    /// Falls back to the executor's configured `max_retries`.
    pub max_retries: Option<u32>,
    /// Falls back to the executor's configured `task_timeout_secs`.
    pub timeout: Option<Duration>,
}

impl SubmitOptions {
    pub fn with_priority(priority: TaskPriority) -> Self {
        Self {
            priority,
            ..Default::default()
        }
    }
}

pub(crate) struct TaskRecord {
    pub id: String,
    pub name: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub retries: u32,
    pub max_retries: u32,
    pub timeout: Option<Duration>,
    pub func: TaskFn,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub started_instant: Option<Instant>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel: Option<CancellationToken>,
    pub status_tx: watch::Sender<TaskStatus>,
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl TaskRecord {
    pub fn new(
        id: String,
        name: String,
        priority: TaskPriority,
        max_retries: u32,
        timeout: Option<Duration>,
        func: TaskFn,
    ) -> Self {
        let (status_tx, _) = watch::channel(TaskStatus::Pending);
        Self {
            id,
            name,
            priority,
            status: TaskStatus::Pending,
            retries: 0,
            max_retries,
            timeout,
            func,
            result: None,
            error: None,
            worker_id: None,
            created_at: Utc::now(),
            started_at: None,
            started_instant: None,
            completed_at: None,
            cancel: None,
            status_tx,
        }
    }

    pub fn transition(&mut self, to: TaskStatus) -> Result<(), ExecutorError> {
        if !self.status.can_transition_to(to) {
            return Err(ExecutorError::InvalidTransition(format!(
                "task {} {:?} -> {:?}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        if to.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.status_tx.send_replace(to);
        Ok(())
    }

    pub fn timed_out(&self) -> bool {
        match (self.status, self.timeout, self.started_instant) {
            (TaskStatus::Running, Some(limit), Some(started)) => started.elapsed() > limit,
            _ => false,
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            priority: self.priority,
            status: self.status,
            retries: self.retries,
            max_retries: self.max_retries,
            result: self.result.clone(),
            error: self.error.clone(),
            worker_id: self.worker_id.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Read-only view of a task handed out to callers and failure callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub name: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub retries: u32,
    pub max_retries: u32,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
