use thiserror::Error;

/// Errors surfaced by the fan-out executors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Executor is not running")]
    NotRunning,

    #[error("Executor has been shut down")]
    ShutDown,

    #[error("Timed out after {0} ms waiting for task result")]
    WaitTimeout(u64),

    #[error("Task timed out after {0} ms")]
    TaskTimeout(u64),

    #[error("Task was cancelled")]
    Cancelled,

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),
}
