//! Priority queue dispatch with retries, timeouts and worker health tracking.

mod executor;
mod queue;
mod task;
mod transitions;
mod worker;

pub use executor::{DistributedExecutor, ExecutorStats, FailureCallback};
pub use task::{SubmitOptions, TaskContext, TaskFn, TaskPriority, TaskSnapshot};
pub use transitions::TaskStatus;
pub use worker::{WorkerKind, WorkerSnapshot};
