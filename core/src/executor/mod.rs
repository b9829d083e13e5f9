//! Fan-out execution for tool calls.
//!
//! [`ParallelExecutor`] spreads one request over many (account, region)
//! targets and aggregates the outcome. [`DistributedExecutor`] is a
//! longer-lived pool with priorities, retries and timeouts for callers that
//! submit jobs and collect results later.

pub mod distributed;
mod parallel;
mod strategy;
mod system;

pub use distributed::{
    DistributedExecutor, ExecutorStats, SubmitOptions, TaskContext, TaskPriority, TaskSnapshot,
    TaskStatus,
};
pub use parallel::{parse_multi_account_request, BatchStatus, ParallelExecutor, ParallelOutcome};
pub use strategy::{ConcurrencyContext, ConcurrencyStrategy};
pub use system::{SystemLoad, SystemSampler};
