/// Decides how many fan-out calls may be in flight at once.
pub trait ConcurrencyStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize;
}

/// Host load and batch shape at the moment a fan-out batch starts.
#[derive(Debug, Clone)]
pub struct ConcurrencyContext {
    /// Average CPU usage in percent (0-100).
    pub cpu_usage: f32,
    /// Used memory in percent (0-100).
    pub memory_usage: f32,
    /// Targets (accounts, regions) still waiting in this batch.
    pub pending_targets: usize,
    /// The executor's configured worker count.
    pub base_concurrency: usize,
}
