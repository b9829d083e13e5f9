use evidex_core::config::ConcurrencyConfig;
use evidex_core::executor::{ConcurrencyContext, ConcurrencyStrategy};

/// Picks the width of an account/region fan-out from host pressure.
///
/// Collection calls mostly wait on remote APIs, so the machine's CPU count is
/// not a cap. Memory pressure drops straight to `min_concurrency`, CPU
/// pressure halves the base width, an idle host doubles it. The result never
/// exceeds the number of targets still pending in the batch.
pub struct AdaptiveConcurrency {
    config: ConcurrencyConfig,
}

pub struct FixedConcurrency {
    fixed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pressure {
    Memory,
    Cpu,
    Idle,
    Normal,
}

impl AdaptiveConcurrency {
    pub fn new(config: ConcurrencyConfig) -> Self {
        Self { config }
    }

    fn pressure(&self, context: &ConcurrencyContext) -> Pressure {
        if context.memory_usage >= self.config.memory_threshold_high {
            Pressure::Memory
        } else if context.cpu_usage >= self.config.cpu_threshold_high {
            Pressure::Cpu
        } else if context.cpu_usage <= self.config.cpu_threshold_low {
            Pressure::Idle
        } else {
            Pressure::Normal
        }
    }
}

impl FixedConcurrency {
    pub fn new(fixed: usize) -> Self {
        Self { fixed }
    }
}

impl ConcurrencyStrategy for AdaptiveConcurrency {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize {
        let floor = self.config.min_concurrency.max(1);
        let ceiling = self.config.max_concurrency.max(floor);
        let base = context.base_concurrency.max(1);

        let width = match self.pressure(context) {
            Pressure::Memory => floor,
            Pressure::Cpu => base / 2,
            Pressure::Idle => base.saturating_mul(2),
            Pressure::Normal => base,
        }
        .clamp(floor, ceiling);

        tracing::trace!(
            cpu = context.cpu_usage,
            memory = context.memory_usage,
            pending = context.pending_targets,
            width,
            "adaptive fan-out width"
        );
        width.min(context.pending_targets.max(1))
    }
}

impl ConcurrencyStrategy for FixedConcurrency {
    fn name(&self) -> &str {
        "fixed"
    }

    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize {
        self.fixed.max(1).min(context.pending_targets.max(1))
    }
}
