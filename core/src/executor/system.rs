use std::time::{Duration, Instant};

/// Snapshot of host load used for worker load scores and adaptive concurrency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemLoad {
    pub cpu_count: usize,
    /// Average CPU usage in percent (0-100).
    pub cpu_usage: f32,
    /// Used memory in percent (0-100).
    pub memory_usage: f32,
}

/// Samples CPU and memory at most once per `refresh_every`.
pub struct SystemSampler {
    sys: sysinfo::System,
    last_refresh: Instant,
    refresh_every: Duration,
    cached: SystemLoad,
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut sys = sysinfo::System::new();
        let cached = Self::measure(&mut sys);
        Self {
            sys,
            last_refresh: Instant::now(),
            refresh_every: Duration::from_secs(1),
            cached,
        }
    }

    pub fn sample(&mut self) -> SystemLoad {
        if self.last_refresh.elapsed() > self.refresh_every {
            self.cached = Self::measure(&mut self.sys);
            self.last_refresh = Instant::now();
        }
        self.cached
    }

    fn measure(sys: &mut sysinfo::System) -> SystemLoad {
        sys.refresh_cpu();
        sys.refresh_memory();
        let cpu_count = match sys.cpus().len() {
            0 => num_cpus::get().max(1),
            n => n,
        };
        let cpu_usage = sys.cpus().iter().map(|c| c.cpu_usage()).sum::<f32>() / cpu_count as f32;
        let total_memory = sys.total_memory().max(1);
        let memory_usage = (sys.used_memory() as f32 / total_memory as f32) * 100.0;
        SystemLoad {
            cpu_count,
            cpu_usage,
            memory_usage,
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}
