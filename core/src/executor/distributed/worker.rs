use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::executor::system::SystemLoad;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerKind {
    Local,
    /// Named endpoint; dispatch is not implemented, only health tracking.
    Remote { endpoint: String },
}

#[derive(Debug, Clone)]
pub(crate) struct Worker {
    pub id: String,
    pub kind: WorkerKind,
    pub current_task: Option<String>,
    pub completed: u64,
    pub failed: u64,
    pub last_heartbeat: Instant,
    pub healthy: bool,
    pub cpu_usage: f32,
    pub memory_usage: f32,
}

impl Worker {
    pub fn local(id: String) -> Self {
        Self::new(id, WorkerKind::Local)
    }

    pub fn remote(endpoint: String) -> Self {
        Self::new(
            format!("remote-{endpoint}"),
            WorkerKind::Remote { endpoint },
        )
    }

    fn new(id: String, kind: WorkerKind) -> Self {
        Self {
            id,
            kind,
            current_task: None,
            completed: 0,
            failed: 0,
            last_heartbeat: Instant::now(),
            healthy: true,
            cpu_usage: 0.0,
            memory_usage: 0.0,
        }
    }

    /// Local workers are always healthy; remote ones go stale without heartbeats.
    pub fn check_health(&mut self, heartbeat_timeout: Duration) -> bool {
        self.healthy = match self.kind {
            WorkerKind::Local => true,
            WorkerKind::Remote { .. } => self.last_heartbeat.elapsed() <= heartbeat_timeout,
        };
        self.healthy
    }

    pub fn record_load(&mut self, load: SystemLoad) {
        self.cpu_usage = load.cpu_usage;
        self.memory_usage = load.memory_usage;
        self.last_heartbeat = Instant::now();
    }

    /// Occupancy (0 or 1) plus CPU and memory normalized to 0..1.
    pub fn load_score(&self) -> f32 {
        let occupancy = if self.current_task.is_some() { 1.0 } else { 0.0 };
        occupancy + self.cpu_usage / 100.0 + self.memory_usage / 100.0
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            id: self.id.clone(),
            kind: self.kind.clone(),
            current_task: self.current_task.clone(),
            completed: self.completed,
            failed: self.failed,
            healthy: self.healthy,
            load_score: self.load_score(),
            secs_since_heartbeat: self.last_heartbeat.elapsed().as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub id: String,
    pub kind: WorkerKind,
    pub current_task: Option<String>,
    pub completed: u64,
    pub failed: u64,
    pub healthy: bool,
    pub load_score: f32,
    pub secs_since_heartbeat: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_score_counts_occupancy() {
        let mut worker = Worker::local("local-0".into());
        worker.record_load(SystemLoad {
            cpu_count: 4,
            cpu_usage: 50.0,
            memory_usage: 25.0,
        });
        assert!((worker.load_score() - 0.75).abs() < f32::EPSILON);

        worker.current_task = Some("t1".into());
        assert!((worker.load_score() - 1.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_remote_worker_goes_stale() {
        let mut remote = Worker::remote("10.0.0.5:9000".into());
        assert!(remote.check_health(Duration::from_secs(30)));

        if let Some(stale) = Instant::now().checked_sub(Duration::from_secs(31)) {
            remote.last_heartbeat = stale;
            assert!(!remote.check_health(Duration::from_secs(30)));
        }

        let mut local = Worker::local("local-0".into());
        assert!(local.check_health(Duration::ZERO));
    }
}
