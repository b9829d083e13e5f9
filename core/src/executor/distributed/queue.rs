use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;

use tokio::sync::Notify;

use super::task::TaskPriority;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueueEntry {
    pub priority: TaskPriority,
    pub seq: u64,
    pub task_id: String,
}

// Higher priority first; FIFO among equal priorities.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap of task ids with an async `pop`.
#[derive(Default)]
pub(crate) struct PriorityQueue {
    heap: Mutex<BinaryHeap<QueueEntry>>,
    notify: Notify,
    seq: AtomicU64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task_id: String, priority: TaskPriority) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        if let Ok(mut heap) = self.heap.lock() {
            heap.push(QueueEntry {
                priority,
                seq,
                task_id,
            });
        }
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<QueueEntry> {
        self.heap.lock().ok().and_then(|mut heap| heap.pop())
    }

    /// Wait until an entry is available.
    pub async fn pop(&self) -> QueueEntry {
        loop {
            if let Some(entry) = self.try_pop() {
                return entry;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().map(|heap| heap.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_then_fifo() {
        let queue = PriorityQueue::new();
        queue.push("low".into(), TaskPriority::Low);
        queue.push("normal-1".into(), TaskPriority::Normal);
        queue.push("critical".into(), TaskPriority::Critical);
        queue.push("normal-2".into(), TaskPriority::Normal);
        queue.push("high".into(), TaskPriority::High);

        let order: Vec<String> = std::iter::from_fn(|| queue.try_pop())
            .map(|e| e.task_id)
            .collect();
        assert_eq!(
            order,
            vec!["critical", "high", "normal-1", "normal-2", "low"]
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = std::sync::Arc::new(PriorityQueue::new());
        let q = queue.clone();
        let waiter = tokio::spawn(async move { q.pop().await.task_id });
        tokio::task::yield_now().await;
        queue.push("late".into(), TaskPriority::Normal);
        assert_eq!(waiter.await.unwrap(), "late");
    }
}
