//! In-memory ready queue, ordered by `next_run` ascending (spec §4.B).
//!
//! Grounded on the teacher's `Mutex<BinaryHeap<T>>` scheduling queue, with the
//! ordering key swapped from `(priority, enqueued_at)` to `next_run` via
//! `Reverse` so the heap pops the earliest-due task first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::store::Task;

/// Wraps a `Task` for heap ordering: earliest `next_run` pops first.
struct QueueEntry(Task);

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.next_run == other.0.next_run && self.0.id == other.0.id
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest next_run pops first.
        other.0.next_run.cmp(&self.0.next_run)
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The ready queue proper. Callers are expected to hold whatever outer lock
/// guards the pause flag and in-flight counter alongside this queue (§5) —
/// this type only serializes access to the heap itself.
pub struct ReadyQueue {
    heap: Mutex<BinaryHeap<QueueEntry>>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Append a task; the queue remains ordered by `next_run` ascending.
    pub async fn enqueue(&self, task: Task) {
        self.heap.lock().await.push(QueueEntry(task));
    }

    /// Remove and return the head if it is due (`next_run <= now`).
    /// Leaves the queue intact if empty or the head is not yet due.
    pub async fn dequeue_ready(&self, now: DateTime<Utc>) -> Option<Task> {
        let mut heap = self.heap.lock().await;
        match heap.peek() {
            Some(entry) if entry.0.next_run <= now => heap.pop().map(|e| e.0),
            _ => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.heap.lock().await.is_empty()
    }

    /// Snapshot of every queued task, for the `list("waiting")` query path.
    pub async fn snapshot(&self) -> Vec<Task> {
        self.heap.lock().await.iter().map(|e| e.0.clone()).collect()
    }

    /// Drop every queued task. Used by `reload_cron` to rebuild the queue
    /// from scratch rather than additively re-enqueuing on top of whatever
    /// is already resident (which would duplicate any task not currently
    /// in flight).
    pub async fn clear(&self) {
        self.heap.lock().await.clear();
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}
