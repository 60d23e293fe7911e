//! In-memory store implementations.
//!
//! Same ordering and overwrite-once rules as the file stores, without the
//! durability. Used by tests and by hosts that do not need crash recovery.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::table::ResultTable;
use crate::domain::{QueueEntry, StoreError, Task, TaskId, TaskResult};
use crate::ports::{QueueStore, ResultStore};

/// Heap slot for a queue entry.
///
/// We use reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug)]
struct HeapEntry(QueueEntry);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp_order(&self.0)
    }
}

#[derive(Default)]
struct MemoryQueueState {
    heap: BinaryHeap<HeapEntry>,
    next_seq: u64,
}

#[derive(Default)]
pub struct InMemoryQueueStore {
    state: Mutex<MemoryQueueState>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn enqueue(&self, task: Task, score: f64) -> Result<(), StoreError> {
        if !score.is_finite() {
            return Err(StoreError::InvalidScore(score));
        }
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(HeapEntry(QueueEntry::new(score, seq, task)));
        Ok(())
    }

    async fn dequeue_earliest(&self) -> Result<Option<QueueEntry>, StoreError> {
        Ok(self.state.lock().await.heap.pop().map(|HeapEntry(e)| e))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.state.lock().await.heap.len())
    }
}

#[derive(Default)]
pub struct InMemoryResultStore {
    table: Mutex<ResultTable>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, task_id: TaskId, result: TaskResult) -> Result<(), StoreError> {
        self.table.lock().await.put(task_id, result)
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskResult>, StoreError> {
        Ok(self.table.lock().await.get(task_id).cloned())
    }

    async fn mark_pending(&self, task_id: TaskId) -> Result<(), StoreError> {
        self.table.lock().await.mark_pending(task_id);
        Ok(())
    }

    async fn clear_pending(&self, task_id: TaskId) -> Result<(), StoreError> {
        self.table.lock().await.clear_pending(task_id);
        Ok(())
    }
}
