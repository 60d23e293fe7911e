//! TaskQueue - host アプリケーションが使う唯一の入口
//!
//! # enqueue の手順
//! 1. TaskId を発行して Task を組み立てる（enqueued_at = now）
//! 2. result store に Pending マーカーを書く（既存レコードがあれば何もしない）
//! 3. queue store に追記する
//! 4. 追記に失敗したら Pending マーカーを取り消して `SpoolError::Enqueue` を返す
//!
//! Pending を先に書くので、worker がどれだけ速くても結果が Pending に
//! 巻き戻ることはありません。

use std::sync::Arc;

use crate::domain::{
    Arguments, OperationName, PollStatus, SpoolError, Task, TaskId, TaskState,
};
use crate::ports::{Clock, IdGenerator, QueueStore, ResultStore, SystemClock, UlidGenerator};

#[derive(Clone)]
pub struct TaskQueue {
    queue: Arc<dyn QueueStore>,
    results: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskQueue {
    pub fn new(queue: Arc<dyn QueueStore>, results: Arc<dyn ResultStore>) -> Self {
        Self::with_clock(queue, results, Arc::new(SystemClock))
    }

    pub fn with_clock(
        queue: Arc<dyn QueueStore>,
        results: Arc<dyn ResultStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self {
            queue,
            results,
            clock,
            ids,
        }
    }

    /// Submit work; the score is the enqueue time. Returns without waiting
    /// for execution.
    pub async fn enqueue(
        &self,
        operation: impl Into<OperationName>,
        arguments: Arguments,
    ) -> Result<TaskId, SpoolError> {
        let task = self.build_task(operation.into(), arguments);
        let score = task.default_score();
        self.submit(task, score).await
    }

    /// Submit work with an explicit ordering score (lower runs first).
    pub async fn enqueue_with_score(
        &self,
        operation: impl Into<OperationName>,
        arguments: Arguments,
        score: f64,
    ) -> Result<TaskId, SpoolError> {
        let task = self.build_task(operation.into(), arguments);
        self.submit(task, score).await
    }

    /// Current status of a task issued by `enqueue`.
    ///
    /// Ids this store has never seen are `SpoolError::TaskNotFound`.
    pub async fn poll(&self, task_id: TaskId) -> Result<PollStatus, SpoolError> {
        match self.results.get(task_id).await? {
            Some(result) => Ok(PollStatus::from(result)),
            None => Err(SpoolError::TaskNotFound(task_id)),
        }
    }

    /// Number of tasks waiting in the queue store.
    pub async fn pending_count(&self) -> Result<usize, SpoolError> {
        Ok(self.queue.len().await?)
    }

    fn build_task(&self, operation: OperationName, arguments: Arguments) -> Task {
        Task::new(
            self.ids.generate_task_id(),
            operation,
            arguments,
            self.clock.now(),
        )
    }

    async fn submit(&self, task: Task, score: f64) -> Result<TaskId, SpoolError> {
        let task_id = task.id();
        let operation = task.operation().clone();

        self.results
            .mark_pending(task_id)
            .await
            .map_err(SpoolError::Enqueue)?;

        if let Err(e) = self.queue.enqueue(task, score).await {
            tracing::warn!(task_id = %task_id, operation = %operation, error = %e, "enqueue failed");
            if let Err(rollback) = self.results.clear_pending(task_id).await {
                tracing::error!(
                    task_id = %task_id,
                    error = %rollback,
                    "failed to clear pending marker after enqueue failure"
                );
            }
            return Err(SpoolError::Enqueue(e));
        }

        tracing::info!(
            task_id = %task_id,
            operation = %operation,
            score,
            state = %TaskState::Queued,
            "task enqueued"
        );
        Ok(task_id)
    }
}
