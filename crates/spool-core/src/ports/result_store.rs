//! ResultStore port - task_id → 結果
//!
//! 書き込みは毎回スナップショット全体を atomic に置き換えます。
//! 1 つの task_id について、結果は Pending → (Completed | Failed) に一度だけ遷移し、
//! 削除されることはありません（enqueue 失敗時の Pending 取り消しを除く）。

use async_trait::async_trait;

use crate::domain::{StoreError, TaskId, TaskResult};

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Record a terminal result.
    ///
    /// Fails with `StoreError::AlreadyFinalized` if a terminal result already
    /// exists for this id.
    async fn put(&self, task_id: TaskId, result: TaskResult) -> Result<(), StoreError>;

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskResult>, StoreError>;

    /// Insert a Pending marker unless a record already exists.
    async fn mark_pending(&self, task_id: TaskId) -> Result<(), StoreError>;

    /// Remove the record only if it is still Pending.
    ///
    /// Used to roll back `mark_pending` when the queue append fails.
    async fn clear_pending(&self, task_id: TaskId) -> Result<(), StoreError>;
}
