//! QueueStore port - 永続化された pending キュー
//!
//! # 契約
//! - `enqueue` は 1 レコード追記するだけ（書き込み時に並べ替えはしない）
//! - `dequeue_earliest` は全件を読み、`(score, seq)` 最小の 1 件を取り除き、
//!   残りを新しい完全な状態として書き戻す（compaction）
//! - pop は O(n)。backlog が小さい前提のスケーラビリティ上限です
//!
//! # 並行性
//! 同時に `dequeue_earliest` を呼べるのは 1 caller だけです。store 自体は
//! プロセス間の排他を提供しないので、host 側で直列化してください
//! （worker を 1 本にする、など）。

use async_trait::async_trait;

use crate::domain::{QueueEntry, StoreError, Task};

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Durably append `task` with the given ordering score.
    async fn enqueue(&self, task: Task, score: f64) -> Result<(), StoreError>;

    /// Remove and return the entry with the smallest `(score, seq)`.
    async fn dequeue_earliest(&self) -> Result<Option<QueueEntry>, StoreError>;

    /// Number of pending entries.
    async fn len(&self) -> Result<usize, StoreError>;

    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }
}
