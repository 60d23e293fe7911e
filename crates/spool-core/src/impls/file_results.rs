//! FileResultStore - JSON スナップショットによる結果ストア
//!
//! ファイルは `{ "task-<ulid>": TaskResult, ... }` の JSON object です。
//! 書き込みのたびにスナップショット全体を `.tmp` に書いて rename します。
//! 読み込みは open 時にロードしたメモリ上のテーブルから返します。

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::atomic::{ensure_parent, read_or_empty, replace_file};
use super::table::ResultTable;
use crate::domain::{StoreError, TaskId, TaskResult};
use crate::ports::ResultStore;

pub struct FileResultStore {
    path: PathBuf,
    table: Mutex<ResultTable>,
}

impl FileResultStore {
    /// Open (or create) the results snapshot at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        ensure_parent(&path).await?;

        let contents = read_or_empty(&path).await?;
        let table = if contents.trim().is_empty() {
            ResultTable::default()
        } else {
            serde_json::from_str(&contents).map_err(|source| StoreError::Corruption {
                path: path.clone(),
                line: source.line(),
                source,
            })?
        };

        tracing::info!(path = %path.display(), results = table.len(), "result store opened");

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// Apply `f` to a copy of the table, persist it, then swap it in.
    ///
    /// The in-memory table only changes once the new snapshot is on disk.
    async fn update<F>(&self, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut ResultTable) -> Result<bool, StoreError> + Send,
    {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        if !f(&mut next)? {
            return Ok(false);
        }

        let bytes = serde_json::to_vec(&next)?;
        replace_file(&self.path, &bytes).await?;
        *table = next;
        Ok(true)
    }
}

#[async_trait]
impl ResultStore for FileResultStore {
    async fn put(&self, task_id: TaskId, result: TaskResult) -> Result<(), StoreError> {
        let status = result.status;
        self.update(move |table| table.put(task_id, result).map(|()| true))
            .await?;
        tracing::debug!(task_id = %task_id, ?status, "result persisted");
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskResult>, StoreError> {
        Ok(self.table.lock().await.get(task_id).cloned())
    }

    async fn mark_pending(&self, task_id: TaskId) -> Result<(), StoreError> {
        self.update(move |table| Ok(table.mark_pending(task_id)))
            .await
            .map(|_| ())
    }

    async fn clear_pending(&self, task_id: TaskId) -> Result<(), StoreError> {
        self.update(move |table| Ok(table.clear_pending(task_id)))
            .await
            .map(|_| ())
    }
}
