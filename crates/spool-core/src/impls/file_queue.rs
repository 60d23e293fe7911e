//! FileQueueStore - JSON Lines ファイルによる永続キュー
//!
//! # フォーマット
//! 1 行 1 レコード（`QueueEntry` の JSON）。`enqueue` は末尾に追記して fsync、
//! `dequeue_earliest` は全行を読んで最小の 1 件を除き、残りを `.tmp` に書いて
//! rename で置き換えます。
//!
//! # クラッシュ時の挙動
//! - 追記の途中で失敗した場合は元の長さに truncate して戻す
//! - compaction の rename 前に落ちた場合、取り出したタスクはファイルに残っており
//!   次回もう一度配送される（at-least-once）
//! - パースできない行があれば `open` は `StoreError::Corruption` で失敗する
//! - ファイルの新規作成と rename の後はディレクトリも fsync する
//!
//! # 排他
//! 同一インスタンス内の enqueue と compaction は Mutex で直列化されます。
//! 別プロセスから同じファイルに書き込むことは想定していません。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::atomic::{ensure_parent, read_or_empty, replace_file, sync_parent};
use crate::domain::task::earliest;
use crate::domain::{QueueEntry, StoreError, Task};
use crate::ports::QueueStore;

struct QueueFileState {
    /// seq assigned to the next appended record.
    next_seq: u64,
    len: usize,
}

pub struct FileQueueStore {
    path: PathBuf,
    state: Mutex<QueueFileState>,
}

impl FileQueueStore {
    /// Open (or create) the queue at `path`, validating every stored record.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        ensure_parent(&path).await?;

        let entries = load_entries(&path).await?;
        let next_seq = entries.iter().map(|e| e.seq + 1).max().unwrap_or(0);

        tracing::info!(
            path = %path.display(),
            pending = entries.len(),
            next_seq,
            "queue store opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(QueueFileState {
                next_seq,
                len: entries.len(),
            }),
        })
    }

    /// All pending entries in dequeue order, without removing anything.
    pub async fn snapshot(&self) -> Result<Vec<QueueEntry>, StoreError> {
        let _guard = self.state.lock().await;
        let mut entries = load_entries(&self.path).await?;
        entries.sort_by(QueueEntry::cmp_order);
        Ok(entries)
    }

    async fn append_line(&self, line: &[u8]) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        let before = file
            .metadata()
            .await
            .map_err(|e| StoreError::io(&self.path, e))?
            .len();
        if before == 0 {
            // the file may have just been created; make its entry durable first
            sync_parent(&self.path).await?;
        }

        let written = async {
            file.write_all(line).await?;
            file.sync_data().await
        }
        .await;

        if let Err(e) = written {
            // 中途半端な行を残すと次回 open が Corruption になる
            if let Err(trunc) = file.set_len(before).await {
                tracing::error!(
                    path = %self.path.display(),
                    error = %trunc,
                    "failed to roll back partial queue append"
                );
            }
            return Err(StoreError::io(&self.path, e));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn enqueue(&self, task: Task, score: f64) -> Result<(), StoreError> {
        if !score.is_finite() {
            return Err(StoreError::InvalidScore(score));
        }

        let mut state = self.state.lock().await;
        let entry = QueueEntry::new(score, state.next_seq, task);
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        self.append_line(&line).await?;
        state.next_seq += 1;
        state.len += 1;

        tracing::debug!(
            task_id = %entry.task.id(),
            operation = %entry.task.operation(),
            score,
            seq = entry.seq,
            "task appended to queue"
        );
        Ok(())
    }

    async fn dequeue_earliest(&self) -> Result<Option<QueueEntry>, StoreError> {
        let mut state = self.state.lock().await;

        let mut entries = load_entries(&self.path).await?;
        let Some(idx) = earliest(&entries) else {
            state.len = 0;
            return Ok(None);
        };
        let entry = entries.remove(idx);

        let mut buf = Vec::new();
        for rest in &entries {
            serde_json::to_writer(&mut buf, rest)?;
            buf.push(b'\n');
        }
        replace_file(&self.path, &buf).await?;
        state.len = entries.len();

        tracing::debug!(
            task_id = %entry.task.id(),
            remaining = entries.len(),
            "queue compacted"
        );
        Ok(Some(entry))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.state.lock().await.len)
    }
}

async fn load_entries(path: &Path) -> Result<Vec<QueueEntry>, StoreError> {
    let contents = read_or_empty(path).await?;
    parse_entries(path, &contents)
}

fn parse_entries(path: &Path, contents: &str) -> Result<Vec<QueueEntry>, StoreError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| StoreError::Corruption {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Arguments, OperationName, TaskId};
    use chrono::Utc;
    use ulid::Ulid;

    fn task(name: &str) -> Task {
        Task::new(
            TaskId::from_ulid(Ulid::new()),
            OperationName::new(name),
            Arguments::new(),
            Utc::now(),
        )
    }

    async fn open(dir: &tempfile::TempDir) -> FileQueueStore {
        FileQueueStore::open(dir.path().join("queue.jsonl"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn empty_store_dequeues_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        assert!(store.dequeue_earliest().await.unwrap().is_none());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn dequeues_in_score_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        store.enqueue(task("c"), 3.0).await.unwrap();
        store.enqueue(task("a"), 1.0).await.unwrap();
        store.enqueue(task("b"), 2.0).await.unwrap();

        let mut order = Vec::new();
        while let Some(entry) = store.dequeue_earliest().await.unwrap() {
            order.push(entry.task.operation().to_string());
        }
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn equal_scores_dequeue_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        for name in ["first", "second", "third"] {
            store.enqueue(task(name), 10.0).await.unwrap();
        }

        let first = store.dequeue_earliest().await.unwrap().unwrap();
        let second = store.dequeue_earliest().await.unwrap().unwrap();
        assert_eq!(first.task.operation().as_str(), "first");
        assert_eq!(second.task.operation().as_str(), "second");
    }

    #[tokio::test]
    async fn reopen_keeps_pending_tasks_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let t = task("keep");
        {
            let store = open(&dir).await;
            store.enqueue(t.clone(), 1.0).await.unwrap();
        }

        let store = open(&dir).await;
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].task, t);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn compaction_persists_remainder() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b, c) = (task("a"), task("b"), task("c"));
        {
            let store = open(&dir).await;
            store.enqueue(a.clone(), 1.0).await.unwrap();
            store.enqueue(b.clone(), 2.0).await.unwrap();
            store.enqueue(c.clone(), 3.0).await.unwrap();

            let popped = store.dequeue_earliest().await.unwrap().unwrap();
            assert_eq!(popped.task, a);
        }

        let store = open(&dir).await;
        let remaining: Vec<Task> = store
            .snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.task)
            .collect();
        assert_eq!(remaining, vec![b, c]);
    }

    #[tokio::test]
    async fn seq_continues_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(&dir).await;
            store.enqueue(task("old"), 5.0).await.unwrap();
        }

        let store = open(&dir).await;
        store.enqueue(task("new"), 5.0).await.unwrap();

        let first = store.dequeue_earliest().await.unwrap().unwrap();
        assert_eq!(first.task.operation().as_str(), "old");
        assert_eq!(first.seq, 0);
        let second = store.dequeue_earliest().await.unwrap().unwrap();
        assert_eq!(second.seq, 1);
    }

    #[tokio::test]
    async fn corrupt_line_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.jsonl");
        {
            let store = FileQueueStore::open(&path).await.unwrap();
            store.enqueue(task("ok"), 1.0).await.unwrap();
        }
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("{not json\n");
        std::fs::write(&path, contents).unwrap();

        let err = FileQueueStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Corruption { line: 2, .. }));
    }

    #[tokio::test]
    async fn rejects_non_finite_score() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        let err = store.enqueue(task("nan"), f64::NAN).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidScore(_)));
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_enqueues_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(open(&dir).await);

        let mut joins = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            joins.push(tokio::spawn(async move {
                store.enqueue(task("p"), i as f64).await.unwrap();
            }));
        }
        for j in joins {
            j.await.unwrap();
        }

        let reopened = open(&dir).await;
        assert_eq!(reopened.snapshot().await.unwrap().len(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn enqueue_interleaved_with_compaction_loses_nothing() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(open(&dir).await);

        let mut producers = Vec::new();
        for p in 0..4 {
            let store = store.clone();
            producers.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for i in 0..25 {
                    let t = task("p");
                    ids.push(t.id());
                    store.enqueue(t, (p * 25 + i) as f64).await.unwrap();
                    tokio::task::yield_now().await;
                }
                ids
            }));
        }

        let consumer = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut popped = Vec::new();
                for _ in 0..60 {
                    if let Some(entry) = store.dequeue_earliest().await.unwrap() {
                        popped.push(entry.task.id());
                    }
                    tokio::task::yield_now().await;
                }
                popped
            })
        };

        let mut enqueued = HashSet::new();
        for p in producers {
            enqueued.extend(p.await.unwrap());
        }
        let popped = consumer.await.unwrap();

        let reopened = open(&dir).await;
        let remaining: Vec<_> = reopened
            .snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.task.id())
            .collect();

        let mut seen = HashSet::new();
        for id in popped.iter().chain(remaining.iter()) {
            assert!(seen.insert(*id), "{id} delivered twice");
        }
        assert_eq!(seen, enqueued);
        assert_eq!(popped.len() + remaining.len(), 100);
        assert_eq!(reopened.len().await.unwrap(), remaining.len());
    }
}
