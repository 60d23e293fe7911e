//! SpoolBuilder - ストア・registry・worker のワイヤリング
//!
//! # Fail-fast 設計
//! - expect_operations() で host が必要とする operation 名を宣言
//! - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば `SpoolError::MissingOperations` を返す

use std::sync::Arc;

use crate::config::SpoolConfig;
use crate::domain::{Arguments, OperationError, OperationName, SpoolError};
use crate::impls::{FileQueueStore, FileResultStore};
use crate::ports::{Clock, QueueStore, ResultStore, SystemClock};
use crate::registry::{Handler, Operation, OperationHandler, OperationRegistry};

use super::facade::TaskQueue;
use super::worker_loop::{WorkerConfig, WorkerLoop};

/// # 使用例
/// ```ignore
/// let spool = SpoolBuilder::new()
///     .register_typed::<CropVideo, _>(CropVideoHandler)?
///     .expect_operations(&["media.crop_video"])
///     .open(&SpoolConfig::from_env())
///     .await?;
///
/// let handle = spool.worker.spawn();
/// let id = spool.queue.enqueue("media.crop_video", args).await?;
/// ```
pub struct SpoolBuilder {
    registry: OperationRegistry,
    expected: Option<Vec<String>>,
    worker_config: Option<WorkerConfig>,
    clock: Arc<dyn Clock>,
}

/// Wired facade + worker sharing the same stores.
pub struct Spool {
    pub queue: TaskQueue,
    pub worker: WorkerLoop,
}

impl SpoolBuilder {
    pub fn new() -> Self {
        Self {
            registry: OperationRegistry::new(),
            expected: None,
            worker_config: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn register(
        mut self,
        name: impl Into<OperationName>,
        handler: Arc<dyn OperationHandler>,
    ) -> Result<Self, SpoolError> {
        self.registry.register(name, handler)?;
        Ok(self)
    }

    pub fn register_typed<O: Operation, H: Handler<O> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, SpoolError> {
        self.registry.register_typed::<O, H>(handler)?;
        Ok(self)
    }

    pub fn register_fn<F>(mut self, name: impl Into<OperationName>, f: F) -> Result<Self, SpoolError>
    where
        F: Fn(&Arguments) -> Result<serde_json::Value, OperationError> + Send + Sync + 'static,
    {
        self.registry.register_fn(name, f)?;
        Ok(self)
    }

    pub fn expect_operations(mut self, names: &[&str]) -> Self {
        self.expected = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Explicit worker settings. Takes precedence over the idle interval of
    /// the `SpoolConfig` passed to `open`.
    pub fn worker_config(mut self, config: WorkerConfig) -> Self {
        self.worker_config = Some(config);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wire the given stores.
    pub fn build(
        self,
        queue: Arc<dyn QueueStore>,
        results: Arc<dyn ResultStore>,
    ) -> Result<Spool, SpoolError> {
        if let Some(expected) = &self.expected {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.registry.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(SpoolError::MissingOperations(missing));
            }
        }

        let facade = TaskQueue::with_clock(Arc::clone(&queue), Arc::clone(&results), self.clock);
        let worker = WorkerLoop::new(
            queue,
            results,
            Arc::new(self.registry),
            self.worker_config.unwrap_or_default(),
        );
        Ok(Spool {
            queue: facade,
            worker,
        })
    }

    /// Open the file stores named by `config` and wire them.
    ///
    /// Corrupt persisted state fails here, before any task runs.
    /// The idle interval comes from `config` unless `worker_config` was set.
    pub async fn open(mut self, config: &SpoolConfig) -> Result<Spool, SpoolError> {
        let queue = FileQueueStore::open(config.queue_path()).await?;
        let results = FileResultStore::open(config.results_path()).await?;
        self.worker_config.get_or_insert_with(|| config.worker_config());
        self.build(Arc::new(queue), Arc::new(results))
    }
}

impl Default for SpoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
