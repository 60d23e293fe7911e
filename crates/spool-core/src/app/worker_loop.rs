//! WorkerLoop - タスク実行ループ
//!
//! # フロー
//! 1. QueueStore::dequeue_earliest() で最も早いタスクを取り出す
//! 2. OperationRegistry で handler を解決（未登録なら UnknownOperation として Failed）
//! 3. handler を実行（同時に実行するのは常に 1 件だけ）
//! 4. ResultStore::put() で Completed / Failed を記録
//! 5. キューが空なら idle_interval だけ待つ（ここだけが待機ポイント）
//!
//! タスク単位の失敗は Result に記録してループを続けます。ストア自体の障害だけが
//! `run()` から Err として上がります。
//!
//! # 既知の制限
//! - タイムアウトなし: 戻ってこない handler はループを止める
//! - リトライなし
//! - pop してから結果を書くまでの間に落ちると、そのタスクは Pending のまま残る

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::{
    FailureKind, OperationError, SpoolError, StoreError, Task, TaskFailure, TaskId, TaskResult,
    TaskState,
};
use crate::ports::{QueueStore, ResultStore};
use crate::registry::OperationRegistry;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Wait between polls of an empty queue.
    pub idle_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
        }
    }
}

/// What one iteration of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The queue was empty.
    Idle,
    /// One task was executed; `state` is Completed or Failed.
    Processed { task_id: TaskId, state: TaskState },
}

pub struct WorkerLoop {
    queue: Arc<dyn QueueStore>,
    results: Arc<dyn ResultStore>,
    registry: Arc<OperationRegistry>,
    config: WorkerConfig,
}

impl WorkerLoop {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        results: Arc<dyn ResultStore>,
        registry: Arc<OperationRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            results,
            registry,
            config,
        }
    }

    /// Pop at most one task, execute it, and record the outcome.
    pub async fn run_once(&self) -> Result<Tick, SpoolError> {
        let Some(entry) = self.queue.dequeue_earliest().await? else {
            return Ok(Tick::Idle);
        };
        let task = entry.task;
        let task_id = task.id();
        tracing::debug!(
            task_id = %task_id,
            operation = %task.operation(),
            score = entry.score,
            state = %TaskState::Dequeued,
            "task dequeued"
        );

        let result = self.execute(task).await;
        let state = TaskState::from(result.status);

        match self.results.put(task_id, result).await {
            Ok(()) => {}
            Err(StoreError::AlreadyFinalized(_)) => {
                tracing::warn!(task_id = %task_id, "result already recorded; keeping the first one");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Tick::Processed { task_id, state })
    }

    /// Run until the queue is empty. Returns the number of tasks processed.
    pub async fn drain(&self) -> Result<usize, SpoolError> {
        let mut processed = 0;
        while let Tick::Processed { .. } = self.run_once().await? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Loop until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Shutdown is only observed between tasks; an in-flight handler is never
    /// interrupted.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), SpoolError> {
        tracing::info!(
            operations = ?self.registry.names(),
            idle_ms = self.config.idle_interval.as_millis() as u64,
            "worker loop started"
        );

        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }

            let tick = match self.run_once().await {
                Ok(tick) => tick,
                Err(e) => {
                    tracing::error!(error = %e, "worker loop stopped by storage failure");
                    return Err(e);
                }
            };

            match tick {
                Tick::Processed { .. } => tokio::task::yield_now().await,
                Tick::Idle => {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(self.config.idle_interval) => {}
                    }
                }
            }
        }

        tracing::info!("worker loop stopped");
        Ok(())
    }

    /// Spawn the loop on the tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move { self.run(shutdown_rx).await });
        WorkerHandle { shutdown_tx, join }
    }

    async fn execute(&self, task: Task) -> TaskResult {
        let task_id = task.id();
        let operation = task.operation().clone();

        let Some(handler) = self.registry.resolve(&operation) else {
            tracing::warn!(task_id = %task_id, operation = %operation, "unknown operation");
            return TaskResult::failed(
                task_id,
                TaskFailure::new(
                    FailureKind::UnknownOperation,
                    format!("no handler registered for operation '{operation}'"),
                ),
            );
        };

        tracing::debug!(task_id = %task_id, operation = %operation, state = %TaskState::Executing, "executing");
        let started = Instant::now();

        // 別タスクで実行して handler の panic をこのタスクの失敗に閉じ込める
        let arguments = task.arguments().clone();
        let outcome = tokio::spawn(async move { handler.call(&arguments).await }).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let failure = match outcome {
            Ok(Ok(value)) => {
                tracing::info!(task_id = %task_id, operation = %operation, elapsed_ms, "task completed");
                return TaskResult::completed(task_id, value);
            }
            Ok(Err(OperationError::InvalidArguments(msg))) => {
                TaskFailure::new(FailureKind::InvalidArguments, msg)
            }
            Ok(Err(OperationError::Failed(msg))) => TaskFailure::new(FailureKind::ExecutionFailed, msg),
            Err(join) => TaskFailure::new(
                FailureKind::ExecutionFailed,
                format!("handler aborted: {join}"),
            ),
        };

        tracing::warn!(
            task_id = %task_id,
            operation = %operation,
            elapsed_ms,
            kind = ?failure.kind,
            error = %failure.message,
            "task failed"
        );
        TaskResult::failed(task_id, failure)
    }
}

/// Handle to a spawned worker loop.
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<Result<(), SpoolError>>,
}

impl WorkerHandle {
    /// Ask the loop to stop at its next idle point.
    pub fn request_shutdown(&self) {
        // receiver may already be gone if the loop exited on its own
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for the loop to finish.
    pub async fn shutdown_and_join(self) -> Result<(), SpoolError> {
        self.request_shutdown();
        self.join
            .await
            .map_err(|e| SpoolError::WorkerAborted(e.to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TaskQueue;
    use crate::domain::{Arguments, PollStatus};
    use crate::impls::{InMemoryQueueStore, InMemoryResultStore};
    use serde_json::json;

    fn args(v: serde_json::Value) -> Arguments {
        match v {
            serde_json::Value::Object(map) => map,
            _ => Arguments::new(),
        }
    }

    fn registry() -> OperationRegistry {
        let mut registry = OperationRegistry::new();
        registry
            .register_fn("sum", |a| {
                let x = a.get("a").and_then(|v| v.as_i64());
                let y = a.get("b").and_then(|v| v.as_i64());
                match (x, y) {
                    (Some(x), Some(y)) => Ok(json!(x + y)),
                    _ => Err(OperationError::invalid_arguments("need integers a and b")),
                }
            })
            .unwrap();
        registry
            .register_fn("explode", |_| Err(OperationError::failed("boom")))
            .unwrap();
        registry
            .register_fn("panic", |_| panic!("handler bug"))
            .unwrap();
        registry
    }

    fn setup() -> (TaskQueue, WorkerLoop) {
        let queue: Arc<dyn QueueStore> = Arc::new(InMemoryQueueStore::new());
        let results: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());
        let facade = TaskQueue::new(queue.clone(), results.clone());
        let worker = WorkerLoop::new(
            queue,
            results,
            Arc::new(registry()),
            WorkerConfig {
                idle_interval: Duration::from_millis(10),
            },
        );
        (facade, worker)
    }

    #[tokio::test]
    async fn sum_completes_with_value() {
        let (facade, worker) = setup();
        let id = facade.enqueue("sum", args(json!({"a": 1, "b": 2}))).await.unwrap();

        assert_eq!(facade.poll(id).await.unwrap(), PollStatus::Pending);
        let tick = worker.run_once().await.unwrap();

        assert_eq!(
            tick,
            Tick::Processed {
                task_id: id,
                state: TaskState::Completed
            }
        );
        assert_eq!(
            facade.poll(id).await.unwrap(),
            PollStatus::Completed { value: json!(3) }
        );
    }

    #[tokio::test]
    async fn empty_queue_is_idle() {
        let (_, worker) = setup();
        assert_eq!(worker.run_once().await.unwrap(), Tick::Idle);
    }

    #[tokio::test]
    async fn unknown_operation_is_recorded_as_failure() {
        let (facade, worker) = setup();
        let id = facade.enqueue("transcode", Arguments::new()).await.unwrap();

        worker.run_once().await.unwrap();

        match facade.poll(id).await.unwrap() {
            PollStatus::Failed { error } => {
                assert_eq!(error.kind, FailureKind::UnknownOperation);
                assert!(error.message.contains("transcode"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_loop() {
        let (facade, worker) = setup();
        let bad = facade.enqueue_with_score("explode", Arguments::new(), 1.0).await.unwrap();
        let crash = facade.enqueue_with_score("panic", Arguments::new(), 2.0).await.unwrap();
        let good = facade
            .enqueue_with_score("sum", args(json!({"a": 2, "b": 5})), 3.0)
            .await
            .unwrap();

        assert_eq!(worker.drain().await.unwrap(), 3);

        assert!(matches!(
            facade.poll(bad).await.unwrap(),
            PollStatus::Failed { error } if error.kind == FailureKind::ExecutionFailed && error.message == "boom"
        ));
        assert!(matches!(
            facade.poll(crash).await.unwrap(),
            PollStatus::Failed { error } if error.kind == FailureKind::ExecutionFailed
        ));
        assert_eq!(
            facade.poll(good).await.unwrap(),
            PollStatus::Completed { value: json!(7) }
        );
    }

    #[tokio::test]
    async fn bad_arguments_are_classified() {
        let (facade, worker) = setup();
        let id = facade.enqueue("sum", args(json!({"a": 1}))).await.unwrap();

        worker.run_once().await.unwrap();

        assert!(matches!(
            facade.poll(id).await.unwrap(),
            PollStatus::Failed { error } if error.kind == FailureKind::InvalidArguments
        ));
    }

    #[tokio::test]
    async fn blocking_closure_leaves_host_responsive() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let mut registry = OperationRegistry::new();
        registry
            .register_fn("crop", move |_| {
                flag.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(500));
                Ok(json!("cropped"))
            })
            .unwrap();

        let queue: Arc<dyn QueueStore> = Arc::new(InMemoryQueueStore::new());
        let results: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());
        let facade = TaskQueue::new(queue.clone(), results.clone());
        let handle = WorkerLoop::new(
            queue,
            results,
            Arc::new(registry),
            WorkerConfig {
                idle_interval: Duration::from_millis(10),
            },
        )
        .spawn();

        let crop = facade.enqueue("crop", Arguments::new()).await.unwrap();
        while !started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let before = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let other = facade.enqueue("crop", Arguments::new()).await.unwrap();
        assert_eq!(facade.poll(other).await.unwrap(), PollStatus::Pending);
        assert!(before.elapsed() < Duration::from_millis(200));

        assert_eq!(facade.poll(crop).await.unwrap(), PollStatus::Pending);
        handle.shutdown_and_join().await.unwrap();
        assert_eq!(
            facade.poll(crop).await.unwrap(),
            PollStatus::Completed {
                value: json!("cropped")
            }
        );
    }

    #[tokio::test]
    async fn spawned_worker_processes_and_shuts_down() {
        let (facade, worker) = setup();
        let handle = worker.spawn();

        let id = facade.enqueue("sum", args(json!({"a": 4, "b": 4}))).await.unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let status = facade.poll(id).await.unwrap();
                if !status.is_pending() {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(status, PollStatus::Completed { value: json!(8) });
        handle.shutdown_and_join().await.unwrap();
    }
}
