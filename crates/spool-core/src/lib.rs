//! spool-core
//!
//! Persistent task queue and single-worker execution loop.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, outcome, state, errors）
//! - **ports**: 抽象化レイヤー（QueueStore, ResultStore, Clock, IdGenerator）
//! - **impls**: 実装（ファイルストア、インメモリストア）
//! - **registry**: operation 名 → handler
//! - **app**: TaskQueue（facade）、WorkerLoop、SpoolBuilder
//! - **config**: 環境変数ベースの設定
//!
//! # データの流れ
//! caller → `TaskQueue::enqueue` → QueueStore（追記）→ `WorkerLoop`（pop, 実行）
//! → ResultStore（書き込み）→ caller が `TaskQueue::poll` で読む

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod registry;

pub use app::{Spool, SpoolBuilder, TaskQueue, Tick, WorkerConfig, WorkerHandle, WorkerLoop};
pub use config::SpoolConfig;
pub use domain::{
    Arguments, FailureKind, OperationError, OperationName, PollStatus, SpoolError, StoreError,
    TaskFailure, TaskId,
};
pub use registry::{Handler, Operation, OperationHandler, OperationRegistry};
