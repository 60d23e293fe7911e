//! App - アプリケーション層
//!
//! ports を組み合わせて queue のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **TaskQueue**: host が使う facade（enqueue / poll）
//! - **WorkerLoop**: タスク実行ループ（pop → resolve → execute → put）
//! - **SpoolBuilder**: ワイヤリングと起動時検証

pub mod builder;
pub mod facade;
pub mod worker_loop;

pub use self::builder::{Spool, SpoolBuilder};
pub use self::facade::TaskQueue;
pub use self::worker_loop::{Tick, WorkerConfig, WorkerHandle, WorkerLoop};
