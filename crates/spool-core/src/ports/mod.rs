//! Ports - 抽象化レイヤー
//!
//! queue / result ストアと、時刻・ID 生成の抽象化を定義します。
//! 実装は `impls` にあります（ファイル実装とインメモリ実装）。

pub mod clock;
pub mod id_generator;
pub mod queue_store;
pub mod result_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::queue_store::QueueStore;
pub use self::result_store::ResultStore;
