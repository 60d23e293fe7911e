//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **FileQueueStore**: JSON Lines の追記ログ + compaction
//! - **FileResultStore**: JSON スナップショット
//! - **InMemoryQueueStore / InMemoryResultStore**: テスト・永続化不要な host 用

mod atomic;
mod table;

pub mod file_queue;
pub mod file_results;
pub mod memory;

pub use self::file_queue::FileQueueStore;
pub use self::file_results::FileResultStore;
pub use self::memory::{InMemoryQueueStore, InMemoryResultStore};
