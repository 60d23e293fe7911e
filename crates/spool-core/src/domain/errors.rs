//! Errors - エラー型と分類
//!
//! - `StoreError`: queue / result ストア自体の障害（構造的エラー）
//! - `SpoolError`: facade / builder / worker が呼び出し側に返すエラー
//! - `OperationError`: handler が返すエラー（タスク単位、Result に記録される）

use std::path::PathBuf;

use thiserror::Error;

use super::TaskId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted state could not be parsed. Fatal at startup.
    #[error("corrupt store {} at line {line}: {source}", .path.display())]
    Corruption {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("score must be finite, got {0}")]
    InvalidScore(f64),

    #[error("result for {0} is already final")]
    AlreadyFinalized(TaskId),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SpoolError {
    /// Durable write during enqueue failed; nothing was left queued.
    #[error("enqueue failed: {0}")]
    Enqueue(#[source] StoreError),

    /// Structural store failure (unreadable storage, failed atomic replace).
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("unknown task: {0}")]
    TaskNotFound(TaskId),

    /// The worker task panicked or was cancelled.
    #[error("worker task aborted: {0}")]
    WorkerAborted(String),

    #[error("operation '{0}' is already registered")]
    DuplicateOperation(String),

    #[error("missing operations: {0:?}. These operations were expected but not registered.")]
    MissingOperations(Vec<String>),
}

/// Error returned by an operation handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

impl OperationError {
    pub fn failed(message: impl Into<String>) -> Self {
        OperationError::Failed(message.into())
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        OperationError::InvalidArguments(message.into())
    }
}
