use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// Named arguments handed to an operation handler.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Stable name of an operation in the registry (e.g. `media.crop_video`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationName(String);

impl OperationName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for OperationName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OperationName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A unit of work: operation name + arguments (+ TaskId).
///
/// Only the name is persisted, never the handler itself; the worker resolves
/// the name against the registry at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    operation: OperationName,
    #[serde(default)]
    arguments: Arguments,
    enqueued_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: TaskId,
        operation: OperationName,
        arguments: Arguments,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            operation,
            arguments,
            enqueued_at,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn operation(&self) -> &OperationName {
        &self.operation
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Default score: `enqueued_at` as fractional epoch seconds.
    pub fn default_score(&self) -> f64 {
        self.enqueued_at.timestamp_micros() as f64 / 1_000_000.0
    }
}

/// One record of the pending queue.
///
/// Ordering is `(score, seq)` ascending. `seq` is assigned by the store at
/// append time and only breaks ties between equal scores, so equal scores
/// come out in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub score: f64,
    pub seq: u64,
    pub task: Task,
}

impl QueueEntry {
    pub fn new(score: f64, seq: u64, task: Task) -> Self {
        Self { score, seq, task }
    }

    pub fn cmp_order(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Index of the earliest entry, or `None` for an empty slice.
pub fn earliest(entries: &[QueueEntry]) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp_order(b))
        .map(|(idx, _)| idx)
}
