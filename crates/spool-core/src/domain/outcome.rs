//! Outcome model: what the result store records per task and what `poll` reports.

use serde::{Deserialize, Serialize};

use super::TaskId;

/// Status of a result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Pending,
    Completed,
    Failed,
}

impl ResultStatus {
    /// Completed and Failed never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, ResultStatus::Completed | ResultStatus::Failed)
    }
}

/// Classification of a per-task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The task named an operation the registry does not know.
    UnknownOperation,
    /// The handler rejected the arguments before doing any work.
    InvalidArguments,
    /// The handler ran and returned an error.
    ExecutionFailed,
}

/// Failure description stored with a Failed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One record of the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: ResultStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
}

impl TaskResult {
    pub fn pending(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: ResultStatus::Pending,
            value: None,
            error: None,
        }
    }

    pub fn completed(task_id: TaskId, value: serde_json::Value) -> Self {
        Self {
            task_id,
            status: ResultStatus::Completed,
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(task_id: TaskId, error: TaskFailure) -> Self {
        Self {
            task_id,
            status: ResultStatus::Failed,
            value: None,
            error: Some(error),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// What `TaskQueue::poll` reports to the host.
///
/// Serialized as `{"status": "pending"}`, `{"status": "completed", "value": ..}`
/// or `{"status": "failed", "error": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollStatus {
    Pending,
    Completed { value: serde_json::Value },
    Failed { error: TaskFailure },
}

impl PollStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, PollStatus::Pending)
    }
}

impl From<TaskResult> for PollStatus {
    fn from(result: TaskResult) -> Self {
        match result.status {
            ResultStatus::Pending => PollStatus::Pending,
            ResultStatus::Completed => PollStatus::Completed {
                value: result.value.unwrap_or(serde_json::Value::Null),
            },
            ResultStatus::Failed => PollStatus::Failed {
                error: result.error.unwrap_or_else(|| {
                    TaskFailure::new(FailureKind::ExecutionFailed, "no error recorded")
                }),
            },
        }
    }
}
