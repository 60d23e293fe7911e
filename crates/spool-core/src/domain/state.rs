//! State - タスクのライフサイクル
//!
//! # 状態遷移
//! - Created → Queued → Dequeued → Executing → Completed
//! - Created → Queued → Dequeued → Executing → Failed
//!
//! Cancelled は存在しません。一度 Queued になったタスクは、worker が生きていて
//! キューが永続化されている限りいつか実行されます。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::outcome::ResultStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Built by the facade, not yet durable.
    Created,
    /// Appended to the queue store.
    Queued,
    /// Removed from the queue store by the worker.
    Dequeued,
    /// Handler is running.
    Executing,
    Completed,
    Failed,
}

impl From<ResultStatus> for TaskState {
    fn from(status: ResultStatus) -> Self {
        match status {
            // The result store cannot tell Queued from Executing.
            ResultStatus::Pending => TaskState::Queued,
            ResultStatus::Completed => TaskState::Completed,
            ResultStatus::Failed => TaskState::Failed,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Created => "created",
            TaskState::Queued => "queued",
            TaskState::Dequeued => "dequeued",
            TaskState::Executing => "executing",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}
