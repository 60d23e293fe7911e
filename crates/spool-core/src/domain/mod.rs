//! Domain model (IDs, tasks, queue entries, results, errors).

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod state;
pub mod task;

pub use errors::{OperationError, SpoolError, StoreError};
pub use ids::{ParseIdError, TaskId};
pub use outcome::{FailureKind, PollStatus, ResultStatus, TaskFailure, TaskResult};
pub use state::TaskState;
pub use task::{Arguments, OperationName, QueueEntry, Task};
