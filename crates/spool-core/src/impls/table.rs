//! In-memory result table with the overwrite-once rules.
//!
//! Both result store implementations keep one of these; the file store also
//! serializes it as its on-disk snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{StoreError, TaskId, TaskResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct ResultTable(BTreeMap<TaskId, TaskResult>);

impl ResultTable {
    pub(crate) fn get(&self, task_id: TaskId) -> Option<&TaskResult> {
        self.0.get(&task_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn put(&mut self, task_id: TaskId, result: TaskResult) -> Result<(), StoreError> {
        if self.0.get(&task_id).is_some_and(TaskResult::is_terminal) {
            return Err(StoreError::AlreadyFinalized(task_id));
        }
        self.0.insert(task_id, result);
        Ok(())
    }

    /// Returns `true` if a marker was inserted.
    pub(crate) fn mark_pending(&mut self, task_id: TaskId) -> bool {
        if self.0.contains_key(&task_id) {
            return false;
        }
        self.0.insert(task_id, TaskResult::pending(task_id));
        true
    }

    /// Returns `true` if a Pending record was removed.
    pub(crate) fn clear_pending(&mut self, task_id: TaskId) -> bool {
        if self.0.get(&task_id).is_some_and(|r| !r.is_terminal()) {
            self.0.remove(&task_id);
            return true;
        }
        false
    }
}
