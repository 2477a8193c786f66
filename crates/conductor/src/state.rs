//! The task-state table
//!
//! Exactly one record per task, all `pending` at load. The run loop is the
//! only writer, so the table needs no locking.

use indexmap::IndexMap;
use syncphony_core::{TaskId, TaskState, PROGRESS_MAX};
use syncphony_plan::TaskGraph;
use syncphony_utils::tracing::RunTally;
use tracing::debug;

/// Per-task run state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRecord {
    pub state: TaskState,
    /// Last progress a musician reported, 0-100
    pub progress: u8,
    /// Set when the task failed
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("no task named '{0}' in this symphony")]
    UnknownTask(TaskId),

    #[error("task '{task_id}' cannot move from {from} to {to}")]
    Invalid {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStates {
    records: IndexMap<TaskId, TaskRecord>,
}

impl TaskStates {
    /// One `pending` record per task of the graph, in document order
    pub fn for_graph(graph: &TaskGraph) -> Self {
        Self {
            records: graph
                .ids()
                .map(|id| (id.clone(), TaskRecord::default()))
                .collect(),
        }
    }

    pub fn state(&self, task_id: &str) -> Option<TaskState> {
        self.records.get(task_id).map(|record| record.state)
    }

    pub fn record(&self, task_id: &str) -> Option<&TaskRecord> {
        self.records.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.records.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &TaskRecord)> {
        self.records.iter()
    }

    /// Move a task to `to`, returning the state it left
    pub fn transition(
        &mut self,
        task_id: &TaskId,
        to: TaskState,
    ) -> Result<TaskState, TransitionError> {
        let record = self
            .records
            .get_mut(task_id.as_str())
            .ok_or_else(|| TransitionError::UnknownTask(task_id.clone()))?;

        let from = record.state;
        if !from.can_transition_to(to) {
            return Err(TransitionError::Invalid {
                task_id: task_id.clone(),
                from,
                to,
            });
        }

        record.state = to;
        if to == TaskState::Completed {
            record.progress = PROGRESS_MAX;
        }
        Ok(from)
    }

    /// Mark a dispatched task failed and keep the reason for diagnostics
    pub fn fail(
        &mut self,
        task_id: &TaskId,
        error_message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.transition(task_id, TaskState::Failed)?;
        if let Some(record) = self.records.get_mut(task_id.as_str()) {
            record.error_message = Some(error_message.into());
        }
        Ok(())
    }

    /// Record a progress update. Does not change the task's state.
    ///
    /// Progress arriving after a task finished is ignored.
    pub fn set_progress(&mut self, task_id: &TaskId, progress: u8) -> Result<(), TransitionError> {
        let record = self
            .records
            .get_mut(task_id.as_str())
            .ok_or_else(|| TransitionError::UnknownTask(task_id.clone()))?;
        if record.state.is_terminal() {
            debug!(%task_id, state = %record.state, progress, "late progress ignored");
            return Ok(());
        }
        record.progress = progress.min(PROGRESS_MAX);
        Ok(())
    }

    pub fn any_failed(&self) -> bool {
        self.records
            .values()
            .any(|record| record.state == TaskState::Failed)
    }

    pub fn all_completed(&self) -> bool {
        self.records
            .values()
            .all(|record| record.state == TaskState::Completed)
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.records
            .values()
            .filter(|record| record.state == state)
            .count()
    }

    /// Ids in `state`, in document order
    pub fn ids_in(&self, state: TaskState) -> Vec<TaskId> {
        self.records
            .iter()
            .filter(|(_, record)| record.state == state)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn tally(&self) -> RunTally {
        RunTally {
            completed: self.count(TaskState::Completed),
            failed: self.count(TaskState::Failed),
            dispatched: self.count(TaskState::Dispatched),
            pending: self.count(TaskState::Pending),
        }
    }
}
