//! A declared group and its task list

use std::time::Duration;

use cohort_core::{
    validate_deadline, FunctionKind, GroupId, SummaryEntry, TaskIndex, TaskSpec, TaskState,
};
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// Where a group is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    NotStarted,
    Running,
    Completed,
}

#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    input: i32,
    deadline: Option<Duration>,
    tasks: Vec<TaskSpec>,
    states: Vec<TaskState>,
    lifecycle: Lifecycle,
}

impl Group {
    pub fn new(id: GroupId, input: i32, deadline: Option<Duration>) -> Result<Self, ExecutionError> {
        let deadline = deadline.map(validate_deadline).transpose()?;
        Ok(Self {
            id,
            input,
            deadline,
            tasks: Vec::new(),
            states: Vec::new(),
            lifecycle: Lifecycle::NotStarted,
        })
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn input(&self) -> i32 {
        self.input
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_completed(&self) -> bool {
        self.lifecycle == Lifecycle::Completed
    }

    /// Append a task; indexes are assigned 1, 2, 3, ... in call order
    pub fn add_task(
        &mut self,
        kind: FunctionKind,
        deadline: Option<Duration>,
    ) -> Result<TaskIndex, ExecutionError> {
        match self.lifecycle {
            Lifecycle::NotStarted => {}
            Lifecycle::Running => return Err(ExecutionError::GroupRunning(self.id)),
            Lifecycle::Completed => return Err(ExecutionError::GroupCompleted(self.id)),
        }

        let deadline = deadline.map(validate_deadline).transpose()?;
        let index = TaskIndex::from_position(self.tasks.len());
        self.tasks.push(TaskSpec::new(index, kind, deadline));
        self.states.push(TaskState::Pending);
        Ok(index)
    }

    pub(crate) fn begin_run(&mut self) {
        self.lifecycle = Lifecycle::Running;
    }

    pub(crate) fn finish_run(&mut self, states: Vec<TaskState>) {
        self.states = states;
        self.lifecycle = Lifecycle::Completed;
    }

    /// Forget a run that never finished; every task is pending again
    pub(crate) fn abandon_run(&mut self) {
        self.states = vec![TaskState::Pending; self.tasks.len()];
        self.lifecycle = Lifecycle::NotStarted;
    }

    pub fn state(&self, index: TaskIndex) -> Option<TaskState> {
        self.states.get(index.position()).copied()
    }

    /// One entry per task, in index order
    pub fn summary(&self) -> Vec<SummaryEntry> {
        self.tasks
            .iter()
            .zip(&self.states)
            .map(|(spec, state)| SummaryEntry {
                index: spec.index,
                kind: spec.kind,
                outcome: state.outcome(),
            })
            .collect()
    }
}
