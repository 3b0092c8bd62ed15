//! Interactive session: at most one current group at a time

use std::sync::Arc;
use std::time::Duration;

use cohort_config::ExecutionConfig;
use cohort_core::{FunctionKind, GroupId, SummaryEntry, TaskIndex, TaskState};
use tracing::{info, warn};

use crate::error::ExecutionError;
use crate::executor::WorkerLauncher;
use crate::group::{Group, Lifecycle};
use crate::runner::{GroupRunner, RunReport};

/// What a call to [`Session::run`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The group had already run; nothing was started
    AlreadyCompleted,
    /// The group has no tasks; it stays runnable
    NoTasks,
    Finished(RunReport),
}

pub struct Session {
    runner: GroupRunner,
    next_group_id: u32,
    group: Option<Group>,
}

impl Session {
    /// Session using the worker backend selected by `config`
    pub fn new(config: &ExecutionConfig) -> Result<Self, ExecutionError> {
        Ok(Self::with_runner(GroupRunner::from_config(config)?))
    }

    pub fn with_launcher(launcher: Arc<dyn WorkerLauncher>, config: &ExecutionConfig) -> Self {
        Self::with_runner(GroupRunner::new(launcher, config))
    }

    fn with_runner(runner: GroupRunner) -> Self {
        Self {
            runner,
            next_group_id: 0,
            group: None,
        }
    }

    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    /// Make a new group current, discarding the previous one
    pub fn declare_group(
        &mut self,
        input: i32,
        deadline: Option<Duration>,
    ) -> Result<GroupId, ExecutionError> {
        if let Some(group) = &self.group {
            if group.lifecycle() == Lifecycle::Running {
                return Err(ExecutionError::GroupRunning(group.id()));
            }
        }

        let id = GroupId(self.next_group_id);
        let group = Group::new(id, input, deadline)?;
        self.next_group_id += 1;

        info!("Declared group {} with input {} and limit {:?}", id, input, deadline);
        self.group = Some(group);
        Ok(id)
    }

    /// Append a task to the current group
    pub fn add_task(
        &mut self,
        kind: FunctionKind,
        deadline: Option<Duration>,
    ) -> Result<TaskIndex, ExecutionError> {
        let group = self.group.as_mut().ok_or(ExecutionError::NoGroup)?;
        let index = group.add_task(kind, deadline)?;
        info!("Added component {} ({}) to group {}", index, kind, group.id());
        Ok(index)
    }

    /// Run the current group once.
    ///
    /// If the returned future is dropped before it resolves, the group goes
    /// back to `NotStarted` with every task pending, its workers are killed
    /// and it can be run again or replaced.
    pub async fn run(&mut self) -> Result<RunOutcome, ExecutionError> {
        let group = self.group.as_mut().ok_or(ExecutionError::NoGroup)?;

        match group.lifecycle() {
            Lifecycle::Completed => {
                info!("Group {} has already run", group.id());
                return Ok(RunOutcome::AlreadyCompleted);
            }
            Lifecycle::Running => return Err(ExecutionError::GroupRunning(group.id())),
            Lifecycle::NotStarted => {}
        }

        if group.tasks().is_empty() {
            info!("Group {} has no components to run", group.id());
            return Ok(RunOutcome::NoTasks);
        }

        let running = RunningGroup::begin(group);
        let (states, report) = self
            .runner
            .run(
                running.group.id(),
                running.group.input(),
                running.group.deadline(),
                running.group.tasks(),
            )
            .await;
        running.finish(states);

        Ok(RunOutcome::Finished(report))
    }

    /// Outcome of every task of the current group
    pub fn summarize(&self) -> Result<Vec<SummaryEntry>, ExecutionError> {
        self.group
            .as_ref()
            .map(Group::summary)
            .ok_or(ExecutionError::NoGroup)
    }
}

/// A group between `begin_run` and `finish_run`.
///
/// Dropping it without finishing rolls the group back to `NotStarted`.
struct RunningGroup<'a> {
    group: &'a mut Group,
    finished: bool,
}

impl<'a> RunningGroup<'a> {
    fn begin(group: &'a mut Group) -> Self {
        group.begin_run();
        Self {
            group,
            finished: false,
        }
    }

    fn finish(mut self, states: Vec<TaskState>) {
        self.group.finish_run(states);
        self.finished = true;
    }
}

impl Drop for RunningGroup<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Run of group {} was abandoned before it finished", self.group.id());
            self.group.abandon_run();
        }
    }
}
