//! Mutable state of one group run
//!
//! Everything the multiplexer, the timers and the launch loop touch lives in
//! [`RunState`] behind a single async mutex. Every check-then-act sequence on
//! a task (is it pending? then complete or cancel it) happens while holding
//! that lock, so each task reaches exactly one terminal state.

use std::collections::HashMap;
use std::sync::Arc;

use cohort_core::{CancelReason, GroupId, TaskIndex, TaskSpec, TaskState};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::channel::ChannelRegistry;
use crate::executor::WorkerHandle;

/// State shared by all actors of a run
pub type SharedRunState = Arc<Mutex<RunState>>;

/// One task and what has happened to it so far
#[derive(Debug, Clone)]
pub struct TaskSlot {
    pub spec: TaskSpec,
    pub state: TaskState,
    /// Recorded once at launch
    pub pid: Option<u32>,
}

pub struct RunState {
    pub group: GroupId,
    pub tasks: Vec<TaskSlot>,
    pub channels: ChannelRegistry,
    workers: HashMap<TaskIndex, Box<dyn WorkerHandle>>,
    /// Set once by the group timer, never cleared
    pub group_timed_out: bool,
    /// Set once when the run finishes; timers do nothing afterwards
    pub completed: bool,
}

impl RunState {
    pub fn new(group: GroupId, specs: &[TaskSpec]) -> Self {
        Self {
            group,
            tasks: specs
                .iter()
                .map(|spec| TaskSlot {
                    spec: spec.clone(),
                    state: TaskState::Pending,
                    pid: None,
                })
                .collect(),
            channels: ChannelRegistry::new(group),
            workers: HashMap::new(),
            group_timed_out: false,
            completed: false,
        }
    }

    pub fn shared(group: GroupId, specs: &[TaskSpec]) -> SharedRunState {
        Arc::new(Mutex::new(Self::new(group, specs)))
    }

    pub fn slot(&self, index: TaskIndex) -> Option<&TaskSlot> {
        self.tasks.get(index.position())
    }

    pub fn is_pending(&self, index: TaskIndex) -> bool {
        self.slot(index).is_some_and(|slot| slot.state.is_pending())
    }

    /// Indexes of every task still pending
    pub fn pending(&self) -> Vec<TaskIndex> {
        self.tasks
            .iter()
            .filter(|slot| slot.state.is_pending())
            .map(|slot| slot.spec.index)
            .collect()
    }

    /// Keep the handle of a launched worker until it is reaped
    pub fn attach_worker(&mut self, index: TaskIndex, worker: Box<dyn WorkerHandle>) {
        if let Some(slot) = self.tasks.get_mut(index.position()) {
            if slot.pid.is_none() {
                slot.pid = worker.pid();
            }
        }
        self.workers.insert(index, worker);
    }

    /// Hand over every worker handle for reaping
    pub fn take_workers(&mut self) -> Vec<(TaskIndex, Box<dyn WorkerHandle>)> {
        let mut workers: Vec<_> = self.workers.drain().collect();
        workers.sort_by_key(|(index, _)| *index);
        workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Record a delivered value. Returns `false` if the task was no longer
    /// pending, in which case the value is discarded.
    pub fn record_result(&mut self, index: TaskIndex, value: i64) -> bool {
        let Some(slot) = self.tasks.get_mut(index.position()) else {
            return false;
        };
        if !slot.state.complete(value) {
            warn!("Discarding value {} for task {}, already {:?}", value, index, slot.state);
            return false;
        }
        true
    }

    /// Cancel a pending task: mark it, kill its worker, close its channel and
    /// free the channel name. The killed worker stays attached so it is still
    /// reaped when the run finishes. Returns `false` if the task was not pending.
    pub async fn cancel_task(&mut self, index: TaskIndex, reason: CancelReason) -> bool {
        let Some(slot) = self.tasks.get_mut(index.position()) else {
            return false;
        };
        if !slot.state.cancel(reason) {
            return false;
        }

        if let Some(worker) = self.workers.get_mut(&index) {
            if let Err(e) = worker.kill().await {
                warn!("Failed to kill worker {}: {}", worker.id(), e);
            }
        }

        self.channels.close(index);
        self.channels.release(index);
        debug!("Task {} of group {} cancelled: {}", index, self.group, reason);
        true
    }

    /// Cancel every pending task with the same reason, returning how many
    pub async fn cancel_pending(&mut self, reason: CancelReason) -> usize {
        let mut cancelled = 0;
        for index in self.pending() {
            if self.cancel_task(index, reason).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Final state of every task, in index order
    pub fn task_states(&self) -> Vec<TaskState> {
        self.tasks.iter().map(|slot| slot.state).collect()
    }
}
