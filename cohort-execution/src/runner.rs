//! Runs one group to completion

use std::sync::Arc;
use std::time::Duration;

use cohort_config::{ComputeDurations, ExecutionConfig, WorkerBackend};
use cohort_core::{CancelReason, FunctionKind, GroupId, TaskSpec, TaskState};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::channel::channel_name;
use crate::error::ExecutionError;
use crate::executor::{LaunchRequest, WorkerLauncher};
use crate::multiplexer::{CompletionMultiplexer, MultiplexExit};
use crate::process::ProcessLauncher;
use crate::state::{RunState, SharedRunState};
use crate::supervisor::TimeoutSupervisor;
use crate::worker::InProcessLauncher;

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub group: GroupId,
    pub available: usize,
    pub cancelled: usize,
    pub group_timed_out: bool,
    /// Set when result collection failed and pending tasks were abandoned
    pub infrastructure_error: Option<String>,
    pub elapsed: Duration,
    /// Result channels still allocated after the run; always zero
    pub open_channels: usize,
}

/// Build the launcher selected by the configuration
pub fn launcher_from_config(
    config: &ExecutionConfig,
) -> Result<Arc<dyn WorkerLauncher>, ExecutionError> {
    match config.worker_backend {
        WorkerBackend::InProcess => Ok(Arc::new(InProcessLauncher::new())),
        WorkerBackend::Process => {
            let launcher = match &config.worker_program {
                Some(program) => ProcessLauncher::new(program),
                None => ProcessLauncher::current_exe()?,
            };
            Ok(Arc::new(launcher))
        }
    }
}

/// Modelled duration of one computation kind
pub fn compute_duration(durations: &ComputeDurations, kind: FunctionKind) -> Duration {
    match kind {
        FunctionKind::Square => durations.square,
        FunctionKind::AddConstant => durations.add_constant,
        FunctionKind::SubtractConstant => durations.subtract_constant,
    }
}

/// Launches, supervises and collects the tasks of a group
pub struct GroupRunner {
    launcher: Arc<dyn WorkerLauncher>,
    poll_interval: Duration,
    durations: ComputeDurations,
}

impl GroupRunner {
    pub fn new(launcher: Arc<dyn WorkerLauncher>, config: &ExecutionConfig) -> Self {
        Self {
            launcher,
            poll_interval: config.poll_interval,
            durations: config.compute_durations.clone(),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Result<Self, ExecutionError> {
        Ok(Self::new(launcher_from_config(config)?, config))
    }

    pub fn backend(&self) -> &'static str {
        self.launcher.backend()
    }

    /// Run every task of a group and return their final states.
    ///
    /// Every task ends completed or cancelled, every started worker is
    /// reaped and every result channel is released before this returns.
    pub async fn run(
        &self,
        group: GroupId,
        input: i32,
        deadline: Option<Duration>,
        tasks: &[TaskSpec],
    ) -> (Vec<TaskState>, RunReport) {
        let started = Instant::now();
        info!(
            "Running {} components of group {} on {} workers",
            tasks.len(),
            group,
            self.launcher.backend()
        );

        let state = RunState::shared(group, tasks);
        let mut supervisor = TimeoutSupervisor::new(state.clone());
        if let Some(deadline) = deadline {
            supervisor.arm_group_timer(deadline);
        }

        for spec in tasks {
            self.launch_task(&state, &mut supervisor, input, spec).await;
        }

        let exit = CompletionMultiplexer::new(state.clone(), self.poll_interval)
            .run()
            .await;

        let (workers, infrastructure_error) = {
            let mut guard = state.lock().await;
            let infrastructure_error = match exit {
                Ok(MultiplexExit::Drained) => None,
                Ok(MultiplexExit::GroupTimeout) => {
                    let cancelled = guard.cancel_pending(CancelReason::GroupTimeout).await;
                    warn!("Group {} timed out, {} components cancelled", group, cancelled);
                    None
                }
                Err(e) => {
                    error!("Collecting results of group {} failed: {}", group, e);
                    guard.cancel_pending(CancelReason::InfrastructureError).await;
                    Some(e.to_string())
                }
            };
            guard.completed = true;
            (guard.take_workers(), infrastructure_error)
        };
        supervisor.disarm();

        for (index, mut worker) in workers {
            if let Err(e) = worker.reap().await {
                warn!("Failed to reap worker of task {}: {}", index, e);
            }
        }

        let mut guard = state.lock().await;
        let released = guard.channels.release_all();
        if released > 0 {
            debug!("Released {} remaining result channels of group {}", released, group);
        }

        let states = guard.task_states();
        let report = RunReport {
            group,
            available: states.iter().filter(|s| matches!(s, TaskState::Completed(_))).count(),
            cancelled: states.iter().filter(|s| matches!(s, TaskState::Cancelled(_))).count(),
            group_timed_out: guard.group_timed_out,
            infrastructure_error,
            elapsed: started.elapsed(),
            open_channels: guard.channels.len(),
        };

        info!(
            "Computation of group {} finished in {:?}: {} available, {} cancelled",
            group, report.elapsed, report.available, report.cancelled
        );
        (states, report)
    }

    /// Start one task, or cancel it if it cannot be started.
    ///
    /// The run lock is held while the channel is allocated and again while
    /// the worker is attached, but not across the launch itself, so timers
    /// of tasks already running keep firing on time.
    async fn launch_task(
        &self,
        state: &SharedRunState,
        supervisor: &mut TimeoutSupervisor,
        input: i32,
        spec: &TaskSpec,
    ) {
        let index = spec.index;

        let (group, result_tx) = {
            let mut guard = state.lock().await;

            if guard.group_timed_out {
                debug!("Group {} already timed out, not starting task {}", guard.group, index);
                guard.cancel_task(index, CancelReason::GroupTimeout).await;
                return;
            }

            match guard.channels.create(index) {
                Ok(tx) => (guard.group, tx),
                Err(e) => {
                    error!("Failed to allocate result channel for task {}: {}", index, e);
                    guard.cancel_task(index, CancelReason::LaunchFailure).await;
                    return;
                }
            }
        };

        let request = LaunchRequest {
            group,
            index,
            channel: channel_name(group, index),
            kind: spec.kind,
            input,
            compute_duration: compute_duration(&self.durations, spec.kind),
        };
        let launched = self.launcher.launch(request, result_tx).await;

        let mut guard = state.lock().await;
        match launched {
            Ok(worker) => {
                debug!("Component {} started as {}", index, worker.id());
                guard.attach_worker(index, worker);
            }
            Err(e) => {
                error!("Failed to start component {}: {}", index, e);
                guard.cancel_task(index, CancelReason::LaunchFailure).await;
                return;
            }
        }

        // The group deadline may have passed while the worker was starting
        if guard.group_timed_out {
            debug!("Group {} timed out while task {} was starting", group, index);
            guard.cancel_task(index, CancelReason::GroupTimeout).await;
            return;
        }
        drop(guard);

        if let Some(deadline) = spec.deadline {
            supervisor.arm_task_timer(index, deadline);
        }
    }
}
