//! Deadline timers for tasks and groups

use std::time::Duration;

use cohort_core::{CancelReason, TaskIndex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::SharedRunState;

/// Owns the timers of one run and aborts them when the run is over
pub struct TimeoutSupervisor {
    state: SharedRunState,
    timers: Vec<JoinHandle<()>>,
}

impl TimeoutSupervisor {
    pub fn new(state: SharedRunState) -> Self {
        Self {
            state,
            timers: Vec::new(),
        }
    }

    /// Raise the group timeout flag once `deadline` has elapsed, unless the
    /// run has completed by then
    pub fn arm_group_timer(&mut self, deadline: Duration) {
        let state = self.state.clone();
        self.timers.push(tokio::spawn(async move {
            tokio::time::sleep(deadline).await;

            let mut state = state.lock().await;
            if state.completed {
                return;
            }
            state.group_timed_out = true;
            warn!("Group {} exceeded its limit of {:?}", state.group, deadline);
        }));
    }

    /// Cancel task `index` once `deadline` has elapsed, if it is still pending
    /// and the group has neither completed nor timed out
    pub fn arm_task_timer(&mut self, index: TaskIndex, deadline: Duration) {
        let state = self.state.clone();
        self.timers.push(tokio::spawn(async move {
            tokio::time::sleep(deadline).await;

            let mut state = state.lock().await;
            if state.completed || state.group_timed_out {
                return;
            }
            if state.cancel_task(index, CancelReason::TaskTimeout).await {
                info!("Component {} exceeded its limit of {:?}", index, deadline);
            } else {
                debug!("Timer of task {} fired after it finished", index);
            }
        }));
    }

    pub fn armed(&self) -> usize {
        self.timers.len()
    }

    /// Abort every timer still sleeping
    pub fn disarm(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

impl Drop for TimeoutSupervisor {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RunState;
    use cohort_core::{FunctionKind, GroupId, TaskSpec, TaskState};

    fn shared(count: usize) -> SharedRunState {
        let specs: Vec<_> = (0..count)
            .map(|position| {
                TaskSpec::new(TaskIndex::from_position(position), FunctionKind::Square, None)
            })
            .collect();
        RunState::shared(GroupId(0), &specs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_timer_cancels_pending_task() {
        let state = shared(2);
        let _tx = state.lock().await.channels.create(TaskIndex(1)).unwrap();

        let mut supervisor = TimeoutSupervisor::new(state.clone());
        supervisor.arm_task_timer(TaskIndex(1), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let guard = state.lock().await;
        assert_eq!(
            guard.task_states(),
            vec![TaskState::Cancelled(CancelReason::TaskTimeout), TaskState::Pending]
        );
        assert!(guard.channels.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_timer_leaves_completed_task_alone() {
        let state = shared(1);
        state.lock().await.record_result(TaskIndex(1), 9);

        let mut supervisor = TimeoutSupervisor::new(state.clone());
        supervisor.arm_task_timer(TaskIndex(1), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(state.lock().await.task_states(), vec![TaskState::Completed(9)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_timer_yields_to_group_timeout() {
        let state = shared(1);
        state.lock().await.group_timed_out = true;

        let mut supervisor = TimeoutSupervisor::new(state.clone());
        supervisor.arm_task_timer(TaskIndex(1), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(state.lock().await.is_pending(TaskIndex(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_timer_sets_flag_once() {
        let state = shared(1);
        let mut supervisor = TimeoutSupervisor::new(state.clone());
        supervisor.arm_group_timer(Duration::from_millis(200));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!state.lock().await.group_timed_out);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(state.lock().await.group_timed_out);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_do_nothing_after_completion() {
        let state = shared(1);
        let mut supervisor = TimeoutSupervisor::new(state.clone());
        supervisor.arm_group_timer(Duration::from_millis(10));
        supervisor.arm_task_timer(TaskIndex(1), Duration::from_millis(10));
        assert_eq!(supervisor.armed(), 2);

        state.lock().await.completed = true;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let guard = state.lock().await;
        assert!(!guard.group_timed_out);
        assert!(guard.is_pending(TaskIndex(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_aborts_sleeping_timers() {
        let state = shared(1);
        let mut supervisor = TimeoutSupervisor::new(state.clone());
        supervisor.arm_group_timer(Duration::from_millis(100));
        supervisor.disarm();
        assert_eq!(supervisor.armed(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!state.lock().await.group_timed_out);
    }
}
