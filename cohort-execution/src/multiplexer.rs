//! Completion multiplexer: polls every open result channel of a run

use std::time::Duration;

use cohort_core::CancelReason;
use tracing::{debug, error, info, warn};

use crate::error::ExecutionError;
use crate::state::SharedRunState;

/// Why the multiplexer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplexExit {
    /// Every channel delivered or was closed by cancellation
    Drained,
    /// The group deadline expired first
    GroupTimeout,
}

pub struct CompletionMultiplexer {
    state: SharedRunState,
    poll_interval: Duration,
}

impl CompletionMultiplexer {
    pub fn new(state: SharedRunState, poll_interval: Duration) -> Self {
        Self {
            state,
            poll_interval,
        }
    }

    /// Poll until the wait set is empty or the group times out.
    ///
    /// Each poll holds the run lock while it reads; between polls it sleeps
    /// for at most one poll interval, so a group timeout is noticed within
    /// one interval. A worker that closes its channel without a value only
    /// cancels its own task with [`CancelReason::WorkerFailure`]. A channel
    /// that belongs to no task of the run means the wait set itself is broken:
    /// the loop stops with [`ExecutionError::MultiplexError`] after recording
    /// every value that arrived in the same poll.
    pub async fn run(&self) -> Result<MultiplexExit, ExecutionError> {
        let mut polls: u64 = 0;

        loop {
            {
                let mut state = self.state.lock().await;
                polls += 1;

                if state.group_timed_out {
                    debug!("Group {} timed out after {} polls", state.group, polls);
                    return Ok(MultiplexExit::GroupTimeout);
                }

                let mut failure = None;
                for (index, payload) in state.channels.poll_ready() {
                    if state.slot(index).is_none() {
                        error!("Result channel {} has no task in group {}", index, state.group);
                        failure.get_or_insert_with(|| {
                            format!("result channel {} belongs to no task", index)
                        });
                        continue;
                    }

                    match payload {
                        Ok(value) => {
                            if state.record_result(index, value) {
                                info!("Component {} finished", index);
                            }
                        }
                        Err(e) => {
                            warn!("Worker of component {} delivered no value: {}", index, e);
                            state.cancel_task(index, CancelReason::WorkerFailure).await;
                        }
                    }
                }

                if let Some(message) = failure {
                    return Err(ExecutionError::MultiplexError(message));
                }

                if state.channels.waiting() == 0 {
                    debug!("Group {} drained after {} polls", state.group, polls);
                    return Ok(MultiplexExit::Drained);
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
