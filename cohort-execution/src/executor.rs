//! Worker launcher and handle traits

use async_trait::async_trait;
use cohort_core::{FunctionKind, GroupId, TaskIndex};
use std::time::Duration;

use crate::channel::ResultSender;
use crate::error::ExecutionError;

/// Everything a worker needs to compute one task
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub group: GroupId,
    pub index: TaskIndex,
    /// Name of the result channel the worker reports on
    pub channel: String,
    pub kind: FunctionKind,
    pub input: i32,
    /// Modelled computation time
    pub compute_duration: Duration,
}

/// Starts workers for individual tasks
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Start a worker that delivers at most one payload on `result_tx`.
    ///
    /// Once this returns, the worker runs independently of the caller; the
    /// returned handle is the only way to stop or reap it.
    async fn launch(
        &self,
        request: LaunchRequest,
        result_tx: ResultSender,
    ) -> Result<Box<dyn WorkerHandle>, ExecutionError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

/// Control over one running worker
#[async_trait]
pub trait WorkerHandle: Send {
    /// Worker identifier used in logs
    fn id(&self) -> &str;

    /// OS process id, if the worker is a process
    fn pid(&self) -> Option<u32>;

    /// Forcibly stop the worker. Stopping a finished worker is not an error.
    async fn kill(&mut self) -> Result<(), ExecutionError>;

    /// Wait for the worker to finish and release its resources
    async fn reap(&mut self) -> Result<(), ExecutionError>;
}
