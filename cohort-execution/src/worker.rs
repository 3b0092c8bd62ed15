//! In-process workers backed by tokio tasks

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::channel::ResultSender;
use crate::error::ExecutionError;
use crate::executor::{LaunchRequest, WorkerHandle, WorkerLauncher};

/// Runs every task on its own tokio task
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessLauncher;

impl InProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkerLauncher for InProcessLauncher {
    async fn launch(
        &self,
        request: LaunchRequest,
        result_tx: ResultSender,
    ) -> Result<Box<dyn WorkerHandle>, ExecutionError> {
        let id = request.channel.clone();
        debug!("Starting in-process worker {}", id);

        let join = tokio::spawn(async move {
            let started = Instant::now();
            tokio::time::sleep(request.compute_duration).await;
            let value = request.kind.apply(request.input);

            debug!(
                "Worker {} computed {}({}) = {} in {:?}",
                request.channel,
                request.kind,
                request.input,
                value,
                started.elapsed()
            );

            // The receiver is gone if the task was cancelled meanwhile
            if result_tx.send(Ok(value)).is_err() {
                debug!("Result of {} discarded, channel closed", request.channel);
            }
        });

        Ok(Box::new(InProcessWorker {
            id,
            join: Some(join),
        }))
    }

    fn backend(&self) -> &'static str {
        "in_process"
    }
}

/// Handle to a tokio-task worker
#[derive(Debug)]
pub struct InProcessWorker {
    id: String,
    join: Option<JoinHandle<()>>,
}

#[async_trait]
impl WorkerHandle for InProcessWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    async fn kill(&mut self) -> Result<(), ExecutionError> {
        if let Some(join) = &self.join {
            debug!("Aborting in-process worker {}", self.id);
            join.abort();
        }
        Ok(())
    }

    async fn reap(&mut self) -> Result<(), ExecutionError> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };

        match join.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(ExecutionError::WorkerError(format!(
                "Worker {} panicked: {}",
                self.id, e
            ))),
        }
    }
}

impl Drop for InProcessWorker {
    fn drop(&mut self) {
        if let Some(join) = &self.join {
            join.abort();
        }
    }
}
