//! Process workers: one child OS process per task
//!
//! The coordinator starts `<program> --worker --worker-id <channel>`, writes a
//! single `Compute` envelope to the child's stdin and closes it. A reader task
//! forwards the child's one reply into the task's result channel. The worker
//! side of the exchange is [`serve_worker`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::channel::{ResultPayload, ResultSender};
use crate::error::ExecutionError;
use crate::executor::{LaunchRequest, WorkerHandle, WorkerLauncher};
use crate::ipc::{
    ChildProcessTransport, ComputeResult, CoordinatorMessage, IpcError, IpcTransport,
    MessageEnvelope, WorkerError, WorkerMessage,
};

/// Starts each task in a child process running `program`
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    /// Launcher for an explicit worker program
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Launcher that re-executes the current binary in worker mode
    pub fn current_exe() -> Result<Self, ExecutionError> {
        let program = std::env::current_exe().map_err(|e| {
            ExecutionError::ConfigurationError(format!("Failed to get current exe: {}", e))
        })?;
        Ok(Self::new(program))
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(
        &self,
        request: LaunchRequest,
        result_tx: ResultSender,
    ) -> Result<Box<dyn WorkerHandle>, ExecutionError> {
        debug!("Spawning worker process {}", request.channel);

        let mut cmd = Command::new(&self.program);
        cmd.arg("--worker")
            .arg("--worker-id")
            .arg(&request.channel)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ExecutionError::LaunchFailed(format!(
                "Failed to spawn worker {} ({}): {}",
                request.channel,
                self.program.display(),
                e
            ))
        })?;

        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutionError::LaunchFailed("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::LaunchFailed("Failed to get stdout".to_string()))?;

        let mut transport = ChildProcessTransport::new(stdin, stdout);
        let correlation_id = Uuid::new_v4();
        let message = WorkerMessage::Compute {
            channel: request.channel.clone(),
            kind: request.kind,
            input: request.input,
            compute_duration_ms: request.compute_duration.as_millis() as u64,
            correlation_id,
        };

        if let Err(e) = transport.send(&MessageEnvelope::new(message)).await {
            if let Err(kill_err) = child.kill().await {
                debug!("Failed to kill worker {}: {}", request.channel, kill_err);
            }
            return Err(ExecutionError::LaunchFailed(format!(
                "Failed to send work to {}: {}",
                request.channel, e
            )));
        }
        transport.close_stdin();

        let channel = request.channel.clone();
        let reader = tokio::spawn(async move {
            let payload = read_reply(&mut transport, correlation_id).await;
            if let Err(e) = &payload {
                debug!("Worker {} produced no result: {}", channel, e);
            }
            if result_tx.send(payload).is_err() {
                debug!("Result of {} discarded, channel closed", channel);
            }
        });

        info!("Started worker process {} (pid {:?})", request.channel, pid);

        Ok(Box::new(ProcessWorker {
            id: request.channel,
            pid,
            child,
            reader: Some(reader),
        }))
    }

    fn backend(&self) -> &'static str {
        "process"
    }
}

/// Read the single reply of a worker process
async fn read_reply(transport: &mut ChildProcessTransport, correlation_id: Uuid) -> ResultPayload {
    let envelope = transport.receive::<CoordinatorMessage>().await?;

    match envelope.message {
        CoordinatorMessage::ComputeResult {
            correlation_id: reply_id,
            result,
        } if reply_id == correlation_id => Ok(result.value),
        CoordinatorMessage::ComputeResult { correlation_id, .. } => Err(IpcError::InvalidMessage(
            format!("Unexpected correlation id {}", correlation_id),
        )),
        CoordinatorMessage::Error { error, .. } => Err(IpcError::WorkerError(error)),
    }
}

/// Handle to a child-process worker
#[derive(Debug)]
pub struct ProcessWorker {
    id: String,
    pid: Option<u32>,
    child: Child,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl WorkerHandle for ProcessWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn kill(&mut self) -> Result<(), ExecutionError> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("Worker {} already exited with {}", self.id, status);
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => debug!("Failed to poll worker {}: {}", self.id, e),
        }

        debug!("Killing worker process {} (pid {:?})", self.id, self.pid);
        self.child.kill().await.map_err(|e| {
            ExecutionError::WorkerError(format!("Failed to kill worker {}: {}", self.id, e))
        })
    }

    async fn reap(&mut self) -> Result<(), ExecutionError> {
        let status = self.child.wait().await.map_err(|e| {
            ExecutionError::WorkerError(format!("Failed to wait for worker {}: {}", self.id, e))
        })?;
        debug!("Worker process {} exited with {}", self.id, status);

        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!("Reader of worker {} failed: {}", self.id, e);
            }
        }

        Ok(())
    }
}

/// Worker side of the protocol: answer `Compute` requests until the
/// coordinator closes the connection or asks for shutdown.
pub async fn serve_worker<T: IpcTransport>(
    worker_id: &str,
    transport: &mut T,
) -> Result<(), ExecutionError> {
    info!("Worker {} ready", worker_id);

    loop {
        let envelope = match transport.receive::<WorkerMessage>().await {
            Ok(envelope) => envelope,
            Err(IpcError::ConnectionClosed) => {
                debug!("Worker {} received EOF, shutting down", worker_id);
                break;
            }
            Err(e @ IpcError::DeserializationError(_))
            | Err(e @ IpcError::ProtocolVersionMismatch { .. }) => {
                error!("Worker {} failed to parse message: {}", worker_id, e);
                let reply = CoordinatorMessage::Error {
                    correlation_id: None,
                    error: WorkerError::MessageParseError {
                        error: e.to_string(),
                    },
                };
                transport.send(&MessageEnvelope::new(reply)).await?;
                continue;
            }
            Err(e) => {
                error!("Worker {} failed to read from stdin: {}", worker_id, e);
                return Err(e.into());
            }
        };

        match envelope.message {
            WorkerMessage::Compute {
                channel,
                kind,
                input,
                compute_duration_ms,
                correlation_id,
            } => {
                let started_at = chrono::Utc::now();
                tokio::time::sleep(Duration::from_millis(compute_duration_ms)).await;
                let value = kind.apply(input);
                debug!("Worker {} computed {}({}) = {}", worker_id, kind, input, value);

                let reply = CoordinatorMessage::ComputeResult {
                    correlation_id,
                    result: ComputeResult::new(channel, value, started_at, chrono::Utc::now()),
                };
                transport.send(&MessageEnvelope::new(reply)).await?;
            }
            WorkerMessage::Shutdown => {
                info!("Worker {} received shutdown signal", worker_id);
                break;
            }
        }
    }

    transport.close().await?;
    Ok(())
}
