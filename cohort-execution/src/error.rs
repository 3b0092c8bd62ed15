//! Error types for group execution

use cohort_core::GroupId;
use thiserror::Error;

/// Group execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No group has been declared")]
    NoGroup,

    #[error("Group {0} is still running")]
    GroupRunning(GroupId),

    #[error("Group {0} has already completed")]
    GroupCompleted(GroupId),

    #[error(transparent)]
    Core(#[from] cohort_core::CoreError),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Result channel error: {0}")]
    ChannelError(String),

    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("Multiplexer error: {0}")]
    MultiplexError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

// Convert from config errors
impl From<cohort_config::ConfigError> for ExecutionError {
    fn from(err: cohort_config::ConfigError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

// Convert from IPC errors
impl From<cohort_ipc::IpcError> for ExecutionError {
    fn from(err: cohort_ipc::IpcError) -> Self {
        Self::Ipc(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ExecutionError::GroupRunning(GroupId(2)).to_string(),
            "Group 2 is still running"
        );

        let err: ExecutionError = cohort_core::CoreError::InvalidDeadline("zero".to_string()).into();
        assert!(matches!(err, ExecutionError::Core(_)));

        let err: ExecutionError = cohort_ipc::IpcError::ConnectionClosed.into();
        assert!(matches!(err, ExecutionError::Ipc(_)));
    }
}
