//! IPC protocol definitions and message types

use chrono::{DateTime, Utc};
use cohort_core::FunctionKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// IPC protocol version for compatibility checking
pub const IPC_PROTOCOL_VERSION: u32 = 1;

/// Messages sent from the coordinator to a worker process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Compute one task and reply with exactly one result
    Compute {
        /// Result channel name the reply belongs to
        channel: String,
        kind: FunctionKind,
        input: i32,
        /// How long the computation is modelled to take
        compute_duration_ms: u64,
        correlation_id: Uuid,
    },

    /// Shutdown signal
    Shutdown,
}

/// Messages sent from a worker process back to the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorMessage {
    /// The single result of a computation
    ComputeResult {
        correlation_id: Uuid,
        result: ComputeResult,
    },

    /// Worker error
    Error {
        correlation_id: Option<Uuid>,
        error: WorkerError,
    },
}

/// Result of one computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeResult {
    pub channel: String,
    pub value: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl ComputeResult {
    pub fn new(
        channel: String,
        value: i64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let duration_ms = (completed_at - started_at).num_milliseconds();
        Self {
            channel,
            value,
            started_at,
            completed_at,
            duration_ms,
        }
    }
}

/// Worker error types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "error_type", rename_all = "snake_case")]
pub enum WorkerError {
    /// Worker initialization failed
    InitializationFailed { error: String },

    /// Communication error
    CommunicationError { error: String },

    /// Message parse error
    MessageParseError { error: String },

    /// The worker received a message it does not handle
    UnexpectedMessage { error: String },
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::InitializationFailed { error } => {
                write!(f, "Worker initialization failed: {}", error)
            }
            WorkerError::CommunicationError { error } => {
                write!(f, "Communication error: {}", error)
            }
            WorkerError::MessageParseError { error } => {
                write!(f, "Message parse error: {}", error)
            }
            WorkerError::UnexpectedMessage { error } => {
                write!(f, "Unexpected message: {}", error)
            }
        }
    }
}

impl std::error::Error for WorkerError {}

/// Message envelope for all IPC communications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    /// Create a new message envelope
    pub fn new(message: T) -> Self {
        Self {
            protocol_version: IPC_PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Check if protocol version is compatible
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == IPC_PROTOCOL_VERSION
    }
}
