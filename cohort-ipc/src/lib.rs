//! Inter-process communication for Cohort
//!
//! This crate provides the IPC protocol and transport abstractions used for
//! communication between the group coordinator and process workers.

pub mod protocol;
pub mod transport;
pub mod error;

// Re-export commonly used types
pub use protocol::{
    ComputeResult, CoordinatorMessage, MessageEnvelope, WorkerError, WorkerMessage,
    IPC_PROTOCOL_VERSION,
};
pub use transport::{ChildProcessTransport, IpcTransport, StdioTransport};
pub use error::IpcError;
