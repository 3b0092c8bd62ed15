//! Cohort Execution Engine
//!
//! Runs a group of tasks concurrently against one shared input. Each task
//! gets its own worker (a tokio task or a child process) and a named one-shot
//! result channel. A poll-loop multiplexer collects values as they arrive,
//! while per-task and per-group timers cancel work that runs too long.

pub mod channel;
pub mod error;
pub mod executor;
pub mod group;
pub mod ipc;
pub mod multiplexer;
pub mod process;
pub mod runner;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod worker;

// Re-export main types
pub use channel::{channel_name, ChannelRegistry, ResultPayload, ResultSender};
pub use error::ExecutionError;
pub use executor::{LaunchRequest, WorkerHandle, WorkerLauncher};
pub use group::{Group, Lifecycle};
pub use multiplexer::{CompletionMultiplexer, MultiplexExit};
pub use process::{serve_worker, ProcessLauncher};
pub use runner::{compute_duration, launcher_from_config, GroupRunner, RunReport};
pub use session::{RunOutcome, Session};
pub use state::{RunState, SharedRunState};
pub use supervisor::TimeoutSupervisor;
pub use worker::InProcessLauncher;
