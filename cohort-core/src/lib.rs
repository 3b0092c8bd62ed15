//! Core domain models and types for Cohort
//!
//! This crate contains the fundamental types used throughout the Cohort
//! workspace. It has minimal dependencies and defines the domain language
//! of the group execution engine: computation kinds, task specifications,
//! per-task states and the outcomes reported in a group summary.

pub mod error;
pub mod task;
pub mod types;

// Re-export commonly used types at the crate root
pub use error::{CoreError, Result};
pub use task::{
    validate_deadline, parse_deadline_secs, CancelReason, GroupId, Outcome, SummaryEntry,
    TaskIndex, TaskSpec, TaskState, UnavailableReason,
};
pub use types::{FunctionKind, ADD_CONSTANT, SUBTRACT_CONSTANT};
