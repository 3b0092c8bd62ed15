//! Core error types for Cohort

use thiserror::Error;

/// Configuration errors raised while describing a group or a task.
///
/// These are rejected synchronously at the call that introduced them and
/// never change group or task state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid component symbol: '{0}' (expected a, b, c, square, add or subtract)")]
    InvalidTag(String),

    #[error("Invalid deadline: {0}")]
    InvalidDeadline(String),

    #[error("Invalid shared input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Cohort core operations
pub type Result<T> = std::result::Result<T, CoreError>;
