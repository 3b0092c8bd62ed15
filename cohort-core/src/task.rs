//! Task domain model and related types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::types::FunctionKind;

/// Identifier of a group within a session (newtype pattern for type safety)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-based sequence index of a task within its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskIndex(pub usize);

impl TaskIndex {
    /// Zero-based position in the group's task list
    pub fn position(&self) -> usize {
        self.0 - 1
    }

    /// Index of the task stored at a zero-based position
    pub fn from_position(position: usize) -> Self {
        TaskIndex(position + 1)
    }
}

impl fmt::Display for TaskIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable description of one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub index: TaskIndex,
    pub kind: FunctionKind,
    /// Per-task deadline; `None` means no limit
    pub deadline: Option<Duration>,
}

impl TaskSpec {
    pub fn new(index: TaskIndex, kind: FunctionKind, deadline: Option<Duration>) -> Self {
        Self {
            index,
            kind,
            deadline,
        }
    }
}

/// Why a task ended without a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The task's own deadline expired before its worker reported
    TaskTimeout,
    /// The group deadline expired before the worker reported
    GroupTimeout,
    /// The result channel or the worker could not be started
    LaunchFailure,
    /// The worker closed its result channel without delivering a value
    WorkerFailure,
    /// Result collection itself failed and the run was force-completed
    InfrastructureError,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::TaskTimeout => "task timeout",
            CancelReason::GroupTimeout => "group timeout",
            CancelReason::LaunchFailure => "launch failure",
            CancelReason::WorkerFailure => "worker failure",
            CancelReason::InfrastructureError => "infrastructure error",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a single task within one run.
///
/// A task leaves `Pending` exactly once; terminal states are never
/// overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    Completed(i64),
    Cancelled(CancelReason),
}

impl TaskState {
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskState::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    /// Record a result. Returns `false` and leaves the state untouched if
    /// the task already reached a terminal state.
    pub fn complete(&mut self, value: i64) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = TaskState::Completed(value);
        true
    }

    /// Record a cancellation. Returns `false` and leaves the state untouched
    /// if the task already reached a terminal state.
    pub fn cancel(&mut self, reason: CancelReason) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = TaskState::Cancelled(reason);
        true
    }

    /// The outcome reported for this state
    pub fn outcome(&self) -> Outcome {
        match self {
            TaskState::Pending => Outcome::Unavailable(UnavailableReason::NotYetRun),
            TaskState::Completed(value) => Outcome::Available(*value),
            TaskState::Cancelled(reason) => {
                Outcome::Unavailable(UnavailableReason::Cancelled(*reason))
            }
        }
    }
}

/// Why a task's value is not available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "cause", rename_all = "snake_case")]
pub enum UnavailableReason {
    NotYetRun,
    Cancelled(CancelReason),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::NotYetRun => write!(f, "not yet run"),
            UnavailableReason::Cancelled(reason) => write!(f, "cancelled ({})", reason),
        }
    }
}

/// Per-task outcome as reported by a group summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Available(i64),
    Unavailable(UnavailableReason),
}

impl Outcome {
    pub fn value(&self) -> Option<i64> {
        match self {
            Outcome::Available(value) => Some(*value),
            Outcome::Unavailable(_) => None,
        }
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Outcome::Unavailable(UnavailableReason::Cancelled(reason)) => Some(*reason),
            _ => None,
        }
    }

    pub fn is_launch_failure(&self) -> bool {
        self.cancel_reason() == Some(CancelReason::LaunchFailure)
    }
}

/// One line of a group summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub index: TaskIndex,
    pub kind: FunctionKind,
    pub outcome: Outcome,
}

/// Check that a deadline is usable. Zero-length deadlines are rejected.
pub fn validate_deadline(deadline: Duration) -> Result<Duration> {
    if deadline.is_zero() {
        return Err(CoreError::InvalidDeadline(
            "deadline must be greater than 0".to_string(),
        ));
    }
    Ok(deadline)
}

/// Parse a whole number of seconds as typed at the console
pub fn parse_deadline_secs(raw: &str) -> Result<Duration> {
    let seconds: u64 = raw
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidDeadline(format!("'{}' is not a whole number of seconds", raw)))?;
    validate_deadline(Duration::from_secs(seconds))
}
