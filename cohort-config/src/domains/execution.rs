//! Group execution configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::validation::{Validatable, validate_at_most, validate_positive};
use crate::error::ConfigResult;

/// Group execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Bounded wait between two polls of the open result channels
    #[serde(with = "crate::domains::utils::serde_duration_ms", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Which kind of worker runs each task
    #[serde(default)]
    pub worker_backend: WorkerBackend,

    /// Program started for process workers; defaults to the current executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_program: Option<PathBuf>,

    /// How long each computation takes
    #[serde(default)]
    pub compute_durations: ComputeDurations,
}

/// Worker backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerBackend {
    /// One tokio task per worker
    #[default]
    InProcess,
    /// One child OS process per worker
    Process,
}

/// Modelled duration of each computation kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeDurations {
    #[serde(with = "crate::domains::utils::serde_duration_ms", default = "default_square_duration")]
    pub square: Duration,

    #[serde(with = "crate::domains::utils::serde_duration_ms", default = "default_add_duration")]
    pub add_constant: Duration,

    #[serde(with = "crate::domains::utils::serde_duration_ms", default = "default_subtract_duration")]
    pub subtract_constant: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            worker_backend: WorkerBackend::default(),
            worker_program: None,
            compute_durations: ComputeDurations::default(),
        }
    }
}

impl Default for ComputeDurations {
    fn default() -> Self {
        Self {
            square: default_square_duration(),
            add_constant: default_add_duration(),
            subtract_constant: default_subtract_duration(),
        }
    }
}

impl FromStr for WorkerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_process" | "in-process" | "task" => Ok(WorkerBackend::InProcess),
            "process" => Ok(WorkerBackend::Process),
            _ => Err(format!("Invalid worker backend: {}", s)),
        }
    }
}

impl Validatable for ExecutionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.poll_interval.as_millis(),
            "poll_interval",
            self.domain_name(),
        )?;

        // The poll loop must stay responsive to the group deadline
        validate_at_most(
            self.poll_interval.as_millis(),
            1000,
            "poll_interval",
            self.domain_name(),
        )?;

        if let Some(program) = &self.worker_program {
            if program.as_os_str().is_empty() {
                return Err(self.validation_error("worker_program cannot be empty"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "execution"
    }
}

// Default value functions
fn default_poll_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_square_duration() -> Duration {
    Duration::from_secs(3)
}

fn default_add_duration() -> Duration {
    Duration::from_secs(5)
}

fn default_subtract_duration() -> Duration {
    Duration::from_secs(7)
}
