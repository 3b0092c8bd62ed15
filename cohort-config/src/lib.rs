//! Domain-driven configuration management for Cohort
//!
//! Configuration is split by functional domain (execution, logging), with
//! validation, defaults, and `COHORT_*` environment variable overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    execution::{ComputeDurations, ExecutionConfig, WorkerBackend},
    logging::{LogFormat, LogLevel, LoggingConfig},
    CohortConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration_ms;
