//! Logging infrastructure for Cohort
//!
//! Thin wrappers around `tracing-subscriber` used by the console and by
//! worker processes. Worker processes log to stderr only, since their
//! stdout carries IPC messages.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing, init_worker_tracing};
