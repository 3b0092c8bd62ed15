//! IPC types shared with worker processes

pub use cohort_ipc::*;
