//! Command implementations for the Cohort CLI

pub mod console;
