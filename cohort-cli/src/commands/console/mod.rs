//! Console command implementation
//!
//! Provides an interactive REPL for declaring, running and inspecting groups

use anyhow::Result;
use cohort_config::CohortConfig;
use std::path::PathBuf;

pub mod formatter;
pub mod parser;
pub mod repl;

use repl::CohortConsole;

/// Console command configuration
#[derive(Debug, Clone, Default)]
pub struct ConsoleConfig {
    pub history_file: Option<PathBuf>,
    pub script_file: Option<PathBuf>,
}

/// Main entry point for the console command
pub async fn run_console(config: ConsoleConfig, app_config: &CohortConfig) -> Result<()> {
    let mut console = CohortConsole::new(config, app_config)?;
    console.run().await
}
