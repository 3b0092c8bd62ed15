//! Output formatting for console results

use cohort_core::{FunctionKind, GroupId, Outcome, SummaryEntry, TaskIndex};
use cohort_execution::RunReport;
use colored::*;
use std::time::Duration;

/// Output formatter for console results
#[derive(Debug, Default)]
pub struct OutputFormatter {}

impl OutputFormatter {
    pub fn new() -> Self {
        Self {}
    }

    /// Print a success message
    pub fn print_success(&self, message: &str) {
        println!("{} {}", "✓".bright_green().bold(), message);
    }

    /// Print an error message
    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", "✗".bright_red().bold(), message.bright_red());
    }

    /// Print a warning message
    pub fn print_warning(&self, message: &str) {
        println!("{} {}", "⚠".bright_yellow().bold(), message.bright_yellow());
    }

    /// Print an info message
    pub fn print_info(&self, message: &str) {
        println!("{} {}", "ℹ".bright_blue().bold(), message);
    }

    pub fn group_declared(&self, id: GroupId, input: i32, limit: Option<Duration>) -> String {
        format!(
            "New group {} with x = {} and limit = {}",
            id,
            input,
            format_limit(limit)
        )
    }

    pub fn task_added(
        &self,
        group: GroupId,
        index: TaskIndex,
        kind: FunctionKind,
        limit: Option<Duration>,
    ) -> String {
        format!(
            "Computational component {} ({}) with idx {} and limit {} added to group {}",
            kind.symbol(),
            kind,
            index,
            format_limit(limit),
            group
        )
    }

    pub fn run_finished(&self, report: &RunReport) -> String {
        let mut line = format!(
            "Computation finished in {:.2}s: {} available, {} cancelled",
            report.elapsed.as_secs_f64(),
            report.available,
            report.cancelled
        );
        if report.group_timed_out {
            line.push_str(" (group limit reached)");
        }
        line
    }

    /// One line per task, e.g. `Component (ind 1) [Type A]: Result: 16`
    pub fn summary_lines(&self, entries: &[SummaryEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|entry| {
                let result = match &entry.outcome {
                    Outcome::Available(value) => format!("Result: {}", value),
                    Outcome::Unavailable(reason) => {
                        format!("Result is not available ({})", reason)
                    }
                };
                format!(
                    "Component (ind {}) [Type {}]: {}",
                    entry.index,
                    entry.kind.symbol(),
                    result
                )
            })
            .collect()
    }

    /// Print a group summary
    pub fn print_summary(&self, entries: &[SummaryEntry]) {
        if entries.is_empty() {
            self.print_info("No summary is available yet.");
            return;
        }

        println!("{}", "Summary of Computations:".bright_cyan().bold());
        for (entry, line) in entries.iter().zip(self.summary_lines(entries)) {
            match entry.outcome {
                Outcome::Available(_) => println!("  {}", line.bright_green()),
                Outcome::Unavailable(_) => println!("  {}", line.bright_yellow()),
            }
        }
    }

    pub fn print_help(&self) {
        println!("{}", "Available commands:".bright_cyan().bold());
        let commands = [
            ("group <x> [limit <s>]", "Declare a new group with shared input x"),
            ("new <a|b|c> [limit <s>]", "Add a component: a = x*x, b = x+10, c = x-5"),
            ("run", "Run every component of the current group"),
            ("summary", "Show the outcome of every component"),
            ("help", "Show this help"),
            ("exit", "Leave the console"),
        ];
        for (usage, description) in commands {
            println!("  {} {}", format!("{:<26}", usage).bright_yellow(), description);
        }
    }
}

fn format_limit(limit: Option<Duration>) -> String {
    match limit {
        Some(limit) => format!("{}s", limit.as_secs()),
        None => "none".to_string(),
    }
}
