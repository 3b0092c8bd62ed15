//! REPL (Read-Eval-Print Loop) implementation for the Cohort console

use anyhow::{Context as _, Result};
use cohort_config::CohortConfig;
use cohort_execution::{ExecutionError, RunOutcome, Session};
use colored::*;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::formatter::OutputFormatter;
use super::parser::{CommandParser, ConsoleCommand};
use super::ConsoleConfig;

const COMMANDS: [&str; 6] = ["group", "new", "run", "summary", "help", "exit"];

/// Keyword completion and history hints
struct CohortHelper {
    hinter: HistoryHinter,
}

impl Helper for CohortHelper {}

impl Completer for CohortHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_cursor = &line[..pos];
        let start = line_to_cursor.rfind(' ').map(|i| i + 1).unwrap_or(0);
        let prefix = &line_to_cursor[start..];

        // Only the first word is a keyword; `limit` may follow any argument
        let candidates: Vec<&str> = if start == 0 {
            COMMANDS.to_vec()
        } else {
            vec!["limit"]
        };

        Ok((
            start,
            candidates
                .into_iter()
                .filter(|candidate| candidate.starts_with(prefix))
                .map(|candidate| Pair {
                    display: candidate.to_string(),
                    replacement: candidate.to_string(),
                })
                .collect(),
        ))
    }
}

impl Hinter for CohortHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Validator for CohortHelper {}

impl Highlighter for CohortHelper {}

/// Main console REPL implementation
pub struct CohortConsole {
    config: ConsoleConfig,
    session: Session,
    parser: CommandParser,
    formatter: OutputFormatter,
    running: bool,
}

impl CohortConsole {
    /// Create a new console instance
    pub fn new(config: ConsoleConfig, app_config: &CohortConfig) -> Result<Self> {
        let session =
            Session::new(&app_config.execution).context("Failed to set up the execution engine")?;
        info!(
            "Console using {:?} workers, polling every {:?}",
            app_config.execution.worker_backend, app_config.execution.poll_interval
        );

        Ok(Self {
            config,
            session,
            parser: CommandParser::new(),
            formatter: OutputFormatter::new(),
            running: false,
        })
    }

    /// Run the script if one was given, otherwise the interactive loop
    pub async fn run(&mut self) -> Result<()> {
        self.running = true;

        if let Some(script_file) = self.config.script_file.clone() {
            return self.execute_script(&script_file).await;
        }

        self.run_interactive().await
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut editor: Editor<CohortHelper, rustyline::history::FileHistory> = Editor::new()?;
        editor.set_helper(Some(CohortHelper {
            hinter: HistoryHinter {},
        }));

        let history_file = self.history_file();
        if let Some(path) = &history_file {
            if editor.load_history(path).is_err() {
                debug!("No console history at {:?}", path);
            }
        }

        self.show_banner();

        while self.running {
            match editor.readline(&"cohort> ".bright_green().to_string()) {
                Ok(input) => {
                    let input = input.trim();
                    if input.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(input)?;
                    self.execute_line(input).await;
                }
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    println!("Use 'exit' or Ctrl+D to quit");
                    continue;
                }
                Err(rustyline::error::ReadlineError::Eof) => {
                    break;
                }
                Err(e) => {
                    self.formatter.print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        if let Some(path) = &history_file {
            editor
                .save_history(path)
                .with_context(|| format!("Failed to save history to {:?}", path))?;
        }
        Ok(())
    }

    /// Execute every line of a script; blank lines and `#` comments are skipped
    async fn execute_script(&mut self, path: &Path) -> Result<()> {
        let script = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {:?}", path))?;
        info!("Executing console script {:?}", path);

        for line in script.lines().map(str::trim) {
            if !self.running {
                break;
            }
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            println!("{} {}", ">".bright_black(), line);
            self.execute_line(line).await;
        }
        Ok(())
    }

    fn history_file(&self) -> Option<PathBuf> {
        self.config
            .history_file
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cohort_history")))
    }

    fn show_banner(&self) {
        println!(
            "{}",
            format!("Cohort Console v{}", env!("CARGO_PKG_VERSION"))
                .bright_cyan()
                .bold()
        );
        println!(
            "Type '{}' for available commands, '{}' to quit",
            "help".bright_yellow(),
            "exit".bright_yellow()
        );
        println!();
    }

    /// Parse and execute one line, reporting any error on the console
    async fn execute_line(&mut self, input: &str) {
        let result = match self.parser.parse(input) {
            Ok(command) => self.execute(command).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.formatter.print_error(&format!("{:#}", e));
        }
    }

    async fn execute(&mut self, command: ConsoleCommand) -> Result<()> {
        match command {
            ConsoleCommand::Group { input, limit } => {
                let id = self.session.declare_group(input, limit)?;
                self.formatter
                    .print_success(&self.formatter.group_declared(id, input, limit));
            }
            ConsoleCommand::New { kind, limit } => {
                let index = self.session.add_task(kind, limit)?;
                let group = self
                    .session
                    .group()
                    .map(|group| group.id())
                    .ok_or(ExecutionError::NoGroup)?;
                self.formatter
                    .print_success(&self.formatter.task_added(group, index, kind, limit));
            }
            ConsoleCommand::Run => self.run_group().await?,
            ConsoleCommand::Summary => match self.session.summarize() {
                Ok(entries) => self.formatter.print_summary(&entries),
                Err(ExecutionError::NoGroup) => {
                    self.formatter.print_info("No summary is available yet.")
                }
                Err(e) => return Err(e.into()),
            },
            ConsoleCommand::Help => self.formatter.print_help(),
            ConsoleCommand::Exit => {
                println!("Exiting...");
                self.running = false;
            }
        }
        Ok(())
    }

    async fn run_group(&mut self) -> Result<()> {
        if self.session.group().is_some_and(|group| !group.tasks().is_empty() && !group.is_completed()) {
            self.formatter.print_info("Running components...");
        }

        match self.session.run().await? {
            RunOutcome::AlreadyCompleted => {
                self.formatter
                    .print_warning("This group has already run. Declare a new group first.");
            }
            RunOutcome::NoTasks => self.formatter.print_info("No components to run."),
            RunOutcome::Finished(report) => {
                if let Some(error) = &report.infrastructure_error {
                    self.formatter
                        .print_error(&format!("Result collection failed: {}", error));
                }
                self.formatter
                    .print_success(&self.formatter.run_finished(&report));
            }
        }
        Ok(())
    }
}
