//! Command parsing for console commands

use anyhow::{anyhow, bail, Context, Result};
use cohort_core::{parse_deadline_secs, FunctionKind};
use std::time::Duration;

/// Represents a parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `group <x> [limit <seconds>]`
    Group {
        input: i32,
        limit: Option<Duration>,
    },
    /// `new <a|b|c> [limit <seconds>]`
    New {
        kind: FunctionKind,
        limit: Option<Duration>,
    },
    Run,
    Summary,
    Help,
    Exit,
}

/// Command parser for console input
#[derive(Debug, Default)]
pub struct CommandParser {}

impl CommandParser {
    pub fn new() -> Self {
        Self {}
    }

    /// Parse one console line. Keywords are case-insensitive.
    pub fn parse(&self, input: &str) -> Result<ConsoleCommand> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        let Some((command, args)) = tokens.split_first() else {
            bail!("Empty command");
        };

        match command.to_lowercase().as_str() {
            "group" => {
                let (raw_input, rest) = args
                    .split_first()
                    .ok_or_else(|| anyhow!("Usage: group <x> [limit <seconds>]"))?;
                let input = raw_input
                    .parse::<i32>()
                    .with_context(|| format!("'{}' is not a valid integer input", raw_input))?;
                Ok(ConsoleCommand::Group {
                    input,
                    limit: self.parse_limit(rest)?,
                })
            }
            "new" => {
                let (tag, rest) = args
                    .split_first()
                    .ok_or_else(|| anyhow!("Usage: new <a|b|c> [limit <seconds>]"))?;
                let kind = tag.parse::<FunctionKind>()?;
                Ok(ConsoleCommand::New {
                    kind,
                    limit: self.parse_limit(rest)?,
                })
            }
            "run" => self.no_args(args, ConsoleCommand::Run),
            "summary" => self.no_args(args, ConsoleCommand::Summary),
            "help" => Ok(ConsoleCommand::Help),
            "exit" | "quit" => Ok(ConsoleCommand::Exit),
            other => bail!("Unknown command '{}'. Type 'help' for available commands", other),
        }
    }

    /// Optional trailing `limit <seconds>`
    fn parse_limit(&self, args: &[&str]) -> Result<Option<Duration>> {
        match args {
            [] => Ok(None),
            [keyword, seconds] if keyword.eq_ignore_ascii_case("limit") => {
                Ok(Some(parse_deadline_secs(seconds)?))
            }
            [keyword] if keyword.eq_ignore_ascii_case("limit") => {
                bail!("'limit' needs a number of seconds")
            }
            _ => bail!("Unexpected arguments: {}", args.join(" ")),
        }
    }

    fn no_args(&self, args: &[&str], command: ConsoleCommand) -> Result<ConsoleCommand> {
        if args.is_empty() {
            Ok(command)
        } else {
            bail!("Unexpected arguments: {}", args.join(" "))
        }
    }
}
