use anyhow::{Context, Result};
use clap::Parser;
use cohort_config::{CohortConfig, ConfigLoader};
use cohort_execution::{ipc::StdioTransport, serve_worker};
use cohort_logging::{init_logging_from_config, init_simple_tracing, init_worker_tracing};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};
use commands::console::{run_console, ConsoleConfig};

/// Load configuration from file or environment
fn load_config(config_path: Option<&PathBuf>) -> Result<CohortConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                info!("Loading configuration from: {:?}", path);
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Run as worker process
async fn run_worker_process(worker_id: String) -> Result<()> {
    info!("Starting worker process with ID: {}", worker_id);

    let mut transport = StdioTransport::new();
    serve_worker(&worker_id, &mut transport)
        .await
        .with_context(|| format!("Worker {} failed", worker_id))?;

    info!("Worker {} shutting down", worker_id);
    Ok(())
}

/// Handle configuration validation
fn handle_config_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {}", e);
            error!("Configuration validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handle configuration generation
fn handle_config_generate(output: &PathBuf, force: bool) -> Result<()> {
    info!("Generating sample configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, CohortConfig::generate_sample())
        .context("Failed to write configuration file")?;

    println!("✅ Sample configuration generated at: {:?}", output);
    println!(
        "🔧 Validate with: cohort config validate --config-file {:?}",
        output
    );
    Ok(())
}

/// Handle configuration display
fn handle_config_show(config_file: Option<&PathBuf>, format: &str) -> Result<()> {
    let config = load_config(config_file)?;

    match format.to_lowercase().as_str() {
        "yaml" | "yml" => {
            let yaml_output =
                serde_yaml::to_string(&config).context("Failed to serialize to YAML")?;
            println!("{}", yaml_output);
        }
        "json" => {
            let json_output =
                serde_json::to_string_pretty(&config).context("Failed to serialize to JSON")?;
            println!("{}", json_output);
        }
        _ => {
            return Err(anyhow::anyhow!(
                "Unsupported format: {}. Use yaml or json",
                format
            ));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle worker mode first; stdout is reserved for IPC
    if cli.worker {
        let worker_id = cli.worker_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        init_worker_tracing(cli.log_level.as_deref())?;
        return run_worker_process(worker_id).await;
    }

    // Config commands inspect files that may not load, so they skip the configured logging
    if let Some(Commands::Config { config_cmd }) = &cli.command {
        init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
        return match config_cmd {
            ConfigCommands::Validate { config_file } => handle_config_validate(config_file),
            ConfigCommands::Generate { output, force } => handle_config_generate(output, *force),
            ConfigCommands::Show {
                config_file,
                format,
            } => handle_config_show(config_file.as_ref().or(cli.config.as_ref()), format),
        };
    }

    let config = load_config(cli.config.as_ref())?;
    init_logging_from_config(&config.logging, cli.log_level.as_deref())?;
    info!("Cohort CLI starting");

    let console_config = match &cli.command {
        Some(Commands::Console {
            history_file,
            script,
        }) => ConsoleConfig {
            history_file: history_file.clone(),
            script_file: script.clone(),
        },
        _ => ConsoleConfig::default(),
    };
    run_console(console_config, &config).await
}
