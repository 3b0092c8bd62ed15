use anyhow::Result;
use cohort_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build an env filter from explicit directives, then `RUST_LOG`, then `fallback`
pub fn build_env_filter(directives: Option<&str>, fallback: &str) -> EnvFilter {
    match directives {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', falling back to '{}'", directives, fallback);
            EnvFilter::new(fallback)
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
    }
}

/// Initialize logging from configuration. `level_override` (from the
/// command line) replaces the configured level and directives.
pub fn init_logging_from_config(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let directives = level_override
        .map(str::to_string)
        .unwrap_or_else(|| config.filter_directives());
    let env_filter = build_env_filter(Some(&directives), "info");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_ids(config.include_thread_ids)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt().with_env_filter(env_filter).try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize tracing for worker processes (output to stderr to avoid IPC conflicts)
pub fn init_worker_tracing(log_level: Option<&str>) -> Result<()> {
    let env_filter = build_env_filter(log_level, "warn");

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    tracing::debug!("Worker tracing initialized");
    Ok(())
}
