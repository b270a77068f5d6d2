//! Logging system initialization
//!
//! Sets up tracing with an EnvFilter level, optional JSON formatting and
//! optional non-blocking file output with daily rotation. If the configured
//! file cannot be opened the system falls back to stdout and reports a
//! warning instead of failing startup.

use crate::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;

/// Result of logging initialization
pub struct LoggingInitResult {
    /// Worker guard that must be kept alive for the duration of the program
    pub guard: WorkerGuard,
    /// Warning if file logging fell back to stdout
    pub warning: Option<String>,
}

/// Initialize the logging system. Call once, after configuration load.
pub fn init_logging(config: &LoggingConfig) -> LoggingInitResult {
    let (writer, warning): (Box<dyn std::io::Write + Send + Sync>, Option<String>) =
        match &config.file {
            Some(log_file) if !log_file.is_empty() => {
                let dir = std::path::Path::new(log_file)
                    .parent()
                    .unwrap_or(std::path::Path::new("."));
                let filename = std::path::Path::new(log_file)
                    .file_name()
                    .and_then(|f| f.to_str())
                    .unwrap_or("linkforty.log");

                match rolling::Builder::new()
                    .rotation(rolling::Rotation::DAILY)
                    .filename_prefix(filename.trim_end_matches(".log"))
                    .filename_suffix("log")
                    .build(dir)
                {
                    Ok(appender) => (Box::new(appender), None),
                    Err(e) => (
                        Box::new(std::io::stdout()),
                        Some(format!(
                            "Failed to create rolling log appender for '{}': {}. Falling back to stdout.",
                            log_file, e
                        )),
                    ),
                }
            }
            _ => (Box::new(std::io::stdout()), None),
        };

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(writer);
    let filter = tracing_subscriber::EnvFilter::new(config.level.clone());

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(non_blocking_writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(config.file.as_ref().is_none_or(|f| f.is_empty()));

    if config.format == "json" {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }

    LoggingInitResult { guard, warning }
}
