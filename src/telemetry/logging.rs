//! Logging configuration and initialization
//!
//! Structured logging with tracing: env-filtered console output in
//! compact or JSON form, with an optional non-blocking file layer.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable console output (default: true).
    pub console_enabled: bool,
    /// Enable file logging (default: false).
    pub file_enabled: bool,
    /// Path for the log file when file logging is enabled.
    pub file_path: Option<PathBuf>,
    /// Use JSON format on the console (default: false).
    pub json_format: bool,
    /// Default log level filter (default: "info").
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

/// Initialize the logging system with the given configuration.
///
/// Returns a guard that must be kept alive for the duration of the
/// program so the file layer flushes on exit.
///
/// # Environment Variables
///
/// - `MEDIA_SINK_LOG`: log level filter (e.g. "debug",
///   "info,media_sink=trace"); falls back to `RUST_LOG`, then to the
///   configured default.
/// - `MEDIA_SINK_LOG_FORMAT`: set to "json" for JSON console output.
pub fn init_logging(
    config: &LogConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_env("MEDIA_SINK_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let use_json = std::env::var("MEDIA_SINK_LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(config.json_format);

    let mut file_guard: Option<WorkerGuard> = None;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.file_enabled {
        let log_path = config
            .file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("media_sink.log"));
        let file = std::fs::File::create(&log_path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        if config.console_enabled {
            let console_layer = fmt::layer().with_target(true).compact();
            subscriber.with(file_layer).with(console_layer).init();
        } else {
            subscriber.with(file_layer).init();
        }
    } else if config.console_enabled {
        if use_json {
            let json_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            subscriber.with(json_layer).init();
        } else {
            let console_layer = fmt::layer().with_target(true).compact();
            subscriber.with(console_layer).init();
        }
    } else {
        subscriber.init();
    }

    tracing::info!(
        target: "media_sink",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "logging initialized"
    );

    Ok(file_guard)
}

/// Initialize logging with defaults; suitable for most hosts.
pub fn init_logging_default(
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    init_logging(&LogConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_config_defaults() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert!(!config.json_format);
        assert_eq!(config.default_level, "info");
    }
}
