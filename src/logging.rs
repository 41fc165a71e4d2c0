//! Logging initialization for fleetdesk.
//!
//! Logs go to stderr by default. With `logging.to_file` they are written to
//! `{state}/logs/fleetdesk-{datetime}.log` instead, keeping command output
//! on stdout clean.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Guard that must be kept alive for the duration of the program.
    /// When dropped, ensures all buffered logs are flushed.
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file, when file logging is enabled
    pub log_file_path: Option<PathBuf>,
}

/// Level filter: `RUST_LOG` wins, then `--debug`, then the configured level
fn filter_directive(config: &Config, debug_override: bool) -> String {
    if let Ok(directive) = std::env::var("RUST_LOG") {
        return directive;
    }
    if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

fn log_file_name() -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    format!("fleetdesk-{}.log", timestamp)
}

/// Initialize the global subscriber.
///
/// Returns a `LoggingHandle` that must be kept alive for the duration of
/// the program.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let filter = EnvFilter::new(filter_directive(config, debug_override));

    if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)?;

        let log_filename = log_file_name();
        let log_file_path = logs_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false) // No ANSI codes in log files
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}
