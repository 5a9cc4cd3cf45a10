//! Logging setup for gymlink binaries
//!
//! Logs go to stderr, filtered by `GYMLINK_LOG`. A log file can be added
//! alongside, written without ANSI colors and with source locations.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{paths, GymError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV_VAR: &str = "GYMLINK_LOG";

/// File name used inside [`paths::log_dir`] when no path is given
pub const DEFAULT_LOG_FILE: &str = "gymlink.log";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    /// Stderr plus a log file
    Both,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output: LogOutput,
    /// Filter directives (e.g., "warn", "gymlink_client=debug")
    pub filter: String,
    /// Log file; `None` means [`DEFAULT_LOG_FILE`] in the log directory
    pub file_path: Option<PathBuf>,
}

impl LogConfig {
    /// Config for the command-line client: quiet stderr unless overridden
    pub fn cli() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| "warn".into()),
            file_path: None,
        }
    }

    /// Also write to a log file
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.output = LogOutput::Both;
        self.file_path = path;
        self
    }

    /// Where file output goes when enabled
    pub fn log_file_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| paths::log_dir().join(DEFAULT_LOG_FILE))
    }
}

/// Install the global subscriber
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| GymError::config(format!("Invalid log filter: {}", e)))?;

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    match config.output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()
                .map_err(|e| GymError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::Both => {
            let log_path = config.log_file_path();
            let file = open_log_file(&log_path)?;
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
                .map_err(|e| GymError::internal(format!("Failed to init logging: {}", e)))?;

            tracing::debug!("Logging to {}", log_path.display());
        }
    }

    Ok(())
}

/// Open `path` for appending, creating its parent directory
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        paths::ensure_dir(dir).map_err(|e| GymError::FileWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| GymError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
}
