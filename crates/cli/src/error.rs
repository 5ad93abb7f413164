//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Log directory or file not found
    #[error("Log not found: {path}")]
    LogNotFound { path: String },

    /// Replay task could not be joined
    #[error("Replay execution failed: {message}")]
    ReplayExecution { message: String },

    /// Result file could not be written
    #[error("Failed to write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn log_not_found(path: &Path) -> Self {
        Self::LogNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn replay_execution(message: impl Into<String>) -> Self {
        Self::ReplayExecution {
            message: message.into(),
        }
    }

    pub fn output(path: &Path, source: std::io::Error) -> Self {
        Self::Output {
            path: path.display().to_string(),
            source,
        }
    }
}
