//! Error handling for the livewatch CLI.
//!
//! `CliError` is the top-level error returned by the run loop and config
//! loading. It is converted to a [`miette::Report`] at the top of `main`.

use std::path::PathBuf;
use thiserror::Error;

mod miette;

pub use self::miette::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Config file or environment problems
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors from the reload server
    #[error(transparent)]
    Server(#[from] livewatch::Error),

    /// I/O errors (signal handling, terminal)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while layering configuration sources.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file doesn't exist
    #[error("Config file not found: {}\n\nHint: Create a livewatch.config.json file or fix the --config path", .0.display())]
    NotFound(PathBuf),

    /// A source could not be parsed or has the wrong shape
    #[error("Invalid configuration: {0}\n\nHint: Check livewatch.config.json syntax, field names and LIVEWATCH_* variables")]
    Invalid(#[from] Box<figment::Error>),
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_not_found() {
        let err = ConfigError::NotFound(PathBuf::from("custom.json"));
        let msg = err.to_string();
        assert!(msg.contains("Config file not found"));
        assert!(msg.contains("custom.json"));
        assert!(msg.contains("Hint:"));
    }

    #[test]
    fn test_cli_error_from_config_error() {
        let err: CliError = ConfigError::NotFound(PathBuf::from("x.json")).into();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_server_error_is_transparent() {
        let err: CliError = livewatch::Error::AlreadyListening.into();
        assert_eq!(err.to_string(), "Server is already listening");
    }
}
