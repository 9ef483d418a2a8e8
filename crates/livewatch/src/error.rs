//! Error types for the reload server.
//!
//! Every failure in this crate is local to a startup attempt, a watch
//! request or a configuration step. Per-connection problems (malformed
//! messages, failed sends) are logged and never surface here.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error returned by server operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid options supplied to [`Options::normalize`](crate::Options::normalize)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The listener could not bind its socket (port in use, permission denied, ...)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// TLS material could not be loaded
    #[error("Failed to load TLS certificate/key: {0}")]
    Tls(#[source] std::io::Error),

    /// `listen` was called on a server that is already listening
    #[error("Server is already listening")]
    AlreadyListening,

    /// The server was closed; it cannot listen or watch again
    #[error("Server has been closed")]
    Closed,

    /// A watch root does not exist
    #[error("Watch path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// File watching errors
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems found while normalizing user options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An exclusion pattern is not a valid regular expression
    #[error("Invalid exclusion pattern '{pattern}': {source}\n\nHint: exclusions are regular expressions, e.g. \"node_modules/\"")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },

    /// Invalid value for an option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the option
        field: String,
        /// The rejected value
        value: String,
        /// How to fix it
        hint: String,
    },
}

/// Result type alias using [`Error`] as the default error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
