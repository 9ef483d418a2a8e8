//! livewatch CLI - a LiveReload server for the terminal.
//!
//! The binary is a thin layer over the [`livewatch`] library:
//!
//! - [`cli`] - Argument parsing with clap
//! - [`config`] - Layering of config file, environment and flags
//! - [`error`] - CLI errors and their miette rendering
//! - [`logger`] - Structured logging with tracing
//! - [`run`] - Server lifecycle until Ctrl+C
//! - [`ui`] - Status lines on stderr

pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod run;
pub mod ui;

pub use error::{CliError, ConfigError, Result};
