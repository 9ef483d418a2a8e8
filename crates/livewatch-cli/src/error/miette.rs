//! Miette diagnostic conversion for CLI errors.

use crate::error::CliError;
use livewatch::Error;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Server(e) => server_error_to_miette(e),
        _ => miette::miette!("{}", err),
    }
}

/// Convert a server error to a miette Report with a hint where one helps
pub fn server_error_to_miette(err: Error) -> Report {
    match err {
        Error::Bind { addr, source } => miette::miette!(
            help = "Another LiveReload server may already be running. Stop it or pass --port",
            "Failed to bind {}: {}",
            addr,
            source
        ),
        Error::PathNotFound(path) => miette::miette!(
            help = "Pass existing files or directories to watch",
            "Watch path not found: {}",
            path.display()
        ),
        Error::Tls(source) => miette::miette!(
            help = "--https-cert and --https-key must point to PEM files",
            "Failed to load TLS certificate/key: {}",
            source
        ),
        _ => miette::miette!("{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_bind_error_has_help() {
        let err = Error::Bind {
            addr: "127.0.0.1:35729".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        let report = cli_error_to_miette(CliError::Server(err));
        assert!(report.to_string().contains("127.0.0.1:35729"));
        let help = report.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("--port"));
    }

    #[test]
    fn test_missing_path_message() {
        let report = server_error_to_miette(Error::PathNotFound(PathBuf::from("nope")));
        assert!(report.to_string().contains("nope"));
    }
}
