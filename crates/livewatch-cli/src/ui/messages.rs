//! Status message functions for terminal output.

use super::colors_enabled;
use owo_colors::OwoColorize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Print a success message to stderr.
pub fn success(message: &str) {
    if colors_enabled() {
        eprintln!("{} {}", "✓".green().bold(), message);
    } else {
        eprintln!("✓ {}", message);
    }
}

/// Print an info message to stderr.
pub fn info(message: &str) {
    if colors_enabled() {
        eprintln!("{} {}", "ℹ".blue().bold(), message);
    } else {
        eprintln!("ℹ {}", message);
    }
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    if colors_enabled() {
        eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
    } else {
        eprintln!("⚠ {}", message);
    }
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    if colors_enabled() {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    } else {
        eprintln!("✗ {}", message);
    }
}

/// Startup summary: where browsers connect and what is watched.
///
/// # Examples
///
/// ```no_run
/// use livewatch_cli::ui::banner;
///
/// banner("ws", "127.0.0.1:35729".parse().unwrap(), &[".".into()]);
/// ```
pub fn banner(scheme: &str, addr: SocketAddr, paths: &[PathBuf]) {
    let http = if scheme == "wss" { "https" } else { "http" };
    let script = format!(
        "<script src=\"{}://localhost:{}/livereload.js\"></script>",
        http,
        addr.port()
    );
    let watched = paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    success(&format!("LiveReload listening on {}://{}", scheme, addr));
    info(&format!("Watching: {}", watched));
    if colors_enabled() {
        eprintln!("  Add to your pages: {}", script.cyan());
    } else {
        eprintln!("  Add to your pages: {}", script);
    }
    info("Press Ctrl+C to stop");
}
