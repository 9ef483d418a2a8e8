//! Command-line interface definition.
//!
//! There are no subcommands: `livewatch [PATHS]...` starts the server and
//! watches the given paths until interrupted.

use clap::Parser;
use livewatch::{Options, TlsOptions};
use std::path::PathBuf;

/// livewatch - LiveReload server for static sites and dev builds
#[derive(Parser, Debug)]
#[command(
    name = "livewatch",
    version,
    about = "A LiveReload server that refreshes your browser when files change",
    long_about = "livewatch watches your project and tells every connected browser to reload.\n\
                  Stylesheet and image changes are applied without a full page reload.\n\
                  Add <script src=\"http://localhost:35729/livereload.js\"></script> to your pages."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Files or directories to watch
    #[arg(value_name = "PATHS", default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Port to listen on [default: 35729]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Interface to bind [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// Extensions to watch, replacing the defaults (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub exts: Vec<String>,

    /// Extensions to watch in addition to the defaults (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub extra_exts: Vec<String>,

    /// Regular expressions for paths to ignore (comma-separated)
    #[arg(short = 'x', long, value_delimiter = ',')]
    pub exclusions: Vec<String>,

    /// File names that always trigger a reload (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub files_to_reload: Vec<String>,

    /// Reload the page instead of swapping stylesheets
    #[arg(long)]
    pub no_css_live: bool,

    /// Reload the page instead of swapping images
    #[arg(long)]
    pub no_img_live: bool,

    /// Path the browser requested, matched against page resources (for proxied setups)
    #[arg(long)]
    pub original_path: Option<String>,

    /// Prefix for refetching live-patched stylesheets and images (for proxied setups)
    #[arg(long)]
    pub override_url: Option<String>,

    /// Poll the filesystem instead of using native events
    #[arg(short, long)]
    pub use_polling: bool,

    /// Wait this many milliseconds after the last change before reloading
    #[arg(short = 'w', long, alias = "wait", value_name = "MS")]
    pub delay: Option<u64>,

    /// Log the effective configuration and per-event details
    #[arg(long)]
    pub debug: bool,

    /// TLS certificate (PEM); serves wss:// together with --https-key
    #[arg(long, value_name = "FILE", requires = "https_key")]
    pub https_cert: Option<PathBuf>,

    /// TLS private key (PEM)
    #[arg(long, value_name = "FILE", requires = "https_cert")]
    pub https_key: Option<PathBuf>,

    /// Path to a config file [default: livewatch.config.json if present]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Options given explicitly on the command line.
    ///
    /// Flags that were not passed stay unset so that config file and
    /// environment values show through.
    pub fn to_options(&self) -> Options {
        let https = match (&self.https_cert, &self.https_key) {
            (Some(cert), Some(key)) => Some(TlsOptions {
                cert: cert.clone(),
                key: key.clone(),
            }),
            _ => None,
        };

        Options {
            version: None,
            host: self.host.clone(),
            port: self.port,
            exts: self.exts.clone(),
            extra_exts: self.extra_exts.clone(),
            exclusions: self.exclusions.clone(),
            files_to_reload: self.files_to_reload.clone(),
            apply_css_live: self.no_css_live.then_some(false),
            apply_img_live: self.no_img_live.then_some(false),
            original_path: self.original_path.clone(),
            override_url: self.override_url.clone(),
            use_polling: self.use_polling.then_some(true),
            delay: self.delay,
            debug: self.debug.then_some(true),
            https,
        }
    }
}
