//! Server configuration.
//!
//! [`Options`] is what users write (a `livewatch.config.json`, CLI flags, or a
//! struct literal when embedding). [`Options::normalize`] turns it into a fully
//! populated [`Config`], which stays read-only for the life of a server.

use crate::error::ConfigError;
use crate::filter::ExclusionSet;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Protocol version advertised in logs during the handshake.
pub const DEFAULT_PROTOCOL_VERSION: &str = "7";

/// Standard LiveReload port.
pub const DEFAULT_PORT: u16 = 35729;

/// Extensions that trigger a reload when no explicit list is given.
pub const DEFAULT_EXTS: &[&str] = &[
    "html", "css", "js", "png", "gif", "jpg", "php", "php5", "py", "rb", "erb", "coffee",
];

/// Version-control directories that are never watched.
///
/// Appended after any user-supplied exclusions.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[r"\.git/", r"\.svn/", r"\.hg/"];

/// PEM certificate and key used to serve over TLS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOptions {
    /// Certificate chain (PEM)
    pub cert: PathBuf,
    /// Private key (PEM)
    pub key: PathBuf,
}

/// User-supplied options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Options {
    /// Protocol version string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Interface to bind (default `0.0.0.0`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Listen port (default 35729)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Extensions to watch; replaces the defaults when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exts: Vec<String>,

    /// Extensions prepended to the defaults; wins over `exts`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_exts: Vec<String>,

    /// Regular expressions for paths that are never watched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<String>,

    /// Basenames that always trigger a reload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_to_reload: Vec<String>,

    /// Ask clients to swap stylesheets instead of reloading (default true)
    #[serde(
        default,
        rename = "applyCSSLive",
        skip_serializing_if = "Option::is_none"
    )]
    pub apply_css_live: Option<bool>,

    /// Ask clients to swap images instead of reloading (default true)
    #[serde(
        default,
        rename = "applyImgLive",
        skip_serializing_if = "Option::is_none"
    )]
    pub apply_img_live: Option<bool>,

    /// Passed through to clients for proxied setups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,

    /// Passed through to clients for proxied setups
    #[serde(
        default,
        rename = "overrideURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub override_url: Option<String>,

    /// Poll the filesystem instead of using native events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_polling: Option<bool>,

    /// Coalescing delay in milliseconds; 0 means notify immediately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,

    /// Verbose diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,

    /// Serve over TLS with these credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<TlsOptions>,
}

impl Options {
    /// Apply defaults and validate, producing an immutable [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not an IP address or an exclusion
    /// pattern is not a valid regular expression.
    pub fn normalize(self) -> Result<Config, ConfigError> {
        let ip = match self.host.as_deref() {
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Some(host) => host.parse().map_err(|_| ConfigError::InvalidValue {
                field: "host".to_string(),
                value: host.to_string(),
                hint: "Use an IP address such as 127.0.0.1 or 0.0.0.0".to_string(),
            })?,
        };
        let addr = SocketAddr::new(ip, self.port.unwrap_or(DEFAULT_PORT));

        let exclusions = ExclusionSet::new(
            self.exclusions
                .iter()
                .map(String::as_str)
                .chain(DEFAULT_EXCLUSIONS.iter().copied()),
        )?;

        Ok(Config {
            version: self
                .version
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            addr,
            exts: effective_exts(self.exts, self.extra_exts),
            exclusions,
            files_to_reload: self.files_to_reload,
            apply_css_live: self.apply_css_live.unwrap_or(true),
            apply_img_live: self.apply_img_live.unwrap_or(true),
            original_path: self.original_path.unwrap_or_default(),
            override_url: self.override_url.unwrap_or_default(),
            use_polling: self.use_polling.unwrap_or(false),
            delay: self
                .delay
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            debug: self.debug.unwrap_or(false),
            tls: self.https,
        })
    }
}

/// `extra_exts` wins over `exts`; an empty `exts` means the defaults.
fn effective_exts(exts: Vec<String>, extra_exts: Vec<String>) -> Vec<String> {
    let defaults = DEFAULT_EXTS.iter().map(|ext| (*ext).to_string());

    if !extra_exts.is_empty() {
        extra_exts.into_iter().chain(defaults).collect()
    } else if exts.is_empty() {
        defaults.collect()
    } else {
        exts
    }
}

/// Normalized server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Protocol version string
    pub version: String,
    /// Listen address
    pub addr: SocketAddr,
    /// Effective watched extensions, without leading dots
    pub exts: Vec<String>,
    /// User exclusions followed by the built-in ones
    pub exclusions: ExclusionSet,
    /// Basenames that force a reload
    pub files_to_reload: Vec<String>,
    /// `liveCSS` flag sent with every reload
    pub apply_css_live: bool,
    /// `liveImg` flag sent with every reload
    pub apply_img_live: bool,
    /// `originalPath` sent with every reload
    pub original_path: String,
    /// `overrideURL` sent with every reload
    pub override_url: String,
    /// Poll instead of native events
    pub use_polling: bool,
    /// Coalescing delay; `None` means immediate notification
    pub delay: Option<Duration>,
    /// Verbose diagnostics
    pub debug: bool,
    /// TLS credentials, if serving over https
    pub tls: Option<TlsOptions>,
}

impl Config {
    /// URL scheme clients should use for the WebSocket.
    pub fn ws_scheme(&self) -> &'static str {
        if self.tls.is_some() {
            "wss"
        } else {
            "ws"
        }
    }
}
