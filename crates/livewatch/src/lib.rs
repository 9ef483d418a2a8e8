//! # livewatch
//!
//! A development server speaking the LiveReload protocol. It watches project
//! files and tells every connected browser to refresh, either the whole page
//! or, for stylesheets and images, just the changed asset.
//!
//! ## Quick start
//!
//! ```no_run
//! use livewatch::{Options, Server};
//!
//! # async fn run() -> livewatch::Result<()> {
//! let server = Server::from_options(Options {
//!     delay: Some(100),
//!     ..Options::default()
//! })?;
//!
//! let addr = server.listen().await?;
//! server.watch(["./public"])?;
//! println!("waiting for browsers on {addr}");
//!
//! tokio::signal::ctrl_c().await?;
//! server.close();
//! # Ok(())
//! # }
//! ```
//!
//! Pages opt in with
//! `<script src="http://localhost:35729/livereload.js"></script>`.

pub mod assets;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod filter;
pub mod hub;
pub mod protocol;
pub mod server;
pub mod watcher;

pub use coalesce::{Coalescer, ReloadSink};
pub use config::{
    Config, Options, TlsOptions, DEFAULT_EXCLUSIONS, DEFAULT_EXTS, DEFAULT_PORT,
    DEFAULT_PROTOCOL_VERSION,
};
pub use error::{ConfigError, Error, Result};
pub use filter::{should_reload, ExclusionSet};
pub use hub::{BroadcastReport, Hub};
pub use protocol::{ClientMessage, ServerMessage, Session, SessionId, SessionState};
pub use server::{Server, ServerEvent};
pub use watcher::{FileChange, FileWatcher};
