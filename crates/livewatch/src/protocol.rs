//! LiveReload wire protocol and per-connection session state.
//!
//! Every frame is a JSON object with a `command` key. Clients open with
//! `hello`, may send `info` describing their plugins, and then just listen
//! for `reload` and `alert`.

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Protocols offered in every `hello` reply, regardless of what the client asks for.
pub const PROTOCOLS: [&str; 5] = [
    "http://livereload.com/protocols/official-7",
    "http://livereload.com/protocols/official-8",
    "http://livereload.com/protocols/official-9",
    "http://livereload.com/protocols/2.x-origin-version-negotiation",
    "http://livereload.com/protocols/2.x-remote-control",
];

/// Name sent in the `hello` reply. Existing clients recognise this one.
pub const SERVER_NAME: &str = "node-livereload";

/// Messages a browser sends to the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Handshake request
    Hello {
        /// Protocols the client speaks; advisory only and accepted in any shape
        #[serde(default)]
        protocols: serde_json::Value,
    },
    /// Client metadata (page URL, enabled plugins); never answered
    Info {
        /// Page the client is running on
        #[serde(default)]
        url: Option<String>,
        /// Plugin descriptions, passed through untouched
        #[serde(default)]
        plugins: Option<serde_json::Value>,
    },
    /// Any command this server does not know
    #[serde(other)]
    Unknown,
}

/// Messages the server sends to browsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Handshake reply
    Hello {
        /// Supported protocols
        protocols: Vec<String>,
        /// Server identification
        #[serde(rename = "serverName")]
        server_name: String,
    },
    /// Reload (or live-patch) a changed resource
    Reload {
        /// Changed file
        path: String,
        /// Swap stylesheets in place instead of reloading
        #[serde(rename = "liveCSS")]
        live_css: bool,
        /// Swap images in place instead of reloading
        #[serde(rename = "liveImg")]
        live_img: bool,
        /// Original path, for proxied setups
        #[serde(rename = "originalPath")]
        original_path: String,
        /// URL override, for proxied setups
        #[serde(rename = "overrideURL")]
        override_url: String,
    },
    /// Show a message in the browser
    Alert {
        /// Text to display
        message: String,
    },
}

impl ServerMessage {
    /// The fixed handshake reply.
    pub fn hello() -> Self {
        ServerMessage::Hello {
            protocols: PROTOCOLS.iter().map(|p| (*p).to_string()).collect(),
            server_name: SERVER_NAME.to_string(),
        }
    }

    /// Reload instruction for `path`, carrying the configured live-patch flags.
    pub fn reload(path: &Path, config: &Config) -> Self {
        ServerMessage::Reload {
            path: path.to_string_lossy().into_owned(),
            live_css: config.apply_css_live,
            live_img: config.apply_img_live,
            original_path: config.original_path.clone(),
            override_url: config.override_url.clone(),
        }
    }

    /// Alert carrying `message`.
    pub fn alert(message: impl Into<String>) -> Self {
        ServerMessage::Alert {
            message: message.into(),
        }
    }

    /// Command name, for logging.
    pub fn command(&self) -> &'static str {
        match self {
            ServerMessage::Hello { .. } => "hello",
            ServerMessage::Reload { .. } => "reload",
            ServerMessage::Alert { .. } => "alert",
        }
    }

    /// Serialize to the JSON text frame sent on the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Identifier assigned to each connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket open, no handshake yet
    Connected,
    /// `hello` exchanged
    Handshaken,
    /// Socket closed or failed
    Closed,
}

/// Protocol state for one browser connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    version: String,
}

impl Session {
    /// Start a session in the `Connected` state.
    pub fn new(id: SessionId, version: impl Into<String>) -> Self {
        Self {
            id,
            state: SessionState::Connected,
            version: version.into(),
        }
    }

    /// Process one inbound text frame and return the reply to send, if any.
    ///
    /// Malformed frames, `info` and unknown commands never produce a reply
    /// and never close the session.
    pub fn handle_text(&mut self, text: &str) -> Option<ServerMessage> {
        if self.state == SessionState::Closed {
            return None;
        }

        debug!(session = %self.id, message = text, "client message");

        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(session = %self.id, error = %e, "dropping malformed client message");
                return None;
            }
        };

        match message {
            ClientMessage::Hello { protocols } => {
                debug!(
                    session = %self.id,
                    version = %self.version,
                    client_protocols = ?protocols,
                    "handshaking with client"
                );
                self.state = SessionState::Handshaken;
                Some(ServerMessage::hello())
            }
            ClientMessage::Info { url, .. } => {
                debug!(session = %self.id, url = ?url, "client info received, not replying");
                None
            }
            ClientMessage::Unknown => {
                debug!(session = %self.id, "ignoring unknown command");
                None
            }
        }
    }

    /// Mark the session closed. Further frames are ignored.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the handshake has completed.
    pub fn is_handshaken(&self) -> bool {
        self.state == SessionState::Handshaken
    }
}
