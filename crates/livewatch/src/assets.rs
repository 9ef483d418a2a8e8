//! Embedded browser client.
//!
//! Pages include `<script src="http://localhost:35729/livereload.js"></script>`
//! to connect back to the server.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;
use std::borrow::Cow;

/// Well-known path the client script is served from.
pub const CLIENT_SCRIPT_PATH: &str = "/livereload.js";

const CLIENT_SCRIPT_FILE: &str = "livereload.js";

#[derive(RustEmbed)]
#[folder = "assets/client"]
struct ClientAssets;

/// Bytes of the client script.
pub fn client_script() -> Option<Cow<'static, [u8]>> {
    ClientAssets::get(CLIENT_SCRIPT_FILE).map(|file| file.data)
}

/// Serve the client script. Query strings such as `?snipver=1` are ignored.
pub async fn handle_client_script() -> Response {
    match client_script() {
        Some(script) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/javascript"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from(script.into_owned()),
        )
            .into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Missing embedded livereload client",
        )
            .into_response(),
    }
}
