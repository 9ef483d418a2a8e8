//! Server lifecycle for the CLI.
//!
//! Starts the listener, watches the requested paths, reports server events
//! until Ctrl+C, then shuts everything down.

use crate::error::Result;
use crate::ui;
use livewatch::{Options, Server, ServerEvent};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

/// Run the server until interrupted.
///
/// # Errors
///
/// Returns errors for:
/// - Invalid options (bad exclusion pattern, bad host)
/// - Bind or TLS failures
/// - Missing watch paths
pub async fn execute(options: Options, paths: Vec<PathBuf>) -> Result<()> {
    let server = Server::from_options(options)?;
    let mut events = server.subscribe();

    let addr = server.listen().await?;
    if let Err(e) = server.watch(paths.iter().cloned()) {
        server.close();
        return Err(e.into());
    }

    ui::banner(server.config().ws_scheme(), addr, &paths);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => report(&event),
                Err(RecvError::Lagged(skipped)) => ui::warning(&lag_notice(skipped)),
                Err(RecvError::Closed) => break,
            },

            result = signal::ctrl_c() => {
                result?;
                ui::info("Shutting down LiveReload server...");
                break;
            }
        }
    }

    server.close();
    ui::success("LiveReload server stopped");
    Ok(())
}

/// Print a status line for the events a user cares about.
fn report(event: &ServerEvent) {
    match event {
        ServerEvent::Reloaded { path, recipients } => ui::info(&format!(
            "Reloaded {} ({} {})",
            path.display(),
            recipients,
            browsers(*recipients)
        )),
        ServerEvent::Alerted { message, recipients } => ui::info(&format!(
            "Alert \"{}\" sent to {} {}",
            message,
            recipients,
            browsers(*recipients)
        )),
        ServerEvent::Error { message } => ui::error(message),
        ServerEvent::Listening { .. }
        | ServerEvent::ClientConnected { .. }
        | ServerEvent::ClientDisconnected { .. } => {}
    }
}

/// Warning shown when the reporter missed server events.
fn lag_notice(skipped: u64) -> String {
    let noun = if skipped == 1 { "event" } else { "events" };
    format!("Output fell behind; {} server {} not shown", skipped, noun)
}

fn browsers(count: usize) -> &'static str {
    if count == 1 {
        "browser"
    } else {
        "browsers"
    }
}
