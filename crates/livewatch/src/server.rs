//! The reload server: transport, watcher and session fan-out in one place.
//!
//! ```text
//! notify event -> filter -> coalescer -> hub -> every session's socket
//! ```
//!
//! All handles (listener, watcher, timers, sessions) belong to the
//! [`Server`] value, so several independent servers can run in one process.

use crate::assets::{self, CLIENT_SCRIPT_PATH};
use crate::coalesce::{Coalescer, ReloadSink};
use crate::config::{Config, Options};
use crate::error::{Error, Result};
use crate::filter;
use crate::hub::{outbound_channel, BroadcastReport, Hub};
use crate::protocol::{ServerMessage, Session, SessionId};
use crate::watcher::FileWatcher;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 64;

/// Lifecycle notifications for the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The listener is bound
    Listening { addr: SocketAddr },
    /// A browser connected
    ClientConnected { id: SessionId },
    /// A browser went away
    ClientDisconnected { id: SessionId },
    /// A reload was broadcast
    Reloaded { path: PathBuf, recipients: usize },
    /// An alert was broadcast
    Alerted { message: String, recipients: usize },
    /// The listener failed
    Error { message: String },
}

/// Builds and broadcasts reload messages. Shared by the coalescer and [`Server::refresh`].
struct Notifier {
    config: Arc<Config>,
    hub: Arc<Hub>,
    events: broadcast::Sender<ServerEvent>,
}

impl Notifier {
    fn notify(&self, path: &Path) -> BroadcastReport {
        info!(path = %path.display(), "Reloading");
        let report = self.hub.broadcast(&ServerMessage::reload(path, &self.config));
        let _ = self.events.send(ServerEvent::Reloaded {
            path: path.to_path_buf(),
            recipients: report.delivered,
        });
        report
    }
}

impl ReloadSink for Notifier {
    fn reload(&self, path: &Path) {
        self.notify(path);
    }
}

struct Listener {
    addr: SocketAddr,
    handle: Handle<SocketAddr>,
    task: JoinHandle<io::Result<()>>,
}

impl Listener {
    fn stop(self) {
        self.handle.shutdown();
        self.task.abort();
        debug!(addr = %self.addr, "listener stopped");
    }
}

#[derive(Default)]
struct Running {
    listener: Option<Listener>,
    // A `listen` call is between reserving the slot and storing its listener
    binding: bool,
    watcher: Option<FileWatcher>,
    pump: Option<JoinHandle<()>>,
    closed: bool,
}

/// Holds the listener slot while a bind is in flight. Released on drop,
/// including when the `listen` future is cancelled.
struct BindReservation<'a> {
    running: &'a Mutex<Running>,
}

impl<'a> BindReservation<'a> {
    fn acquire(running: &'a Mutex<Running>) -> Result<Self> {
        let mut guard = running.lock();
        if guard.closed {
            return Err(Error::Closed);
        }
        if guard.binding || guard.listener.is_some() {
            return Err(Error::AlreadyListening);
        }
        guard.binding = true;
        Ok(Self { running })
    }
}

impl Drop for BindReservation<'_> {
    fn drop(&mut self) {
        self.running.lock().binding = false;
    }
}

/// State handed to axum handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    hub: Arc<Hub>,
    events: broadcast::Sender<ServerEvent>,
}

/// LiveReload server.
pub struct Server {
    config: Arc<Config>,
    hub: Arc<Hub>,
    notifier: Arc<Notifier>,
    coalescer: Arc<Coalescer>,
    events: broadcast::Sender<ServerEvent>,
    running: Mutex<Running>,
}

impl Server {
    /// Create a server from a normalized configuration. Nothing is started yet.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let hub = Arc::new(Hub::new());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let notifier = Arc::new(Notifier {
            config: Arc::clone(&config),
            hub: Arc::clone(&hub),
            events: events.clone(),
        });
        let coalescer = Arc::new(Coalescer::new(config.delay, notifier.clone()));

        Self {
            config,
            hub,
            notifier,
            coalescer,
            events,
            running: Mutex::new(Running::default()),
        }
    }

    /// Normalize `options` and create a server.
    ///
    /// # Errors
    ///
    /// Returns error if the options are invalid
    pub fn from_options(options: Options) -> Result<Self> {
        Ok(Self::new(options.normalize()?))
    }

    /// The effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Number of connected browsers.
    pub fn client_count(&self) -> usize {
        self.hub.len()
    }

    /// Address the listener is bound to, if listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().listener.as_ref().map(|l| l.addr)
    }

    /// Router serving the client script and the WebSocket endpoint.
    ///
    /// Merge this into an existing axum application to share its port
    /// instead of calling [`listen`](Self::listen).
    pub fn router(&self) -> Router {
        let state = AppState {
            config: Arc::clone(&self.config),
            hub: Arc::clone(&self.hub),
            events: self.events.clone(),
        };

        Router::new()
            .route(CLIENT_SCRIPT_PATH, get(assets::handle_client_script))
            .route("/livereload", get(handle_upgrade))
            .route("/", get(handle_upgrade))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(state)
    }

    /// Bind the listener and start accepting browsers.
    ///
    /// Resolves once the socket is bound, with the bound address. Serves TLS
    /// when the configuration carries certificates.
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound (no retry, no fallback
    /// port) or the TLS material cannot be loaded. Returns
    /// [`Error::AlreadyListening`] if another call holds the listener, even
    /// one still binding, and [`Error::Closed`] after [`close`](Self::close).
    pub async fn listen(&self) -> Result<SocketAddr> {
        let reservation = BindReservation::acquire(&self.running)?;
        let listener = self.bind().await?;
        let addr = listener.addr;

        {
            let mut running = self.running.lock();
            if running.closed {
                drop(running);
                listener.stop();
                return Err(Error::Closed);
            }
            running.listener = Some(listener);
        }
        // Listener is stored, so the slot stays taken after this
        drop(reservation);

        info!(
            "LiveReload is waiting for a browser to connect on {}://{}",
            self.config.ws_scheme(),
            addr
        );
        let _ = self.events.send(ServerEvent::Listening { addr });
        Ok(addr)
    }

    async fn bind(&self) -> Result<Listener> {
        if self.config.debug {
            info!(
                version = %self.config.version,
                exclusions = ?self.config.exclusions.patterns().collect::<Vec<_>>(),
                extensions = ?self.config.exts,
                polling = self.config.use_polling,
                "LiveReload configuration"
            );
        }

        let addr = self.config.addr;
        let handle: Handle<SocketAddr> = Handle::new();
        let service = self.router().into_make_service();

        let task = match &self.config.tls {
            Some(tls) => {
                let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                    .await
                    .map_err(Error::Tls)?;
                spawn_listener(
                    axum_server::bind_rustls(addr, rustls)
                        .handle(handle.clone())
                        .serve(service),
                    self.events.clone(),
                )
            }
            None => spawn_listener(
                axum_server::bind(addr)
                    .handle(handle.clone())
                    .serve(service),
                self.events.clone(),
            ),
        };

        let Some(bound) = handle.listening().await else {
            let source = match task.await {
                Ok(Err(e)) => e,
                Ok(Ok(())) => io::Error::other("listener stopped before binding"),
                Err(e) => io::Error::other(e),
            };
            return Err(Error::Bind { addr, source });
        };

        Ok(Listener {
            addr: bound,
            handle,
            task,
        })
    }

    /// Start watching `paths` recursively.
    ///
    /// Replaces any watcher started earlier. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if a path does not exist or cannot be watched, or
    /// [`Error::Closed`] after [`close`](Self::close)
    pub fn watch<I, P>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if self.running.lock().closed {
            return Err(Error::Closed);
        }

        let roots: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        let (watcher, mut changes) = FileWatcher::new(
            roots.clone(),
            self.config.exclusions.clone(),
            self.config.use_polling,
        )?;

        let config = Arc::clone(&self.config);
        let coalescer = Arc::clone(&self.coalescer);
        let pump = tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                let path = change.into_path();
                if filter::should_reload(&path, &config) {
                    coalescer.on_qualifying_change(path);
                } else {
                    debug!(path = %path.display(), "change does not qualify for reload");
                }
            }
        });

        let mut running = self.running.lock();
        if running.closed {
            drop(running);
            pump.abort();
            return Err(Error::Closed);
        }
        if let Some(previous) = running.pump.replace(pump) {
            previous.abort();
        }
        running.watcher = Some(watcher);

        info!(paths = ?roots, "Watching for changes");
        Ok(())
    }

    /// Broadcast a reload for `path` now, bypassing the filter and the delay.
    pub fn refresh(&self, path: impl AsRef<Path>) -> BroadcastReport {
        self.notifier.notify(path.as_ref())
    }

    /// Show `message` in every connected browser.
    pub fn alert(&self, message: impl Into<String>) -> BroadcastReport {
        let message = message.into();
        info!(message = %message, "Alert");
        let report = self.hub.broadcast(&ServerMessage::alert(message.clone()));
        let _ = self.events.send(ServerEvent::Alerted {
            message,
            recipients: report.delivered,
        });
        report
    }

    /// Stop the watcher, cancel pending reloads, stop the listener and
    /// detach every session.
    ///
    /// Safe to call at any point, including before `listen` or `watch`, and
    /// more than once. A closed server stays closed: later `listen` and
    /// `watch` calls fail with [`Error::Closed`] and new connections on
    /// [`router`](Self::router) are turned away.
    pub fn close(&self) {
        let (listener, watcher, pump) = {
            let mut running = self.running.lock();
            running.closed = true;
            (
                running.listener.take(),
                running.watcher.take(),
                running.pump.take(),
            )
        };

        drop(watcher);
        if let Some(pump) = pump {
            pump.abort();
        }

        self.coalescer.close();

        if let Some(listener) = listener {
            listener.stop();
        }

        let detached = self.hub.close();
        if detached > 0 {
            debug!(sessions = detached, "detached sessions");
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run a listener future, reporting failures as [`ServerEvent::Error`].
fn spawn_listener<F>(serve: F, events: broadcast::Sender<ServerEvent>) -> JoinHandle<io::Result<()>>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = serve.await;
        if let Err(e) = &result {
            error!(error = %e, "LiveReload listener failed");
            let _ = events.send(ServerEvent::Error {
                message: e.to_string(),
            });
        }
        result
    })
}

async fn handle_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

/// Drive one browser connection until it closes or the server detaches it.
async fn run_session(mut socket: WebSocket, state: AppState) {
    let id = state.hub.next_session_id();
    let mut session = Session::new(id, state.config.version.clone());
    let (sink, mut outbound) = outbound_channel();
    if !state.hub.register(id, sink) {
        debug!(session = %id, "server closed, turning browser away");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    info!(session = %id, "Browser connected");
    let _ = state.events.send(ServerEvent::ClientConnected { id });

    loop {
        tokio::select! {
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = session.handle_text(text.as_str()) {
                        send_reply(&mut socket, id, &reply).await;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        if let Some(reply) = session.handle_text(text) {
                            send_reply(&mut socket, id, &reply).await;
                        }
                    }
                    Err(_) => warn!(session = %id, "dropping non-UTF-8 client message"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    debug!(session = %id, "client closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session = %id, error = %e, "error in client socket");
                    break;
                }
            },
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = socket.send(Message::Text(frame.to_string().into())).await {
                        warn!(session = %id, error = %e, "failed to deliver message");
                    }
                }
                None => {
                    debug!(session = %id, "session detached by server");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }

    session.close();
    state.hub.unregister(id);
    info!(session = %id, "Browser disconnected");
    let _ = state.events.send(ServerEvent::ClientDisconnected { id });
}

async fn send_reply(socket: &mut WebSocket, id: SessionId, reply: &ServerMessage) {
    let json = match reply.to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(session = %id, error = %e, "failed to serialize reply");
            return;
        }
    };
    if let Err(e) = socket.send(Message::Text(json.into())).await {
        warn!(session = %id, error = %e, "failed to send reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn server(options: Options) -> Server {
        Server::from_options(options).unwrap()
    }

    #[test]
    fn test_close_without_watch_or_listen() {
        let server = server(Options::default());
        server.close();
        server.close();
        assert_eq!(server.client_count(), 0);
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let result = Server::from_options(Options {
            exclusions: vec!["(".to_string()],
            ..Options::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_router_serves_client_script() {
        let app = server(Options::default()).router();
        let req = Request::builder()
            .uri("/livereload.js?snipver=1")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/javascript"
        );
    }

    #[tokio::test]
    async fn test_router_leaves_other_paths_alone() {
        let app = server(Options::default()).router();
        let req = Request::builder()
            .uri("/index.html")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_alert_without_clients() {
        let server = server(Options::default());
        let mut events = server.subscribe();

        let report = server.alert("hello");
        assert_eq!(report.attempted, 0);
        assert_eq!(
            events.recv().await.unwrap(),
            ServerEvent::Alerted {
                message: "hello".to_string(),
                recipients: 0
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_emits_event() {
        let server = server(Options::default());
        let mut events = server.subscribe();

        server.refresh("/p/style.css");
        assert_eq!(
            events.recv().await.unwrap(),
            ServerEvent::Reloaded {
                path: PathBuf::from("/p/style.css"),
                recipients: 0
            }
        );
    }

    #[tokio::test]
    async fn test_watch_missing_path() {
        let server = server(Options::default());
        let result = server.watch(["/definitely/not/here"]);
        assert!(matches!(result, Err(Error::PathNotFound(_))));
        server.close();
    }

    #[tokio::test]
    async fn test_watch_then_close() {
        let temp = tempfile::TempDir::new().unwrap();
        let server = server(Options::default());
        server.watch([temp.path()]).unwrap();
        server.close();
    }

    #[tokio::test]
    async fn test_closed_server_refuses_watch_and_listen() {
        let temp = tempfile::TempDir::new().unwrap();
        let server = server(Options {
            host: Some("127.0.0.1".to_string()),
            port: Some(0),
            ..Options::default()
        });
        server.close();

        assert!(matches!(server.watch([temp.path()]), Err(Error::Closed)));
        assert!(matches!(server.listen().await, Err(Error::Closed)));
        assert!(server.running.lock().watcher.is_none());
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_listen_binds_once() {
        let server = server(Options {
            host: Some("127.0.0.1".to_string()),
            port: Some(0),
            ..Options::default()
        });

        let (first, second) = tokio::join!(server.listen(), server.listen());
        let bound = match (first, second) {
            (Ok(addr), Err(Error::AlreadyListening)) | (Err(Error::AlreadyListening), Ok(addr)) => {
                addr
            }
            other => panic!("expected exactly one listener, got {other:?}"),
        };
        assert_eq!(server.local_addr(), Some(bound));
        assert!(!server.running.lock().binding);
        server.close();
    }

    #[tokio::test]
    async fn test_failed_bind_releases_slot() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let server = server(Options {
            host: Some("127.0.0.1".to_string()),
            port: Some(taken.local_addr().unwrap().port()),
            ..Options::default()
        });

        assert!(matches!(server.listen().await, Err(Error::Bind { .. })));
        assert!(!server.running.lock().binding);
        // Still a bind error, not AlreadyListening
        assert!(matches!(server.listen().await, Err(Error::Bind { .. })));
    }
}
