//! Fan-out of protocol messages to every connected session.
//!
//! The hub only holds outbound handles. The transport owns the sockets and
//! removes sessions when they close or fail; a failed send on its own never
//! evicts a session.

use crate::protocol::{ServerMessage, SessionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Outbound queue depth per session.
pub const OUTBOUND_CAPACITY: usize = 100;

/// Why a frame could not be queued for a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The session's queue is full
    #[error("outbound queue is full")]
    Full,
    /// The session's writer has gone away
    #[error("connection is closed")]
    Closed,
}

/// Outbound half of a session, as seen by the hub.
pub trait MessageSink: Send + Sync {
    /// Queue a serialized frame without blocking.
    fn send(&self, frame: Arc<str>) -> Result<(), SendError>;
}

impl MessageSink for mpsc::Sender<Arc<str>> {
    fn send(&self, frame: Arc<str>) -> Result<(), SendError> {
        self.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

/// Create the queue connecting the hub to a session's socket writer.
pub fn outbound_channel() -> (Arc<dyn MessageSink>, mpsc::Receiver<Arc<str>>) {
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    (Arc::new(tx), rx)
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions a send was attempted on
    pub attempted: usize,
    /// Sessions whose queue accepted the frame
    pub delivered: usize,
}

impl BroadcastReport {
    /// Sends that failed.
    pub fn failed(&self) -> usize {
        self.attempted - self.delivered
    }
}

/// Registry of live sessions.
#[derive(Default)]
pub struct Hub {
    sessions: RwLock<HashMap<SessionId, Arc<dyn MessageSink>>>,
    next_id: AtomicU64,
    // Only written and read under the `sessions` write lock
    closed: AtomicBool,
}

impl Hub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identifier for a new connection.
    pub fn next_session_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a session.
    ///
    /// Returns `false`, leaving the hub untouched, once the hub is closed.
    pub fn register(&self, id: SessionId, sink: Arc<dyn MessageSink>) -> bool {
        let mut sessions = self.sessions.write();
        if self.closed.load(Ordering::Relaxed) {
            debug!(session = %id, "hub closed, session refused");
            return false;
        }
        sessions.insert(id, sink);
        debug!(session = %id, "session registered");
        true
    }

    /// Remove a session. Removing an unknown session is a no-op.
    ///
    /// Returns `true` if the session was registered.
    pub fn unregister(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().remove(&id).is_some();
        if removed {
            debug!(session = %id, "session unregistered");
        }
        removed
    }

    /// Send `message` to every session registered right now.
    ///
    /// The session set is snapshotted first so no lock is held while sending.
    /// A failure on one session is logged and does not affect the others.
    pub fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        let frame: Arc<str> = match message.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(command = message.command(), error = %e, "failed to serialize message");
                return BroadcastReport::default();
            }
        };

        let snapshot: Vec<(SessionId, Arc<dyn MessageSink>)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        debug!(
            command = message.command(),
            recipients = snapshot.len(),
            "broadcasting to all clients"
        );

        let mut report = BroadcastReport::default();
        for (id, sink) in snapshot {
            report.attempted += 1;
            match sink.send(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(e) => warn!(session = %id, error = %e, "failed to send to client"),
            }
        }
        report
    }

    /// Drop every session, closing their outbound queues, and refuse any
    /// later registration.
    ///
    /// Returns how many sessions were removed.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut sessions = self.sessions.write();
            self.closed.store(true, Ordering::Relaxed);
            sessions.drain().collect()
        };
        drained.len()
    }

    /// Check if [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Check if no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Check whether `id` is registered.
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().contains_key(&id)
    }
}
