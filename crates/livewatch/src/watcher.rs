//! File system watcher feeding change events to the server.
//!
//! Watches each root recursively. Paths matching an exclusion pattern are
//! dropped inside the watcher callback, so excluded changes never reach the
//! filter or the coalescer.

use crate::error::{Error, Result};
use crate::filter::ExclusionSet;
use notify::{Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How often the polling backend rescans.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Capacity of the change channel.
const CHANGE_CAPACITY: usize = 256;

/// File change event type. All three kinds are treated the same by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// File was created
    Created(PathBuf),
    /// File was modified or renamed
    Modified(PathBuf),
    /// File was removed
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Created(p) | FileChange::Modified(p) | FileChange::Removed(p) => p,
        }
    }

    /// Consume the change, returning its path.
    pub fn into_path(self) -> PathBuf {
        match self {
            FileChange::Created(p) | FileChange::Modified(p) | FileChange::Removed(p) => p,
        }
    }

    fn from_kind(kind: &EventKind, path: PathBuf) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FileChange::Created(path)),
            EventKind::Modify(_) => Some(FileChange::Modified(path)),
            EventKind::Remove(_) => Some(FileChange::Removed(path)),
            _ => None,
        }
    }
}

/// Recursive watcher over one or more roots.
///
/// Dropping the watcher stops event delivery and closes the change channel.
pub struct FileWatcher {
    _watcher: Box<dyn Watcher + Send>,
    roots: Vec<PathBuf>,
    polling: bool,
}

impl FileWatcher {
    /// Start watching `roots`.
    ///
    /// # Arguments
    ///
    /// * `roots` - Files or directories to watch recursively
    /// * `exclusions` - Paths matching any of these are never delivered
    /// * `use_polling` - Scan periodically instead of using native events
    ///
    /// # Errors
    ///
    /// Returns error if a root does not exist or the backend cannot watch it
    pub fn new(
        roots: Vec<PathBuf>,
        exclusions: ExclusionSet,
        use_polling: bool,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if let Some(missing) = roots.iter().find(|root| !root.exists()) {
            return Err(Error::PathNotFound(missing.clone()));
        }

        let (tx, rx) = mpsc::channel(CHANGE_CAPACITY);

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in event.paths {
                    if exclusions.is_excluded(&path) {
                        continue;
                    }
                    let Some(change) = FileChange::from_kind(&event.kind, path) else {
                        continue;
                    };
                    debug!(path = %change.path().display(), "saw change");
                    // The receiver is gone once the server shuts down
                    if tx.blocking_send(change).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "file watcher error"),
        };

        let mut watcher: Box<dyn Watcher + Send> = if use_polling {
            let config = notify::Config::default().with_poll_interval(POLL_INTERVAL);
            Box::new(PollWatcher::new(handler, config)?)
        } else {
            Box::new(RecommendedWatcher::new(handler, notify::Config::default())?)
        };

        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            debug!(root = %root.display(), polling = use_polling, "watching");
        }

        Ok((
            Self {
                _watcher: watcher,
                roots,
                polling: use_polling,
            },
            rx,
        ))
    }

    /// Roots being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Check whether the polling backend is in use.
    pub fn is_polling(&self) -> bool {
        self.polling
    }
}
