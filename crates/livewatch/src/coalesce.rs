//! Per-path debouncing of qualifying changes.
//!
//! With no delay configured, every change fires straight away. With a delay,
//! each path owns at most one pending timer; a new change on the same path
//! aborts the old timer and starts a fresh one, so a burst of saves collapses
//! into a single notification timed from the last save.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

/// Receives the notifications the coalescer decides to fire.
pub trait ReloadSink: Send + Sync + 'static {
    /// Notify clients that `path` changed.
    fn reload(&self, path: &Path);
}

#[derive(Debug)]
struct Pending {
    generation: u64,
    timer: AbortHandle,
}

#[derive(Debug, Default)]
struct PendingMap {
    entries: HashMap<PathBuf, Pending>,
    next_generation: u64,
    closed: bool,
}

/// Debounces changes per path before handing them to a [`ReloadSink`].
pub struct Coalescer {
    delay: Option<Duration>,
    sink: Arc<dyn ReloadSink>,
    pending: Arc<Mutex<PendingMap>>,
}

impl Coalescer {
    /// Create a coalescer. `None` or a zero delay fires immediately.
    pub fn new(delay: Option<Duration>, sink: Arc<dyn ReloadSink>) -> Self {
        Self {
            delay: delay.filter(|d| !d.is_zero()),
            sink,
            pending: Arc::new(Mutex::new(PendingMap::default())),
        }
    }

    /// Record a change that passed the filter.
    ///
    /// Must be called from within a tokio runtime when a delay is configured.
    pub fn on_qualifying_change(&self, path: PathBuf) {
        let mut pending = self.pending.lock();
        if pending.closed {
            debug!(path = %path.display(), "coalescer closed, dropping change");
            return;
        }

        let Some(delay) = self.delay else {
            self.sink.reload(&path);
            return;
        };

        pending.next_generation += 1;
        let generation = pending.next_generation;

        let timer = tokio::spawn(fire_after(
            delay,
            path.clone(),
            generation,
            Arc::clone(&self.pending),
            Arc::clone(&self.sink),
        ))
        .abort_handle();

        if let Some(previous) = pending
            .entries
            .insert(path.clone(), Pending { generation, timer })
        {
            previous.timer.abort();
            debug!(path = %path.display(), "restarted pending reload timer");
        }
    }

    /// Abort every outstanding timer and refuse further changes.
    ///
    /// Nothing fires once this returns.
    pub fn close(&self) {
        let mut pending = self.pending.lock();
        pending.closed = true;
        for (path, entry) in pending.entries.drain() {
            entry.timer.abort();
            debug!(path = %path.display(), "cancelled pending reload");
        }
    }

    /// Number of paths waiting on a timer.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().entries.len()
    }

    /// Check whether `path` has a timer outstanding.
    pub fn is_pending(&self, path: &Path) -> bool {
        self.pending.lock().entries.contains_key(path)
    }

    /// Configured delay, if coalescing is enabled.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }
}

async fn fire_after(
    delay: Duration,
    path: PathBuf,
    generation: u64,
    pending: Arc<Mutex<PendingMap>>,
    sink: Arc<dyn ReloadSink>,
) {
    tokio::time::sleep(delay).await;

    // The sink runs under the lock so `close` cannot return between the
    // generation check and the notification.
    let mut pending = pending.lock();
    if pending.closed {
        return;
    }
    let current = pending.entries.get(&path).map(|entry| entry.generation);
    if current == Some(generation) {
        pending.entries.remove(&path);
        sink.reload(&path);
    }
}

impl Drop for Coalescer {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        fired: Mutex<Vec<PathBuf>>,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.fired.lock().len()
        }

        fn count_for(&self, path: &str) -> usize {
            self.fired
                .lock()
                .iter()
                .filter(|p| p.as_path() == Path::new(path))
                .count()
        }
    }

    impl ReloadSink for RecordingSink {
        fn reload(&self, path: &Path) {
            self.fired.lock().push(path.to_path_buf());
        }
    }

    fn coalescer(delay_ms: u64) -> (Coalescer, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let coalescer = Coalescer::new(Some(Duration::from_millis(delay_ms)), sink.clone());
        (coalescer, sink)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[test]
    fn test_no_delay_fires_synchronously() {
        let sink = Arc::new(RecordingSink::default());
        let coalescer = Coalescer::new(None, sink.clone());

        coalescer.on_qualifying_change(PathBuf::from("/p/index.html"));
        assert_eq!(sink.count(), 1);
        assert_eq!(coalescer.pending_count(), 0);
    }

    #[test]
    fn test_zero_delay_is_immediate() {
        let sink = Arc::new(RecordingSink::default());
        let coalescer = Coalescer::new(Some(Duration::ZERO), sink.clone());
        assert!(coalescer.delay().is_none());

        coalescer.on_qualifying_change(PathBuf::from("/p/a.css"));
        coalescer.on_qualifying_change(PathBuf::from("/p/a.css"));
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_change_fires_after_delay() {
        let (coalescer, sink) = coalescer(2000);

        coalescer.on_qualifying_change(PathBuf::from("/p/index.html"));
        assert!(coalescer.is_pending(Path::new("/p/index.html")));

        sleep_ms(1500).await;
        assert_eq!(sink.count(), 0);

        sleep_ms(1500).await;
        assert_eq!(sink.count(), 1);
        assert_eq!(coalescer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_and_resets_timer() {
        let (coalescer, sink) = coalescer(2000);

        coalescer.on_qualifying_change(PathBuf::from("/p/index.html"));
        sleep_ms(1000).await;
        coalescer.on_qualifying_change(PathBuf::from("/p/index.html"));
        assert_eq!(coalescer.pending_count(), 1);

        // The first timer would have fired at t=2000
        sleep_ms(1500).await;
        assert_eq!(sink.count(), 0);

        // The second one fires at t=3000
        sleep_ms(600).await;
        assert_eq!(sink.count(), 1);

        sleep_ms(5000).await;
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paths_do_not_interfere() {
        let (coalescer, sink) = coalescer(1000);

        coalescer.on_qualifying_change(PathBuf::from("/p/a.css"));
        sleep_ms(500).await;
        coalescer.on_qualifying_change(PathBuf::from("/p/b.css"));
        assert_eq!(coalescer.pending_count(), 2);

        sleep_ms(600).await;
        assert_eq!(sink.count_for("/p/a.css"), 1);
        assert_eq!(sink.count_for("/p/b.css"), 0);

        sleep_ms(500).await;
        assert_eq!(sink.count_for("/p/b.css"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_timers() {
        let (coalescer, sink) = coalescer(1000);

        coalescer.on_qualifying_change(PathBuf::from("/p/a.css"));
        coalescer.on_qualifying_change(PathBuf::from("/p/b.js"));
        coalescer.close();
        assert_eq!(coalescer.pending_count(), 0);

        sleep_ms(5000).await;
        assert_eq!(sink.count(), 0);

        // Changes after close are dropped
        coalescer.on_qualifying_change(PathBuf::from("/p/a.css"));
        sleep_ms(5000).await;
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_close_stops_immediate_mode() {
        let sink = Arc::new(RecordingSink::default());
        let coalescer = Coalescer::new(None, sink.clone());
        coalescer.close();
        coalescer.on_qualifying_change(PathBuf::from("/p/index.html"));
        assert_eq!(sink.count(), 0);
    }
}
