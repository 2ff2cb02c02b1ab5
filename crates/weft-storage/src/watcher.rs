//! Filesystem watcher producing debounced change batches.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};

use crate::debouncer::EventDebouncer;
use crate::error::{StorageError, StorageErrorKind};
use crate::event::{ChangeKind, ChangeReceiver, WatchHandle};
use crate::ignore::StandardIgnore;

/// Poll interval of the drain thread.
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

fn notify_error(e: notify::Error, path: &std::path::Path) -> StorageError {
    StorageError::new(StorageErrorKind::Watch)
        .with_path(path)
        .with_source(e)
}

/// Convert a `notify::EventKind` to a [`ChangeKind`].
///
/// Returns `None` for event kinds that are not relevant (e.g., Access).
fn change_kind(kind: notify::EventKind) -> Option<ChangeKind> {
    match kind {
        notify::EventKind::Create(_) => Some(ChangeKind::Created),
        notify::EventKind::Modify(_) => Some(ChangeKind::Modified),
        notify::EventKind::Remove(_) => Some(ChangeKind::Removed),
        _ => None,
    }
}

/// Watches a content tree recursively.
pub struct ContentWatcher {
    root: PathBuf,
    quiet_window: Duration,
    ignore: StandardIgnore,
}

impl ContentWatcher {
    /// Create a watcher for `root`. Events on ignored paths are dropped.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, quiet_window: Duration, ignore: StandardIgnore) -> Self {
        Self {
            root: root.into(),
            quiet_window,
            ignore,
        }
    }

    /// Start watching.
    ///
    /// Each batch delivered through the receiver holds every change recorded
    /// since the previous batch, released after the quiet window elapses.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageErrorKind::Watch`] error if the watcher cannot start.
    pub fn start(self) -> Result<(ChangeReceiver, WatchHandle), StorageError> {
        let (event_tx, event_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let debouncer = Arc::new(EventDebouncer::new(self.quiet_window));

        let watcher_debouncer = Arc::clone(&debouncer);
        let ignore = self.ignore;
        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Watch error");
                    return;
                }
            };
            let Some(kind) = change_kind(event.kind) else {
                return;
            };
            for path in event.paths {
                if !ignore.is_ignored_path(&path) {
                    watcher_debouncer.record(path, kind);
                }
            }
        })
        .map_err(|e| notify_error(e, &self.root))?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| notify_error(e, &self.root))?;
        tracing::info!(root = %self.root.display(), "Watching for changes");

        // The watcher is moved into the drain thread to keep it alive.
        std::thread::spawn(move || {
            let _watcher = watcher;
            loop {
                match shutdown_rx.recv_timeout(DRAIN_INTERVAL) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }

                let batch = debouncer.drain_if_quiet();
                if !batch.is_empty() && event_tx.send(batch).is_err() {
                    return;
                }
            }
        });

        Ok((ChangeReceiver::new(event_rx), WatchHandle::new(shutdown_tx)))
    }
}
