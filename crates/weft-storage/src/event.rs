//! Change event types for watch mode.
//!
//! Events are delivered in batches: one batch per quiet window, each path
//! appearing at most once with its coalesced [`ChangeKind`].

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

/// Kind of content change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Entry was created.
    Created,
    /// Entry was modified.
    Modified,
    /// Entry was removed.
    Removed,
}

/// A single change to an absolute content path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path of the changed entry.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: ChangeKind,
}

/// Receiver for debounced change batches.
pub struct ChangeReceiver {
    rx: mpsc::Receiver<Vec<ChangeEvent>>,
}

impl ChangeReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<Vec<ChangeEvent>>) -> Self {
        Self { rx }
    }

    /// Wait for the next batch (blocking).
    ///
    /// Returns `None` when the watcher has shut down.
    #[must_use]
    pub fn recv(&self) -> Option<Vec<ChangeEvent>> {
        self.rx.recv().ok()
    }

    /// Wait up to `timeout` for the next batch.
    ///
    /// The watch loop uses this to check for Ctrl-C between waits.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<ChangeEvent>, mpsc::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Handle to stop watching for changes.
///
/// Dropping the handle stops the watcher and its drain thread.
pub struct WatchHandle {
    _shutdown: Option<mpsc::Sender<()>>,
}

impl WatchHandle {
    pub(crate) fn new(shutdown: mpsc::Sender<()>) -> Self {
        Self {
            _shutdown: Some(shutdown),
        }
    }

    /// Stop watching immediately (consumes the handle).
    pub fn stop(mut self) {
        self._shutdown.take();
    }
}
