//! Event debouncing for watch mode.
//!
//! Coalesces raw filesystem events into one event per path and releases the
//! whole pending set only once no event has arrived for the quiet window, so
//! an editor save (or a `git checkout`) becomes a single rebuild.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::event::{ChangeEvent, ChangeKind};

#[derive(Default)]
struct Pending {
    events: HashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
}

/// Thread-safe event debouncer.
pub(crate) struct EventDebouncer {
    pending: Mutex<Pending>,
    quiet_window: Duration,
}

impl EventDebouncer {
    /// Create a debouncer releasing batches after `quiet_window` of silence.
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            quiet_window,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an event.
    ///
    /// Thread-safe, called from the notify callback. Restarts the quiet window.
    pub fn record(&self, path: PathBuf, kind: ChangeKind) {
        use std::collections::hash_map::Entry;

        let mut pending = self.lock();
        pending.last_event = Some(Instant::now());

        match pending.events.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(kind);
            }
            Entry::Occupied(mut entry) => {
                if let Some(coalesced) = Self::coalesce(*entry.get(), kind) {
                    *entry.get_mut() = coalesced;
                } else {
                    // Created + Removed: the entry never existed for us
                    entry.remove();
                }
            }
        }
    }

    /// Coalesce two event kinds.
    ///
    /// Returns `None` if both events should be discarded (Created + Removed).
    #[allow(clippy::match_same_arms)]
    fn coalesce(existing: ChangeKind, new: ChangeKind) -> Option<ChangeKind> {
        use ChangeKind::{Created, Modified, Removed};

        match (existing, new) {
            (Created, Created) => Some(Created),
            (Created, Modified) => Some(Created),
            (Created, Removed) => None,

            (Modified, Created) => Some(Created),
            (Modified, Modified) => Some(Modified),
            (Modified, Removed) => Some(Removed),

            (Removed, Created) => Some(Modified),
            (Removed, Modified) => Some(Removed),
            (Removed, Removed) => Some(Removed),
        }
    }

    /// Drain all pending events if the quiet window has elapsed.
    ///
    /// Returns an empty batch while events are still arriving. Events are
    /// sorted by path so batches are deterministic.
    pub fn drain_if_quiet(&self) -> Vec<ChangeEvent> {
        let mut pending = self.lock();
        let quiet = pending
            .last_event
            .is_some_and(|last| last.elapsed() >= self.quiet_window);
        if !quiet {
            return Vec::new();
        }

        pending.last_event = None;
        let mut batch: Vec<ChangeEvent> = pending
            .events
            .drain()
            .map(|(path, kind)| ChangeEvent { path, kind })
            .collect();
        batch.sort_by(|a, b| a.path.cmp(&b.path));
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn wait() {
        thread::sleep(Duration::from_millis(15));
    }

    #[test]
    fn test_nothing_released_before_quiet_window() {
        let debouncer = EventDebouncer::new(Duration::from_secs(60));
        debouncer.record(PathBuf::from("/c/a.md"), ChangeKind::Modified);
        assert!(debouncer.drain_if_quiet().is_empty());
    }

    #[test]
    fn test_single_event_released_after_quiet_window() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/c/guide.md");
        debouncer.record(path.clone(), ChangeKind::Modified);
        wait();

        let events = debouncer.drain_if_quiet();
        assert_eq!(
            events,
            vec![ChangeEvent {
                path,
                kind: ChangeKind::Modified
            }]
        );
        assert!(debouncer.drain_if_quiet().is_empty());
    }

    #[test]
    fn test_batch_contains_all_paths_sorted() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        debouncer.record(PathBuf::from("/c/b.md"), ChangeKind::Modified);
        debouncer.record(PathBuf::from("/c/a.md"), ChangeKind::Created);
        wait();

        let paths: Vec<_> = debouncer
            .drain_if_quiet()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec![PathBuf::from("/c/a.md"), PathBuf::from("/c/b.md")]);
    }

    #[test]
    fn test_repeated_modifications_coalesce() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/c/guide.md");
        for _ in 0..3 {
            debouncer.record(path.clone(), ChangeKind::Modified);
        }
        wait();
        assert_eq!(debouncer.drain_if_quiet().len(), 1);
    }

    #[test]
    fn test_created_then_removed_discards_both() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/c/tmp.md");
        debouncer.record(path.clone(), ChangeKind::Created);
        debouncer.record(path, ChangeKind::Removed);
        wait();
        assert!(debouncer.drain_if_quiet().is_empty());
    }

    #[test]
    fn test_coalesce_all_combinations() {
        use ChangeKind::{Created, Modified, Removed};

        assert_eq!(EventDebouncer::coalesce(Created, Created), Some(Created));
        assert_eq!(EventDebouncer::coalesce(Created, Modified), Some(Created));
        assert_eq!(EventDebouncer::coalesce(Created, Removed), None);

        assert_eq!(EventDebouncer::coalesce(Modified, Created), Some(Created));
        assert_eq!(EventDebouncer::coalesce(Modified, Modified), Some(Modified));
        assert_eq!(EventDebouncer::coalesce(Modified, Removed), Some(Removed));

        assert_eq!(EventDebouncer::coalesce(Removed, Created), Some(Modified));
        assert_eq!(EventDebouncer::coalesce(Removed, Modified), Some(Removed));
        assert_eq!(EventDebouncer::coalesce(Removed, Removed), Some(Removed));
    }
}
