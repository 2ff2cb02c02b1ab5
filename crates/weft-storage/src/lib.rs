//! Content storage for weft.
//!
//! Crawls a content directory into an immutable arena tree and watches it
//! for changes:
//!
//! - [`Crawler`] walks the filesystem and classifies every file
//! - [`ContentTree`] stores nodes addressed by [`NodeId`]
//! - [`ContentWatcher`] delivers debounced [`ChangeEvent`] batches

mod crawler;
mod debouncer;
mod error;
mod event;
mod ignore;
mod tree;
mod watcher;

pub use crawler::{CrawlError, CrawlOptions, Crawler, classify};
pub use error::{StorageError, StorageErrorKind};
pub use event::{ChangeEvent, ChangeKind, ChangeReceiver, WatchHandle};
pub use ignore::{IgnoreRule, StandardIgnore};
pub use tree::{ContentTree, DirectoryNode, FileKind, FileNode, Node, NodeId, NodeKind};
pub use watcher::ContentWatcher;
