//! Version-control history for content files.
//!
//! [`HistoryProvider`] answers two questions for the site engine:
//! when a file first appeared and when it last changed, and whether a
//! directory lies inside a working copy. [`GitHistory`] reads a git
//! repository with gix; [`NoHistory`] is used outside any repository.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

/// First and latest commit times touching a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHistory {
    /// Time of the oldest commit containing the file.
    pub first_seen: DateTime<Utc>,
    /// Time of the newest commit changing the file.
    pub last_modified: DateTime<Utc>,
}

/// Errors opening or reading a repository.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// No repository contains the directory.
    #[error("Not a git repository: {}", .0.display())]
    NotARepository(PathBuf),
    /// The repository has no working tree.
    #[error("Bare repository at {}", .0.display())]
    Bare(PathBuf),
    /// Reading repository objects failed.
    #[error("Git error: {0}")]
    Git(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn git_err(e: impl std::error::Error + Send + Sync + 'static) -> VcsError {
    VcsError::Git(Box::new(e))
}

/// Source of per-file history.
pub trait HistoryProvider: Send + Sync {
    /// History of the file at absolute `path`, if it has been committed.
    fn history(&self, path: &Path) -> Option<FileHistory>;

    /// True if `dir` lies inside a version-control working copy.
    fn is_work_tree(&self, dir: &Path) -> bool;

    /// Drop cached answers, e.g. after new commits in watch mode.
    fn invalidate(&self) {}
}

/// Provider for content outside any repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistoryProvider for NoHistory {
    fn history(&self, _path: &Path) -> Option<FileHistory> {
        None
    }

    fn is_work_tree(&self, _dir: &Path) -> bool {
        false
    }
}

/// Commit id and commit time, newest first.
type CommitLog = Vec<(gix::ObjectId, i64)>;

/// History read from a git repository.
pub struct GitHistory {
    repo: gix::ThreadSafeRepository,
    workdir: PathBuf,
    commits: Mutex<Option<CommitLog>>,
    cache: Mutex<HashMap<PathBuf, Option<FileHistory>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GitHistory {
    /// Open the repository containing `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::NotARepository`] if no repository is found and
    /// [`VcsError::Bare`] for repositories without a working tree.
    pub fn discover(dir: &Path) -> Result<Self, VcsError> {
        let repo = gix::discover(dir).map_err(|_| VcsError::NotARepository(dir.to_path_buf()))?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| VcsError::Bare(repo.path().to_path_buf()))?;
        let workdir = workdir.canonicalize().unwrap_or(workdir);
        tracing::debug!(workdir = %workdir.display(), "Opened git repository");

        Ok(Self {
            repo: repo.into_sync(),
            workdir,
            commits: Mutex::new(None),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Working tree root.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Walk the history reachable from HEAD once.
    fn commit_log(&self) -> Result<CommitLog, VcsError> {
        if let Some(log) = lock(&self.commits).as_ref() {
            return Ok(log.clone());
        }

        let repo = self.repo.to_thread_local();
        let head = repo.head().map_err(git_err)?;
        let log = if head.is_unborn() {
            Vec::new()
        } else {
            let head_commit = repo.head_commit().map_err(git_err)?;
            let walk = head_commit.ancestors().all().map_err(git_err)?;
            let mut log = Vec::new();
            for info in walk {
                let info = info.map_err(git_err)?;
                let commit = info.object().map_err(git_err)?;
                let time = commit.time().map_err(git_err)?;
                log.push((commit.id, time.seconds));
            }
            log
        };

        *lock(&self.commits) = Some(log.clone());
        Ok(log)
    }

    /// Blob id of `rel_path` in each commit of `log`.
    fn blob_ids(&self, log: &CommitLog, rel_path: &Path) -> Result<Vec<Option<gix::ObjectId>>, VcsError> {
        let repo = self.repo.to_thread_local();
        let mut ids = Vec::with_capacity(log.len());
        for (id, _) in log {
            let commit = repo.find_commit(*id).map_err(git_err)?;
            let tree = commit.tree().map_err(git_err)?;
            let entry = tree.lookup_entry_by_path(rel_path).map_err(git_err)?;
            ids.push(entry.map(|e| e.object_id()));
        }
        Ok(ids)
    }

    fn compute(&self, path: &Path) -> Result<Option<FileHistory>, VcsError> {
        let Ok(rel_path) = path.strip_prefix(&self.workdir) else {
            return Ok(None);
        };
        let log = self.commit_log()?;
        let ids = self.blob_ids(&log, rel_path)?;

        // Newest commit whose blob differs from the next older commit's.
        let last = (0..ids.len()).find(|&i| ids[i].is_some() && ids.get(i + 1).copied().flatten() != ids[i]);
        let first = ids.iter().rposition(Option::is_some);

        let (Some(last), Some(first)) = (last, first) else {
            return Ok(None);
        };
        let time = |i: usize| DateTime::from_timestamp(log[i].1, 0);
        Ok(time(first)
            .zip(time(last))
            .map(|(first_seen, last_modified)| FileHistory {
                first_seen,
                last_modified,
            }))
    }
}

impl HistoryProvider for GitHistory {
    fn history(&self, path: &Path) -> Option<FileHistory> {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(cached) = lock(&self.cache).get(&path) {
            return *cached;
        }

        let history = match self.compute(&path) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read git history");
                None
            }
        };
        lock(&self.cache).insert(path, history);
        history
    }

    fn is_work_tree(&self, dir: &Path) -> bool {
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        dir.starts_with(&self.workdir)
    }

    fn invalidate(&self) {
        lock(&self.commits).take();
        lock(&self.cache).clear();
    }
}

/// Pick the provider for a content root.
///
/// Falls back to [`NoHistory`] when the root is not inside a repository.
#[must_use]
pub fn discover(root: &Path) -> Box<dyn HistoryProvider> {
    match GitHistory::discover(root) {
        Ok(git) => Box::new(git),
        Err(e) => {
            tracing::debug!(root = %root.display(), error = %e, "No version control history");
            Box::new(NoHistory)
        }
    }
}
