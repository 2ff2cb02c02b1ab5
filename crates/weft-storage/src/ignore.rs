//! Ignore rules applied while crawling and watching.

use std::path::{Path, PathBuf};

/// Decides whether a directory entry is excluded from the content tree.
pub trait IgnoreRule: Send + Sync {
    /// `name` is the entry name, `parent` the absolute path of its directory.
    fn should_ignore(&self, name: &str, parent: &Path, is_dir: bool) -> bool;
}

impl<F> IgnoreRule for F
where
    F: Fn(&str, &Path, bool) -> bool + Send + Sync,
{
    fn should_ignore(&self, name: &str, parent: &Path, is_dir: bool) -> bool {
        self(name, parent, is_dir)
    }
}

/// Default ignore rule.
///
/// Skips hidden entries, entries matching a glob pattern (relative to the
/// content root) and any explicitly excluded absolute path such as the output
/// directory when it lives inside the content tree.
#[derive(Debug, Clone)]
pub struct StandardIgnore {
    root: PathBuf,
    patterns: Vec<glob::Pattern>,
    excluded: Vec<PathBuf>,
}

impl StandardIgnore {
    /// Create a rule for the content tree at `root`.
    ///
    /// Invalid patterns are skipped; settings validation rejects them earlier.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "Skipping invalid ignore pattern");
                    None
                }
            })
            .collect();
        Self {
            root: root.into(),
            patterns,
            excluded: Vec::new(),
        }
    }

    /// Exclude an absolute path and everything beneath it.
    #[must_use]
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Check an absolute path component by component.
    ///
    /// Used to filter watch events: a path is ignored if it lies outside the
    /// root or any of its components would have been skipped by the crawler.
    #[must_use]
    pub fn is_ignored_path(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return true;
        };
        let mut parent = self.root.clone();
        for component in rel.components() {
            let name = component.as_os_str().to_string_lossy();
            let is_dir = parent.join(&*name).is_dir();
            if self.should_ignore(&name, &parent, is_dir) {
                return true;
            }
            parent.push(&*name);
        }
        false
    }
}

impl IgnoreRule for StandardIgnore {
    fn should_ignore(&self, name: &str, parent: &Path, _is_dir: bool) -> bool {
        if name.starts_with('.') {
            return true;
        }
        let path = parent.join(name);
        if self.excluded.iter().any(|ex| path.starts_with(ex)) {
            return true;
        }
        path.strip_prefix(&self.root)
            .is_ok_and(|rel| self.patterns.iter().any(|p| p.matches_path(rel)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_entries_ignored() {
        let rule = StandardIgnore::new("/content", &[]);
        assert!(rule.should_ignore(".git", Path::new("/content"), true));
        assert!(rule.should_ignore(".draft.md", Path::new("/content/docs"), false));
        assert!(!rule.should_ignore("guide.md", Path::new("/content/docs"), false));
    }

    #[test]
    fn test_patterns_match_relative_path() {
        let rule = StandardIgnore::new("/content", &["drafts".to_owned(), "*.tmp".to_owned()]);
        assert!(rule.should_ignore("drafts", Path::new("/content"), true));
        assert!(rule.should_ignore("scratch.tmp", Path::new("/content"), false));
        assert!(!rule.should_ignore("notes.md", Path::new("/content"), false));
    }

    #[test]
    fn test_excluded_path_and_descendants() {
        let rule = StandardIgnore::new("/content", &[]).exclude("/content/site");
        assert!(rule.should_ignore("site", Path::new("/content"), true));
        assert!(rule.should_ignore("index.html", Path::new("/content/site"), false));
    }

    #[test]
    fn test_is_ignored_path() {
        let rule = StandardIgnore::new("/content", &["drafts".to_owned()]);
        assert!(rule.is_ignored_path(Path::new("/elsewhere/a.md")));
        assert!(rule.is_ignored_path(Path::new("/content/drafts/a.md")));
        assert!(rule.is_ignored_path(Path::new("/content/docs/.swp")));
        assert!(!rule.is_ignored_path(Path::new("/content/docs/a.md")));
    }

    #[test]
    fn test_closure_rule() {
        let rule = |name: &str, _: &Path, is_dir: bool| is_dir && name == "vendor";
        assert!(rule.should_ignore("vendor", Path::new("/"), true));
        assert!(!rule.should_ignore("vendor", Path::new("/"), false));
    }
}
