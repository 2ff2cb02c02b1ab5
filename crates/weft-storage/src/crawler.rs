//! Content tree discovery by filesystem walking.
//!
//! The crawler lists one directory at a time, sorts entries by name, skips
//! ignored entries and classifies every remaining file:
//!
//! - `<name>.<markup_extension>` is a markup page
//! - `<base>.<marker>.<ext>` is a scripted page written as `<base>.<ext>`
//! - anything else is a static asset

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::StorageError;
use crate::ignore::IgnoreRule;
use crate::tree::{ContentTree, DirectoryNode, FileKind, FileNode, NodeId, NodeKind};

/// Extension accepted for index pages in addition to the markup extension.
const HTML_EXTENSION: &str = "html";

/// Crawl failures.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// Listing or inspecting an entry failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// More than one page in a directory qualifies as its index page.
    #[error("Multiple index pages in {}: {}", dir.display(), candidates.join(", "))]
    MultipleIndexPages {
        /// Directory holding the candidates.
        dir: PathBuf,
        /// File names of every candidate.
        candidates: Vec<String>,
    },
}

/// File naming conventions used for classification.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Extension (without dot) of markup pages.
    pub markup_extension: String,
    /// Marker segment of scripted pages.
    pub scripted_marker: String,
    /// Real name of index pages.
    pub index_name: String,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            markup_extension: "md".to_owned(),
            scripted_marker: "tpl".to_owned(),
            index_name: "index".to_owned(),
        }
    }
}

impl CrawlOptions {
    /// True if `name` would be classified as a markup page.
    #[must_use]
    pub fn is_markup(&self, name: &str) -> bool {
        split_extension(name).1 == self.markup_extension
    }
}

/// Builds a [`ContentTree`] from a directory.
pub struct Crawler<'a> {
    root: PathBuf,
    options: &'a CrawlOptions,
    ignore: &'a dyn IgnoreRule,
}

impl<'a> Crawler<'a> {
    /// Create a crawler for the tree rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, options: &'a CrawlOptions, ignore: &'a dyn IgnoreRule) -> Self {
        Self {
            root: root.into(),
            options,
            ignore,
        }
    }

    /// Walk the tree and classify every entry.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Storage`] for any I/O failure and
    /// [`CrawlError::MultipleIndexPages`] for ambiguous index pages.
    pub fn crawl(&self) -> Result<ContentTree, CrawlError> {
        if !self.root.is_dir() {
            return Err(StorageError::not_found(&self.root).into());
        }
        let mut tree = ContentTree::with_root(self.root.clone());
        let root = tree.root();
        let mut visited = HashSet::new();
        visited.insert(canonical(&self.root)?);
        self.crawl_directory(&mut tree, &mut visited, root, &self.root, "/")?;
        tracing::debug!(nodes = tree.len(), root = %self.root.display(), "Crawled content tree");
        Ok(tree)
    }

    fn crawl_directory(
        &self,
        tree: &mut ContentTree,
        visited: &mut HashSet<PathBuf>,
        dir_id: NodeId,
        dir_path: &Path,
        dir_link_name: &str,
    ) -> Result<(), CrawlError> {
        let mut entries: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir_path).map_err(|e| StorageError::io(e, dir_path))? {
            let entry = entry.map_err(|e| StorageError::io(e, dir_path))?;
            match entry.file_name().into_string() {
                Ok(name) => entries.push((name, entry.path())),
                Err(raw) => {
                    tracing::warn!(name = ?raw, dir = %dir_path.display(), "Skipping non UTF-8 entry");
                }
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut index_candidates: Vec<(NodeId, String)> = Vec::new();

        for (name, path) in entries {
            // Follows symlinks so linked directories are descended into.
            let metadata = fs::metadata(&path).map_err(|e| StorageError::io(e, &path))?;
            let is_dir = metadata.is_dir();
            if self.ignore.should_ignore(&name, dir_path, is_dir) {
                tracing::debug!(path = %path.display(), "Ignored");
                continue;
            }

            if is_dir {
                // A symlinked directory already walked would repeat forever.
                if !visited.insert(canonical(&path)?) {
                    tracing::warn!(path = %path.display(), "Skipping directory already crawled");
                    continue;
                }
                let child = tree.push(
                    dir_id,
                    name.clone(),
                    NodeKind::Directory(DirectoryNode::default()),
                );
                self.crawl_directory(tree, visited, child, &path, &name)?;
            } else {
                let file = classify(&name, dir_link_name, self.options);
                let is_index = file.is_index;
                let id = tree.push(dir_id, name.clone(), NodeKind::File(file));
                if is_index {
                    index_candidates.push((id, name));
                }
            }
        }

        match index_candidates.as_slice() {
            [] => {}
            [(id, _)] => tree.set_index(dir_id, *id),
            _ => {
                return Err(CrawlError::MultipleIndexPages {
                    dir: dir_path.to_path_buf(),
                    candidates: index_candidates.into_iter().map(|(_, n)| n).collect(),
                });
            }
        }
        Ok(())
    }
}

fn canonical(path: &Path) -> Result<PathBuf, StorageError> {
    fs::canonicalize(path).map_err(|e| StorageError::io(e, path))
}

/// Split a file name at its last dot: `("guide", "md")`.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, ext),
        _ => (name, ""),
    }
}

/// Strip a `YYYY-MM-DD-` prefix, returning the date when it is a real day.
fn split_date_prefix(base: &str) -> (Option<NaiveDate>, &str) {
    let (Some(prefix), Some(rest)) = (base.get(..10), base.get(10..)) else {
        return (None, base);
    };
    let Some(rest) = rest.strip_prefix('-').filter(|r| !r.is_empty()) else {
        return (None, base);
    };
    match NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
        Ok(date) => (Some(date), rest),
        Err(_) => (None, base),
    }
}

/// Classify a file by its name.
///
/// `dir_link_name` is the containing directory's link name, which an index
/// page takes as its own.
#[must_use]
pub fn classify(name: &str, dir_link_name: &str, options: &CrawlOptions) -> FileNode {
    let (base_name, extension) = split_extension(name);
    let base_name = base_name.to_owned();
    let extension = extension.to_owned();

    if extension == options.markup_extension {
        let (idea_date, real_name) = split_date_prefix(&base_name);
        let real_name = real_name.to_owned();
        let is_index = real_name == options.index_name;
        let (link_name, pre_slug_name) = if is_index {
            (dir_link_name.to_owned(), None)
        } else {
            let slugged = slug::slugify(&real_name);
            if slugged.is_empty() {
                (real_name.clone(), None)
            } else if slugged == real_name {
                (slugged, None)
            } else {
                (slugged, Some(real_name.clone()))
            }
        };
        return FileNode {
            base_name,
            extension,
            real_name,
            link_name,
            is_index,
            kind: FileKind::Markup {
                idea_date,
                pre_slug_name,
            },
        };
    }

    let marker = format!(".{}.", options.scripted_marker);
    if let Some(pos) = name.find(&marker)
        && pos > 0
        && !extension.is_empty()
        && name[pos + marker.len() - 1..] == format!(".{extension}")
    {
        let real_name = name[..pos].to_owned();
        let is_index = real_name == options.index_name
            && (extension == options.markup_extension || extension == HTML_EXTENSION);
        let link_name = if is_index {
            dir_link_name.to_owned()
        } else {
            real_name.clone()
        };
        let output_name = format!("{real_name}.{extension}");
        return FileNode {
            base_name,
            extension,
            real_name,
            link_name,
            is_index,
            kind: FileKind::Scripted { output_name },
        };
    }

    FileNode {
        real_name: base_name.clone(),
        base_name,
        extension,
        link_name: name.to_owned(),
        is_index: false,
        kind: FileKind::StaticAsset,
    }
}
