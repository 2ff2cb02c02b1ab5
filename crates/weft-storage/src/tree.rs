//! In-memory content tree.
//!
//! Nodes are stored in a flat `Vec<Node>` and addressed by [`NodeId`].
//! Parent links are indices, never shared ownership, so the tree is a plain
//! immutable value once the crawler has built it. This provides:
//! - O(1) node access by handle
//! - O(1) lookups by content-relative path via `path_index`
//! - O(d) ancestor walks where d is the node depth

use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;

/// Stable handle of a node inside a [`ContentTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A directory or file in the content tree.
#[derive(Debug)]
pub struct Node {
    /// Raw entry name (empty for the root).
    pub name: String,
    /// Containing directory, `None` only for the root.
    pub parent: Option<NodeId>,
    /// Path relative to the content root (empty for the root).
    pub rel_path: PathBuf,
    /// Absolute storage path.
    pub abs_path: PathBuf,
    /// Directory or file payload.
    pub kind: NodeKind,
}

/// Node payload.
#[derive(Debug)]
pub enum NodeKind {
    Directory(DirectoryNode),
    File(FileNode),
}

/// Directory payload.
#[derive(Debug, Default)]
pub struct DirectoryNode {
    /// Child directories in crawl order.
    pub subdirs: Vec<NodeId>,
    /// Child files in crawl order.
    pub files: Vec<NodeId>,
    /// The directory's index page, if any.
    pub index: Option<NodeId>,
}

/// File payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// File name without its final extension.
    pub base_name: String,
    /// Final extension without the dot (empty if none).
    pub extension: String,
    /// Display name: base name with date prefix or marker segment removed.
    pub real_name: String,
    /// Canonical name used to address the file from cross-references.
    pub link_name: String,
    /// True if this page represents its directory.
    pub is_index: bool,
    /// File variant.
    pub kind: FileKind,
}

/// File variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// Opaque passthrough.
    StaticAsset,
    /// Markdown page: template, compile, layout.
    Markup {
        /// Date taken from a `YYYY-MM-DD-` filename prefix.
        idea_date: Option<NaiveDate>,
        /// Display name before slugification, when it differs from the slug.
        pre_slug_name: Option<String>,
    },
    /// Template-only page written under its rectified name.
    Scripted {
        /// Output file name (`<base>.<ext>`).
        output_name: String,
    },
}

impl FileNode {
    /// True for markup and scripted pages.
    #[must_use]
    pub fn is_page(&self) -> bool {
        !matches!(self.kind, FileKind::StaticAsset)
    }

    /// True for markup pages.
    #[must_use]
    pub fn is_markup(&self) -> bool {
        matches!(self.kind, FileKind::Markup { .. })
    }

    /// Idea date parsed from the filename, if any.
    #[must_use]
    pub fn idea_date(&self) -> Option<NaiveDate> {
        match &self.kind {
            FileKind::Markup { idea_date, .. } => *idea_date,
            _ => None,
        }
    }
}

/// Arena-backed content tree.
#[derive(Debug)]
pub struct ContentTree {
    nodes: Vec<Node>,
    path_index: HashMap<PathBuf, NodeId>,
}

impl ContentTree {
    /// Create a tree holding only the root directory.
    pub(crate) fn with_root(abs_path: PathBuf) -> Self {
        let root = Node {
            name: String::new(),
            parent: None,
            rel_path: PathBuf::new(),
            abs_path,
            kind: NodeKind::Directory(DirectoryNode::default()),
        };
        let mut path_index = HashMap::new();
        path_index.insert(PathBuf::new(), NodeId(0));
        Self {
            nodes: vec![root],
            path_index,
        }
    }

    /// Append a node under `parent` and return its handle.
    pub(crate) fn push(&mut self, parent: NodeId, name: String, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent_node = &self.nodes[parent.0];
        let rel_path = parent_node.rel_path.join(&name);
        let abs_path = parent_node.abs_path.join(&name);
        let is_dir = matches!(kind, NodeKind::Directory(_));

        self.path_index.insert(rel_path.clone(), id);
        self.nodes.push(Node {
            name,
            parent: Some(parent),
            rel_path,
            abs_path,
            kind,
        });

        if let NodeKind::Directory(dir) = &mut self.nodes[parent.0].kind {
            if is_dir {
                dir.subdirs.push(id);
            } else {
                dir.files.push(id);
            }
        }
        id
    }

    /// Record the index page of a directory.
    pub(crate) fn set_index(&mut self, dir: NodeId, index: NodeId) {
        if let NodeKind::Directory(d) = &mut self.nodes[dir.0].kind {
            d.index = Some(index);
        }
    }

    /// Handle of the root directory.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Trees always contain the root, so they are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node by handle.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Iterate all nodes in arena order (parents before children).
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Directory payload, if `id` is a directory.
    #[must_use]
    pub fn directory(&self, id: NodeId) -> Option<&DirectoryNode> {
        match &self.nodes[id.0].kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File(_) => None,
        }
    }

    /// File payload, if `id` is a file.
    #[must_use]
    pub fn file(&self, id: NodeId) -> Option<&FileNode> {
        match &self.nodes[id.0].kind {
            NodeKind::File(file) => Some(file),
            NodeKind::Directory(_) => None,
        }
    }

    /// Parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Strict ancestors, closest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&p| self.parent(p))
    }

    /// Directory chain from the root down to (and including) `dir`.
    #[must_use]
    pub fn directory_chain(&self, dir: NodeId) -> Vec<NodeId> {
        let mut chain: Vec<NodeId> = self.ancestors(dir).collect();
        chain.reverse();
        chain.push(dir);
        chain
    }

    /// The directory containing a file, or the directory itself.
    #[must_use]
    pub fn containing_dir(&self, id: NodeId) -> NodeId {
        match self.nodes[id.0].kind {
            NodeKind::Directory(_) => id,
            NodeKind::File(_) => self.parent(id).unwrap_or(id),
        }
    }

    /// Path segments of the directory containing `id`.
    #[must_use]
    pub fn dir_segments(&self, id: NodeId) -> Vec<&str> {
        path_segments(&self.nodes[self.containing_dir(id).0].rel_path)
    }

    /// Find a node by its path relative to the content root.
    #[must_use]
    pub fn find_by_rel_path(&self, rel_path: &Path) -> Option<NodeId> {
        self.path_index.get(rel_path).copied()
    }

    /// Name a directory is addressed by (`/` for the root).
    #[must_use]
    pub fn dir_link_name(&self, dir: NodeId) -> &str {
        let name = self.nodes[dir.0].name.as_str();
        if name.is_empty() { "/" } else { name }
    }

    /// Last path segment of a file in the published site.
    ///
    /// Empty for index pages, the slug for markup pages, the rectified name
    /// for scripted pages and the literal file name for static assets.
    #[must_use]
    pub fn url_name(&self, id: NodeId) -> &str {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Directory(_) => &node.name,
            NodeKind::File(file) if file.is_index => "",
            NodeKind::File(file) => match &file.kind {
                FileKind::Markup { .. } => &file.link_name,
                FileKind::Scripted { output_name } => output_name,
                FileKind::StaticAsset => &node.name,
            },
        }
    }

    /// All nodes beneath `dir` in pre-order, excluding `dir` itself.
    #[must_use]
    pub fn descendants(&self, dir: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![dir];
        while let Some(current) = stack.pop() {
            if let Some(d) = self.directory(current) {
                out.extend(d.files.iter().copied());
                for &sub in d.subdirs.iter().rev() {
                    stack.push(sub);
                }
                if current != dir {
                    out.push(current);
                }
            }
        }
        out
    }

    /// Markup pages beneath `dir`, at any depth.
    #[must_use]
    pub fn markup_descendants(&self, dir: NodeId) -> Vec<NodeId> {
        let mut pages: Vec<NodeId> = self
            .descendants(dir)
            .into_iter()
            .filter(|&id| self.file(id).is_some_and(FileNode::is_markup))
            .collect();
        pages.sort_unstable();
        pages
    }

    /// Render an indented listing of the tree for diagnostics.
    #[must_use]
    pub fn display(&self) -> String {
        fn walk(tree: &ContentTree, dir: NodeId, depth: usize, out: &mut String) {
            let Some(d) = tree.directory(dir) else { return };
            let files: Vec<&str> = d.files.iter().map(|&f| tree.node(f).name.as_str()).collect();
            let _ = writeln!(
                out,
                "{}{} -> [{}]",
                "  ".repeat(depth),
                tree.dir_link_name(dir),
                files.join(", ")
            );
            for &sub in &d.subdirs {
                walk(tree, sub, depth + 1, out);
            }
        }

        let mut out = String::new();
        walk(self, self.root(), 0, &mut out);
        out
    }
}

/// Split a relative path into its normal segments.
fn path_segments(path: &Path) -> Vec<&str> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect()
}
