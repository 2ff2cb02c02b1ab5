//! Relative link computation.
//!
//! Published pages follow the pretty-URL convention: a non-index markup page
//! `docs/guide.md` is served from `docs/guide/index.html`, so links written
//! inside it need one extra `..` to climb out of its own directory.

use weft_storage::{ContentTree, FileKind, NodeId};

use crate::error::LinkError;
use crate::registry::NameRegistry;

/// A reference from one node to another, recorded while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkEdge {
    pub source: NodeId,
    pub destination: NodeId,
}

/// True if `id` is served from its own pretty-URL directory.
fn is_pretty_page(tree: &ContentTree, id: NodeId) -> bool {
    tree.file(id)
        .is_some_and(|f| !f.is_index && matches!(f.kind, FileKind::Markup { .. }))
}

/// Join `..` segments, the destination's remaining directories and its URL name.
fn join_relative(source: &[&str], destination: &[&str], url_name: &str, extra_up: bool) -> String {
    let common = source
        .iter()
        .zip(destination)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    if extra_up {
        parts.push("..");
    }
    parts.extend(std::iter::repeat_n("..", source.len() - common));
    parts.extend(&destination[common..]);
    parts.push(url_name);

    let joined = parts.join("/");
    if joined.is_empty() {
        "./".to_owned()
    } else {
        joined
    }
}

/// Relative path from `source` to `destination`.
///
/// With `path_only` the path is relative to the source's containing
/// directory; otherwise it is relative to the source's published URL.
#[must_use]
pub fn relative_path(tree: &ContentTree, source: NodeId, destination: NodeId, path_only: bool) -> String {
    let destination = tree
        .directory(destination)
        .and_then(|d| d.index)
        .unwrap_or(destination);
    let extra_up = !path_only && is_pretty_page(tree, source);
    join_relative(
        &tree.dir_segments(source),
        &tree.dir_segments(destination),
        tree.url_name(destination),
        extra_up,
    )
}

/// Resolves link names against a registry.
pub struct LinkResolver<'a> {
    tree: &'a ContentTree,
    registry: &'a NameRegistry,
}

impl<'a> LinkResolver<'a> {
    #[must_use]
    pub fn new(tree: &'a ContentTree, registry: &'a NameRegistry) -> Self {
        Self { tree, registry }
    }

    /// Resolve `name` as seen from `source`.
    ///
    /// Unless `path_only` is set, a [`LinkEdge`] is appended to `edges`.
    pub fn resolve(
        &self,
        source: NodeId,
        name: &str,
        path_only: bool,
        edges: &mut Vec<LinkEdge>,
    ) -> Result<String, LinkError> {
        let destination = self.registry.lookup(name)?;
        let path = relative_path(self.tree, source, destination, path_only);
        if !path_only {
            tracing::debug!(
                from = %self.tree.node(source).rel_path.display(),
                to = %self.tree.node(destination).rel_path.display(),
                "Link"
            );
            edges.push(LinkEdge {
                source,
                destination,
            });
        }
        Ok(path)
    }
}
