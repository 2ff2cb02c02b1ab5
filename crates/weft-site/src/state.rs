//! Per-build mutable node data.
//!
//! The content tree is immutable; everything a build computes about a node
//! lives here, indexed by the same [`NodeId`].

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use weft_renderer::Frame;
use weft_storage::{ContentTree, NodeId};

use crate::resolver::LinkEdge;

/// Dates of a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageDates {
    /// First commit containing the file.
    pub created: Option<DateTime<Utc>>,
    /// Last commit changing the file, else the storage mtime.
    pub last_modified: Option<DateTime<Utc>>,
    /// Date from the filename prefix, else the creation date.
    pub idea_date: Option<NaiveDate>,
}

/// Children of a directory in the order its configuration asks for.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChildOrder {
    pub subdirs: Vec<NodeId>,
    pub files: Vec<NodeId>,
}

/// Build data of one node.
#[derive(Debug, Default, Clone)]
pub struct NodeState {
    /// Whether the node is emitted.
    pub publish: bool,
    /// References recorded while rendering, in order.
    pub links: Vec<LinkEdge>,
    /// Environment captured after rendering.
    pub env: Option<Frame>,
    /// Rendered page output.
    pub output: Option<String>,
    /// Front matter of markup pages.
    pub metadata: Map<String, Value>,
    /// Page title, or directory title.
    pub title: Option<String>,
    /// Warnings emitted by templates.
    pub warnings: Vec<String>,
    /// Files only: dates, computed on first use.
    pub dates: Option<PageDates>,
    /// Directories only: inside a version-control working copy.
    pub in_vcs: bool,
    /// Directories only: sorted children, set when the directory is entered.
    pub order: Option<ChildOrder>,
    /// Template view, kept once the node is finished and cleared when a
    /// descendant is rendered again.
    pub view: Option<Value>,
}

/// Build data for every node of a tree.
#[derive(Debug, Default, Clone)]
pub struct BuildState {
    nodes: Vec<NodeState>,
}

impl BuildState {
    /// Fresh state for a tree of `len` nodes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            nodes: vec![NodeState::default(); len],
        }
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeState {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeState {
        &mut self.nodes[id.index()]
    }

    /// Publish `id` and every strict ancestor.
    pub fn mark_public(&mut self, tree: &ContentTree, id: NodeId) {
        self.nodes[id.index()].publish = true;
        for ancestor in tree.ancestors(id) {
            self.nodes[ancestor.index()].publish = true;
        }
    }

    /// Drop the cached views of every strict ancestor of `id`.
    pub fn invalidate_views(&mut self, tree: &ContentTree, id: NodeId) {
        for ancestor in tree.ancestors(id) {
            self.nodes[ancestor.index()].view = None;
        }
    }

    #[must_use]
    pub fn is_public(&self, id: NodeId) -> bool {
        self.nodes[id.index()].publish
    }

    /// Handles of all published nodes in arena order.
    #[must_use]
    pub fn published(&self, tree: &ContentTree) -> Vec<NodeId> {
        tree.iter()
            .map(|(id, _)| id)
            .filter(|&id| self.is_public(id))
            .collect()
    }

    /// Total warnings across all nodes.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.nodes.iter().map(|n| n.warnings.len()).sum()
    }
}
