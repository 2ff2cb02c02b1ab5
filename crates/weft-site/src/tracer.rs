//! Reachability trace.
//!
//! Publication starts from the root index page and every node already marked
//! public, then follows recorded link edges transitively. Publishing a node
//! publishes all of its ancestor directories.

use std::collections::{HashSet, VecDeque};

use weft_storage::{ContentTree, NodeId};

use crate::state::BuildState;

/// Propagate publish flags through the link graph.
///
/// Returns the number of published nodes.
pub fn trace(tree: &ContentTree, state: &mut BuildState) -> usize {
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    if let Some(index) = tree.directory(tree.root()).and_then(|d| d.index) {
        queue.push_back(index);
    }
    queue.extend(state.published(tree));

    let mut visited: HashSet<NodeId> = HashSet::new();
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        state.mark_public(tree, id);
        for edge in &state.node(id).links {
            if !visited.contains(&edge.destination) {
                queue.push_back(edge.destination);
            }
        }
    }

    let published = state.published(tree).len();
    tracing::debug!(published, "Traced reachable nodes");
    published
}
