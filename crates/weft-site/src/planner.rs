//! Incremental rebuild planning.
//!
//! A batch of change events is classified against the current tree:
//! markup edits re-render just those pages, configuration edits re-render
//! every markup page beneath the configuration's directory, and anything else
//! (new or removed files, assets, templates) needs a full build.

use std::path::Path;

use weft_storage::{ChangeEvent, ChangeKind, ContentTree, NodeId};

/// What a batch of changes requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildPlan {
    /// No relevant change.
    Nothing,
    /// Re-crawl and rebuild everything.
    Full,
    /// Re-render exactly these markup pages.
    Markup(Vec<NodeId>),
    /// Re-render every markup page beneath changed configuration files,
    /// plus any explicitly changed markup pages.
    ConfigAndDescendants(Vec<NodeId>),
}

impl RebuildPlan {
    /// Pages to re-render, if the plan is incremental.
    #[must_use]
    pub fn pages(&self) -> Option<&[NodeId]> {
        match self {
            Self::Markup(pages) | Self::ConfigAndDescendants(pages) => Some(pages),
            Self::Nothing | Self::Full => None,
        }
    }
}

/// Classify a change batch.
///
/// Paths outside `tree`'s root, and paths for which `is_ignored` holds, are
/// dropped before classification.
pub fn plan(
    tree: &ContentTree,
    changes: &[ChangeEvent],
    config_filename: &str,
    is_ignored: &dyn Fn(&Path) -> bool,
) -> RebuildPlan {
    let root = &tree.node(tree.root()).abs_path;
    let mut config_dirs: Vec<NodeId> = Vec::new();
    let mut markup: Vec<NodeId> = Vec::new();

    for change in changes {
        let Ok(rel) = change.path.strip_prefix(root) else {
            tracing::debug!(path = %change.path.display(), "Ignoring change outside content root");
            continue;
        };
        if is_ignored(&change.path) {
            continue;
        }
        if change.kind != ChangeKind::Modified {
            tracing::debug!(path = %rel.display(), kind = ?change.kind, "Structural change");
            return RebuildPlan::Full;
        }
        let Some(id) = tree.find_by_rel_path(rel) else {
            tracing::debug!(path = %rel.display(), "Change to unknown node");
            return RebuildPlan::Full;
        };
        match tree.file(id) {
            Some(_) if tree.node(id).name == config_filename => {
                config_dirs.push(tree.containing_dir(id));
            }
            Some(file) if file.is_markup() => markup.push(id),
            _ => return RebuildPlan::Full,
        }
    }

    if config_dirs.is_empty() && markup.is_empty() {
        return RebuildPlan::Nothing;
    }
    let has_config = !config_dirs.is_empty();
    for dir in config_dirs {
        markup.extend(tree.markup_descendants(dir));
    }
    markup.sort_unstable();
    markup.dedup();

    if has_config {
        RebuildPlan::ConfigAndDescendants(markup)
    } else {
        RebuildPlan::Markup(markup)
    }
}
