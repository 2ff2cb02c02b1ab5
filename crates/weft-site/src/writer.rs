//! Output emission.
//!
//! Only published nodes are written. Full builds go to a sibling temporary
//! directory that replaces the output directory once everything is written.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use weft_storage::{ContentTree, FileKind, NodeId, StorageError};

use crate::error::BuildError;
use crate::state::BuildState;

/// Output behaviour switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Replace an existing output directory.
    pub clear_output: bool,
    /// Copy static assets instead of symlinking them.
    pub copy_assets: bool,
}

/// Output path of a node, relative to the output directory.
#[must_use]
pub fn output_rel_path(tree: &ContentTree, id: NodeId) -> PathBuf {
    let node = tree.node(id);
    let Some(file) = tree.file(id) else {
        return node.rel_path.clone();
    };
    let dir = node.rel_path.parent().map(Path::to_path_buf).unwrap_or_default();
    match &file.kind {
        FileKind::Markup { .. } if file.is_index => dir.join("index.html"),
        FileKind::Markup { .. } => dir.join(&file.link_name).join("index.html"),
        FileKind::Scripted { output_name } => dir.join(output_name),
        FileKind::StaticAsset => dir.join(&node.name),
    }
}

/// Output paths of all published files, checked for conflicts.
///
/// A conflict is two files claiming the same path, or a file whose path is
/// needed as a directory by another output.
pub fn plan_outputs(tree: &ContentTree, state: &BuildState) -> Result<BTreeMap<PathBuf, NodeId>, BuildError> {
    let mut outputs: BTreeMap<PathBuf, NodeId> = BTreeMap::new();
    for id in state.published(tree) {
        if tree.file(id).is_none() {
            continue;
        }
        let path = output_rel_path(tree, id);
        if outputs.insert(path.clone(), id).is_some() {
            return Err(BuildError::OutputConflict { path });
        }
    }
    for path in outputs.keys() {
        if let Some(blocking) = path.ancestors().skip(1).find(|a| outputs.contains_key(*a)) {
            return Err(BuildError::OutputConflict {
                path: blocking.to_path_buf(),
            });
        }
    }
    Ok(outputs)
}

/// Writes published nodes below an output directory.
pub struct Writer<'a> {
    tree: &'a ContentTree,
    state: &'a BuildState,
    options: OutputOptions,
}

impl<'a> Writer<'a> {
    #[must_use]
    pub fn new(tree: &'a ContentTree, state: &'a BuildState, options: OutputOptions) -> Self {
        Self {
            tree,
            state,
            options,
        }
    }

    /// Write the whole published site to `output_dir`.
    ///
    /// Returns the number of files written.
    pub fn write_site(&self, output_dir: &Path) -> Result<usize, BuildError> {
        if output_dir.exists() && !self.options.clear_output {
            return Err(BuildError::OutputExists {
                path: output_dir.to_path_buf(),
            });
        }
        let outputs = plan_outputs(self.tree, self.state)?;

        let temp = temp_dir_for(output_dir)?;
        remove_path(&temp)?;
        fs::create_dir_all(&temp).map_err(|e| StorageError::io(e, &temp))?;

        let written = match self.write_all(&temp, &outputs) {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&temp) {
                    tracing::warn!(path = %temp.display(), error = %cleanup, "Failed to remove temporary output");
                }
                return Err(e);
            }
        };

        remove_path(output_dir)?;
        fs::rename(&temp, output_dir).map_err(|e| StorageError::io(e, output_dir))?;
        tracing::info!(path = %output_dir.display(), files = written, "Wrote site");
        Ok(written)
    }

    fn write_all(&self, root: &Path, outputs: &BTreeMap<PathBuf, NodeId>) -> Result<usize, BuildError> {
        for id in self.state.published(self.tree) {
            if self.tree.directory(id).is_some() {
                let dir = root.join(&self.tree.node(id).rel_path);
                fs::create_dir_all(&dir).map_err(|e| StorageError::io(e, &dir))?;
            }
        }
        let mut written = 0;
        for (rel, &id) in outputs {
            if self.write_file(&root.join(rel), id)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Rewrite a single node's artifact in an existing output directory.
    ///
    /// Returns `false` when the node is not published or has no output.
    pub fn write_node(&self, output_dir: &Path, id: NodeId) -> Result<bool, BuildError> {
        if !self.state.is_public(id) || self.tree.file(id).is_none() {
            return Ok(false);
        }
        let target = output_dir.join(output_rel_path(self.tree, id));
        remove_path(&target)?;
        self.write_file(&target, id)
    }

    /// Returns `false` for a page that was never rendered.
    fn write_file(&self, target: &Path, id: NodeId) -> Result<bool, BuildError> {
        let node = self.tree.node(id);
        let is_asset = matches!(self.tree.file(id).map(|f| &f.kind), Some(FileKind::StaticAsset));
        let output = self.state.node(id).output.as_deref();
        if !is_asset && output.is_none() {
            tracing::warn!(page = %node.rel_path.display(), "Published page was never rendered");
            return Ok(false);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(e, parent))?;
        }

        match output {
            Some(output) if !is_asset => {
                tracing::debug!(path = %target.display(), "Writing page");
                fs::write(target, output).map_err(|e| StorageError::io(e, target))?;
            }
            _ => self.emit_asset(&node.abs_path, target)?,
        }
        Ok(true)
    }

    fn emit_asset(&self, source: &Path, target: &Path) -> Result<(), BuildError> {
        if self.options.copy_assets {
            fs::copy(source, target).map_err(|e| StorageError::io(e, source))?;
            return Ok(());
        }
        let source = fs::canonicalize(source).map_err(|e| StorageError::io(e, source))?;
        symlink(&source, target).map_err(|e| StorageError::io(e, target))?;
        Ok(())
    }
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn symlink(source: &Path, target: &Path) -> io::Result<()> {
    fs::copy(source, target).map(|_| ())
}

/// `.<name>.tmp` next to the output directory.
fn temp_dir_for(output_dir: &Path) -> Result<PathBuf, BuildError> {
    let name = output_dir
        .file_name()
        .ok_or_else(|| StorageError::io(io::Error::from(io::ErrorKind::InvalidInput), output_dir))?;
    Ok(output_dir.with_file_name(format!(".{}.tmp", name.to_string_lossy())))
}

/// Remove a file, symlink or directory if present.
fn remove_path(path: &Path) -> Result<(), BuildError> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| StorageError::io(e, path))?;
    Ok(())
}
