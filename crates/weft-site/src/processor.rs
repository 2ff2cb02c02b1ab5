//! Content processing.
//!
//! Drives the depth-first traversal that threads the environment cascade
//! through the tree. Within a directory, subdirectories are processed first,
//! then non-index pages, then the index page, so the index page sees the
//! results of its whole subtree.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use weft_renderer::{MarkdownCompiler, Rendered, TemplateCallbacks, TemplateEngine};
use weft_storage::{ContentTree, FileKind, FileNode, NodeId, StorageError};
use weft_vcs::HistoryProvider;

use crate::dir_config::{self, BuilderContext};
use crate::error::{BuildError, ConfigurationError, LinkError};
use crate::frame::{Frame, dir_view, page_view};
use crate::registry::NameRegistry;
use crate::resolver::{LinkEdge, LinkResolver};
use crate::sort::{SortField, SortKey, SortSpec};
use crate::state::{BuildState, ChildOrder, PageDates};

/// External collaborators used while processing.
pub struct Services {
    pub compiler: Arc<dyn MarkdownCompiler>,
    pub engine: Arc<dyn TemplateEngine>,
    pub history: Arc<dyn HistoryProvider>,
}

/// Processing options.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Reserved directory configuration filename.
    pub config_filename: String,
    /// Enables the `!exec` builder.
    pub allow_exec: bool,
}

#[derive(Default)]
struct Recorded {
    edges: Vec<LinkEdge>,
    warnings: Vec<String>,
    link_error: Option<LinkError>,
}

/// Template callbacks bound to the page being rendered.
struct PageCallbacks {
    tree: Arc<ContentTree>,
    registry: Arc<NameRegistry>,
    source: NodeId,
    recorded: Mutex<Recorded>,
}

impl PageCallbacks {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, name: &str, path_only: bool) -> Result<String, String> {
        let resolver = LinkResolver::new(&self.tree, &self.registry);
        let mut recorded = self.lock();
        resolver
            .resolve(self.source, name, path_only, &mut recorded.edges)
            .map_err(|e| {
                let message = e.to_string();
                recorded.link_error.get_or_insert(e);
                message
            })
    }

    fn take_link_error(&self) -> Option<LinkError> {
        self.lock().link_error.take()
    }

    fn take(&self) -> (Vec<LinkEdge>, Vec<String>) {
        let mut recorded = self.lock();
        (
            std::mem::take(&mut recorded.edges),
            std::mem::take(&mut recorded.warnings),
        )
    }
}

impl TemplateCallbacks for PageCallbacks {
    fn link(&self, name: &str) -> Result<String, String> {
        self.resolve(name, false)
    }

    fn path(&self, name: &str) -> Result<String, String> {
        self.resolve(name, true)
    }

    fn warn(&self, message: &str) {
        self.lock().warnings.push(message.to_owned());
    }
}

/// Walks the tree, evaluating configuration and rendering pages into a
/// [`BuildState`].
pub struct Processor<'a> {
    tree: &'a Arc<ContentTree>,
    registry: &'a Arc<NameRegistry>,
    state: &'a mut BuildState,
    services: &'a Services,
    options: &'a ProcessOptions,
    /// Layout template name and source, by layout link name.
    layouts: HashMap<String, (String, String)>,
    rendered: usize,
}

impl<'a> Processor<'a> {
    pub fn new(
        tree: &'a Arc<ContentTree>,
        registry: &'a Arc<NameRegistry>,
        state: &'a mut BuildState,
        services: &'a Services,
        options: &'a ProcessOptions,
    ) -> Self {
        Self {
            tree,
            registry,
            state,
            services,
            options,
            layouts: HashMap::new(),
            rendered: 0,
        }
    }

    /// Number of pages rendered so far.
    #[must_use]
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    /// Process the whole tree starting from the `seed` frame.
    pub fn process_tree(&mut self, seed: &Frame) -> Result<(), BuildError> {
        let root = self.tree.root();
        self.process_directory(root, seed)
    }

    /// Re-render one page, replaying configuration from the root down to
    /// its directory.
    ///
    /// Returns `false` when the node is not a page or is skipped.
    pub fn process_single(&mut self, id: NodeId, seed: &Frame) -> Result<bool, BuildError> {
        let tree = self.tree;
        let Some(file) = tree.file(id) else {
            return Err(BuildError::UnknownNode(tree.node(id).rel_path.display().to_string()));
        };
        if !file.is_page() {
            return Ok(false);
        }

        let mut frame = seed.clone();
        let mut skip = HashSet::new();
        for dir in tree.directory_chain(tree.containing_dir(id)) {
            if skip.contains(tree.dir_link_name(dir)) {
                return Ok(false);
            }
            frame = self.enter_directory(dir, &frame)?;
            skip = self.skip_names(&frame, dir)?;
        }
        if !file.is_index && skip.contains(&file.link_name) {
            return Ok(false);
        }
        self.process_file(id, &frame)?;
        Ok(true)
    }

    fn config_path(&self, dir: NodeId) -> PathBuf {
        self.tree
            .node(dir)
            .abs_path
            .join(&self.options.config_filename)
    }

    fn process_directory(&mut self, dir: NodeId, inherited: &Frame) -> Result<(), BuildError> {
        let tree = self.tree;
        let Some(directory) = tree.directory(dir) else {
            return Ok(());
        };
        tracing::debug!(dir = %tree.node(dir).rel_path.display(), "Entering directory");

        let frame = self.enter_directory(dir, inherited)?;
        let skip = self.skip_names(&frame, dir)?;
        let order = self.state.node(dir).order.clone().unwrap_or_default();

        for &id in &order.files {
            if tree.file(id).is_some_and(FileNode::is_page) && self.state.node(id).view.is_none() {
                let view = page_view(tree, self.state, id);
                self.state.node_mut(id).view = Some(view);
            }
        }

        for &sub in &order.subdirs {
            if skip.contains(tree.dir_link_name(sub)) {
                tracing::debug!(dir = %tree.node(sub).rel_path.display(), "Skipped");
                self.finish_directory(sub);
                continue;
            }
            self.process_directory(sub, &frame)?;
        }

        for &id in &order.files {
            let Some(file) = tree.file(id) else { continue };
            if !file.is_page() || file.is_index {
                continue;
            }
            if skip.contains(&file.link_name) {
                tracing::debug!(path = %tree.node(id).rel_path.display(), "Skipped");
                continue;
            }
            self.process_file(id, &frame)?;
        }

        if let Some(index) = directory.index {
            self.process_file(index, &frame)?;
        }
        self.finish_directory(dir);
        Ok(())
    }

    /// Freeze a directory's view once nothing below it renders again.
    fn finish_directory(&mut self, dir: NodeId) {
        let view = dir_view(self.tree, self.state, dir);
        self.state.node_mut(dir).view = Some(view);
    }

    /// Build a directory's frame: inherited bindings, its configuration file
    /// and the `dir` view. Also records the sorted child order.
    fn enter_directory(&mut self, dir: NodeId, inherited: &Frame) -> Result<Frame, BuildError> {
        let tree = self.tree;
        let node = tree.node(dir);
        let mut frame = inherited.child();
        self.state.node_mut(dir).in_vcs = self.services.history.is_work_tree(&node.abs_path);

        let config_id = tree.directory(dir).and_then(|d| {
            d.files
                .iter()
                .copied()
                .find(|&f| tree.node(f).name == self.options.config_filename)
        });
        if let Some(config_id) = config_id {
            let config_node = tree.node(config_id);
            let config = self
                .evaluate_config(dir, &config_node.abs_path)
                .map_err(|e| e.in_page(&config_node.rel_path))?;
            if let Some(title) = config.title {
                self.set_config_title(dir, title)?;
            }
            frame.overlay(config.bindings);
        }

        let sort = SortSpec::from_frame(&frame, &self.config_path(dir))?;
        if let Some(directory) = tree.directory(dir) {
            let mut subdirs = directory.subdirs.clone();
            self.sort_nodes(&mut subdirs, sort.dirs);
            let mut files = directory.files.clone();
            self.sort_nodes(&mut files, sort.files);
            self.state.node_mut(dir).order = Some(ChildOrder { subdirs, files });
        }

        frame.insert("dir", dir_view(tree, self.state, dir));
        Ok(frame)
    }

    fn evaluate_config(
        &self,
        dir: NodeId,
        config_path: &Path,
    ) -> Result<dir_config::DirConfig, BuildError> {
        let source = fs::read_to_string(config_path).map_err(|e| StorageError::io(e, config_path))?;
        let tree: &ContentTree = self.tree;
        let registry: &NameRegistry = self.registry;
        let resolve_path = |name: &str| {
            LinkResolver::new(tree, registry).resolve(dir, name, true, &mut Vec::new())
        };
        let ctx = BuilderContext {
            config_path,
            config_dir: &tree.node(dir).abs_path,
            allow_exec: self.options.allow_exec,
            compiler: &*self.services.compiler,
            resolve_path: &resolve_path,
        };
        dir_config::evaluate(&source, &ctx)
    }

    fn set_config_title(&mut self, dir: NodeId, title: String) -> Result<(), BuildError> {
        let state = self.state.node_mut(dir);
        match &state.title {
            Some(existing) if *existing != title => Err(ConfigurationError::TitleConflict {
                dir: self.tree.node(dir).rel_path.clone(),
                existing: existing.clone(),
                new: title,
            }
            .into()),
            _ => {
                state.title = Some(title);
                Ok(())
            }
        }
    }

    fn skip_names(&self, frame: &Frame, dir: NodeId) -> Result<HashSet<String>, BuildError> {
        match frame.get("skip") {
            None | Some(Value::Null) => Ok(HashSet::new()),
            Some(value) => Ok(dir_config::skip_list(value, &self.config_path(dir))?
                .into_iter()
                .collect()),
        }
    }

    /// Dates of a node, computed once per build.
    fn dates(&mut self, id: NodeId) -> PageDates {
        if let Some(dates) = self.state.node(id).dates {
            return dates;
        }
        let node = self.tree.node(id);
        let history = self.services.history.history(&node.abs_path);
        let mtime = fs::metadata(&node.abs_path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        let filename_date = self.tree.file(id).and_then(FileNode::idea_date);

        let dates = PageDates {
            created: history.map(|h| h.first_seen),
            last_modified: history.map(|h| h.last_modified).or(mtime),
            idea_date: filename_date.or_else(|| history.map(|h| h.first_seen.date_naive())),
        };
        self.state.node_mut(id).dates = Some(dates);
        dates
    }

    fn sort_nodes(&mut self, ids: &mut [NodeId], key: Option<SortKey>) {
        let Some(key) = key else { return };
        if matches!(key.field, SortField::Modified | SortField::IdeaDate) {
            for &id in ids.iter() {
                self.dates(id);
            }
        }

        let tree = self.tree;
        let state = &*self.state;
        let link_name = |id: NodeId| match tree.file(id) {
            Some(file) => file.link_name.as_str(),
            None => tree.dir_link_name(id),
        };
        let dates = |id: NodeId| state.node(id).dates.unwrap_or_default();

        ids.sort_by(|&a, &b| {
            let ordering = match key.field {
                SortField::Name => tree.node(a).name.cmp(&tree.node(b).name),
                SortField::LinkName => link_name(a).cmp(link_name(b)),
                SortField::Modified => dates(a).last_modified.cmp(&dates(b).last_modified),
                SortField::IdeaDate => dates(a).idea_date.cmp(&dates(b).idea_date),
            };
            key.direct(ordering)
                .then_with(|| tree.node(a).name.cmp(&tree.node(b).name))
        });
    }

    fn process_file(&mut self, id: NodeId, dir_frame: &Frame) -> Result<(), BuildError> {
        let tree = self.tree;
        let node = tree.node(id);
        tracing::info!(path = %node.rel_path.display(), "Processing");
        self.render_file(id, dir_frame)
            .map_err(|e| e.in_page(&node.rel_path))?;
        self.rendered += 1;
        Ok(())
    }

    fn render_template(
        &self,
        name: &str,
        source: &str,
        frame: &Frame,
        callbacks: &Arc<PageCallbacks>,
    ) -> Result<Rendered, BuildError> {
        let hooks: Arc<dyn TemplateCallbacks> = Arc::clone(callbacks) as Arc<dyn TemplateCallbacks>;
        self.services
            .engine
            .render(name, source, frame, hooks)
            .map_err(|e| match callbacks.take_link_error() {
                Some(link) => link.into(),
                None => e.into(),
            })
    }

    /// Layout template for a markup page.
    fn layout(&mut self, frame: &Frame, id: NodeId) -> Result<(String, String), BuildError> {
        if let Some(raw) = frame.get_str("layout_raw") {
            return Ok(("layout_raw".to_owned(), raw.to_owned()));
        }
        let Some(name) = frame.get_str("layout") else {
            return Err(ConfigurationError::MissingLayout {
                page: self.tree.node(id).rel_path.clone(),
            }
            .into());
        };
        if let Some(cached) = self.layouts.get(name) {
            return Ok(cached.clone());
        }

        let layout_id = self.registry.lookup(name)?;
        let layout_node = self.tree.node(layout_id);
        let source = fs::read_to_string(&layout_node.abs_path)
            .map_err(|e| StorageError::io(e, &layout_node.abs_path))?;
        tracing::debug!(layout = name, path = %layout_node.rel_path.display(), "Loaded layout");

        let entry = (layout_node.name.clone(), source);
        self.layouts.insert(name.to_owned(), entry.clone());
        Ok(entry)
    }

    fn render_file(&mut self, id: NodeId, dir_frame: &Frame) -> Result<(), BuildError> {
        let tree = self.tree;
        let node = tree.node(id);
        let Some(file) = tree.file(id) else {
            return Ok(());
        };
        let parent = tree.containing_dir(id);

        self.dates(id);
        {
            let state = self.state.node_mut(id);
            state.links.clear();
            state.warnings.clear();
            state.metadata.clear();
            state.output = None;
            state.env = None;
            state.view = None;
        }

        let mut frame = dir_frame.child();
        frame.insert("dir", dir_view(tree, self.state, parent));
        frame.insert("page", page_view(tree, self.state, id));

        let source =
            fs::read_to_string(&node.abs_path).map_err(|e| StorageError::io(e, &node.abs_path))?;
        let callbacks = Arc::new(PageCallbacks {
            tree: Arc::clone(self.tree),
            registry: Arc::clone(self.registry),
            source: id,
            recorded: Mutex::new(Recorded::default()),
        });

        let page = self.render_template(&node.name, &source, &frame, &callbacks)?;
        frame.overlay(page.exports);

        let output = match &file.kind {
            FileKind::StaticAsset => return Ok(()),
            FileKind::Scripted { .. } => page.text,
            FileKind::Markup { .. } => {
                let compiled = self.services.compiler.compile(&page.text)?;
                frame.overlay(compiled.metadata.clone());
                self.state.node_mut(id).metadata = compiled.metadata;

                let (layout_name, layout_source) = self.layout(&frame, id)?;
                tracing::debug!(path = %node.rel_path.display(), layout = %layout_name, "Applying layout");
                frame.insert("content", compiled.html);
                let rendered = self.render_template(&layout_name, &layout_source, &frame, &callbacks)?;
                frame.overlay(rendered.exports);
                rendered.text
            }
        };

        let (edges, warnings) = callbacks.take();
        for warning in &warnings {
            tracing::warn!(page = %node.rel_path.display(), warning = %warning, "Page warning");
        }
        let title = frame.get_str("title").map(str::to_owned);
        let public = frame.get("public").and_then(Value::as_bool);

        {
            let state = self.state.node_mut(id);
            state.links = edges;
            state.warnings = warnings;
            state.output = Some(output);
            state.title.clone_from(&title);
            state.env = Some(frame);
        }
        match public {
            Some(true) => self.state.mark_public(tree, id),
            Some(false) => self.state.node_mut(id).publish = false,
            None => {}
        }
        if file.is_index && self.state.node(parent).title.is_none() {
            self.state.node_mut(parent).title = title;
        }
        let view = page_view(tree, self.state, id);
        self.state.node_mut(id).view = Some(view);
        self.state.invalidate_views(tree, id);
        Ok(())
    }
}
