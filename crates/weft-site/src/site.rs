//! Site builds.
//!
//! [`Site`] owns the collaborators and the result of the last full build.
//! A full build crawls, registers link names, processes the tree, traces
//! reachability and writes the output. Incremental rebuilds reuse the tree,
//! registry and state of the last build and replay only the affected pages;
//! any failure while doing so falls back to a full build.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::PathBuf;
//! use weft_site::{Site, SiteConfig};
//!
//! let config = SiteConfig {
//!     source_dir: PathBuf::from("content"),
//!     output_dir: PathBuf::from("site"),
//!     ..SiteConfig::default()
//! };
//! let mut site = Site::new(config);
//! let report = site.build()?;
//! println!("{} pages published", report.published);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use weft_renderer::{CommonMarkCompiler, MarkdownCompiler, MiniJinjaEngine, TemplateEngine};
use weft_storage::{ChangeEvent, ContentTree, CrawlOptions, Crawler, NodeId, StandardIgnore, StorageError};
use weft_vcs::HistoryProvider;

use crate::error::BuildError;
use crate::frame::Frame;
use crate::planner::{self, RebuildPlan};
use crate::processor::{ProcessOptions, Processor, Services};
use crate::registry::NameRegistry;
use crate::state::BuildState;
use crate::tracer;
use crate::writer::{OutputOptions, Writer, plan_outputs};

/// Site build configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Content root.
    pub source_dir: PathBuf,
    /// Output directory.
    pub output_dir: PathBuf,
    /// Reserved directory configuration filename.
    pub config_filename: String,
    /// File classification conventions.
    pub crawl: CrawlOptions,
    /// Glob patterns, relative to the content root, excluded from the tree.
    pub ignore: Vec<String>,
    /// Replace an existing output directory.
    pub clear_output: bool,
    /// Copy static assets instead of symlinking them.
    pub copy_assets: bool,
    /// Enable the `!exec` configuration builder.
    pub allow_exec: bool,
    /// Root bindings.
    pub seed: Map<String, Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("content"),
            output_dir: PathBuf::from("site"),
            config_filename: "_config.yaml".to_owned(),
            crawl: CrawlOptions::default(),
            ignore: Vec::new(),
            clear_output: false,
            copy_assets: false,
            allow_exec: false,
            seed: Map::new(),
        }
    }
}

/// Summary of a full build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Nodes in the content tree.
    pub nodes: usize,
    /// Pages rendered.
    pub rendered: usize,
    /// Published nodes, directories included.
    pub published: usize,
    /// Files written to the output directory.
    pub written: usize,
    /// Template warnings.
    pub warnings: usize,
}

/// What a rebuild did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Nothing relevant changed.
    Unchanged,
    /// Some pages were re-rendered in place.
    Incremental { rendered: usize, written: usize },
    /// The whole site was rebuilt.
    Full(BuildReport),
}

/// Result of the last full build.
struct Built {
    tree: Arc<ContentTree>,
    registry: Arc<NameRegistry>,
    state: BuildState,
}

/// A buildable site.
pub struct Site {
    config: SiteConfig,
    services: Services,
    built: Option<Built>,
    /// Set once this site has written the output directory.
    owns_output: bool,
}

impl Site {
    /// Create a site with the default collaborators.
    ///
    /// History comes from the git repository containing the content root,
    /// if any.
    #[must_use]
    pub fn new(config: SiteConfig) -> Self {
        let compiler: Arc<dyn MarkdownCompiler> = Arc::new(CommonMarkCompiler::new());
        let history: Arc<dyn HistoryProvider> = Arc::from(weft_vcs::discover(&config.source_dir));
        Self {
            services: Services {
                engine: Arc::new(MiniJinjaEngine::new(Arc::clone(&compiler))),
                compiler,
                history,
            },
            config,
            built: None,
            owns_output: false,
        }
    }

    /// Replace the history provider.
    #[must_use]
    pub fn with_history(mut self, history: Arc<dyn HistoryProvider>) -> Self {
        self.services.history = history;
        self
    }

    /// Replace the Markdown compiler.
    ///
    /// The default template engine is rebuilt around the new compiler, so
    /// call this before [`Site::with_engine`].
    #[must_use]
    pub fn with_compiler(mut self, compiler: Arc<dyn MarkdownCompiler>) -> Self {
        self.services.engine = Arc::new(MiniJinjaEngine::new(Arc::clone(&compiler)));
        self.services.compiler = compiler;
        self
    }

    /// Replace the template engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.services.engine = engine;
        self
    }

    /// Content tree of the last full build.
    #[must_use]
    pub fn tree(&self) -> Option<&ContentTree> {
        self.built.as_ref().map(|b| b.tree.as_ref())
    }

    /// Build state of the last build.
    #[must_use]
    pub fn state(&self) -> Option<&BuildState> {
        self.built.as_ref().map(|b| &b.state)
    }

    /// Link-name registry of the last full build.
    #[must_use]
    pub fn registry(&self) -> Option<&NameRegistry> {
        self.built.as_ref().map(|b| b.registry.as_ref())
    }

    fn seed(&self) -> Frame {
        Frame::from(self.config.seed.clone())
    }

    fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            config_filename: self.config.config_filename.clone(),
            allow_exec: self.config.allow_exec,
        }
    }

    fn output_options(&self) -> OutputOptions {
        OutputOptions {
            clear_output: self.config.clear_output || self.owns_output,
            copy_assets: self.config.copy_assets,
        }
    }

    /// Ignore rule for a canonical content root.
    ///
    /// The output directory is excluded when it lives inside the content.
    #[must_use]
    pub fn ignore_rule(&self, root: &Path) -> StandardIgnore {
        let ignore = StandardIgnore::new(root, &self.config.ignore);
        let output = &self.config.output_dir;
        match fs::canonicalize(output).or_else(|_| std::path::absolute(output)) {
            Ok(output) => ignore.exclude(output),
            Err(_) => ignore,
        }
    }

    /// Canonical content root.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the source directory does not exist.
    pub fn content_root(&self) -> Result<PathBuf, BuildError> {
        let source = &self.config.source_dir;
        let root = fs::canonicalize(source).map_err(|e| StorageError::io(e, source))?;
        Ok(root)
    }

    /// Crawl, process, trace and write the whole site.
    ///
    /// On failure the output directory is left untouched and the previous
    /// build, if any, is kept.
    pub fn build(&mut self) -> Result<BuildReport, BuildError> {
        let root = self.content_root()?;
        self.services.history.invalidate();
        tracing::info!(source = %root.display(), "Building site");

        let ignore = self.ignore_rule(&root);
        let tree = Crawler::new(&root, &self.config.crawl, &ignore).crawl()?;
        let registry = NameRegistry::build(&tree, &self.config.config_filename)?;
        tracing::debug!(tree = %tree.display(), "Crawled content");
        tracing::debug!(count = registry.len(), names = ?registry.names(), "Registered link names");
        let tree = Arc::new(tree);
        let registry = Arc::new(registry);

        let mut state = BuildState::new(tree.len());
        let options = self.process_options();
        let rendered = {
            let mut processor = Processor::new(&tree, &registry, &mut state, &self.services, &options);
            processor.process_tree(&self.seed())?;
            processor.rendered()
        };
        let published = tracer::trace(&tree, &mut state);

        let written = Writer::new(&tree, &state, self.output_options()).write_site(&self.config.output_dir)?;
        let report = BuildReport {
            nodes: tree.len(),
            rendered,
            published,
            written,
            warnings: state.warning_count(),
        };
        tracing::info!(
            rendered = report.rendered,
            published = report.published,
            written = report.written,
            "Build complete"
        );

        self.owns_output = true;
        self.built = Some(Built {
            tree,
            registry,
            state,
        });
        Ok(report)
    }

    /// Classify a change batch against the last build.
    ///
    /// Without a previous build every batch needs a full build.
    #[must_use]
    pub fn plan(&self, changes: &[ChangeEvent]) -> RebuildPlan {
        let Some(built) = &self.built else {
            return RebuildPlan::Full;
        };
        let root = &built.tree.node(built.tree.root()).abs_path;
        let ignore = self.ignore_rule(root);
        planner::plan(
            &built.tree,
            changes,
            &self.config.config_filename,
            &|path: &Path| ignore.is_ignored_path(path),
        )
    }

    /// Apply a batch of changes.
    ///
    /// Incremental failures are logged and answered with a full build; only a
    /// failing full build is returned as an error.
    pub fn rebuild(&mut self, changes: &[ChangeEvent]) -> Result<RebuildOutcome, BuildError> {
        match self.plan(changes) {
            RebuildPlan::Nothing => Ok(RebuildOutcome::Unchanged),
            RebuildPlan::Full => self.build().map(RebuildOutcome::Full),
            RebuildPlan::Markup(pages) | RebuildPlan::ConfigAndDescendants(pages) => {
                self.rebuild_or_fallback(&pages)
            }
        }
    }

    /// Re-render one page, located by content-relative path or link name.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownNode`] if nothing matches `locator`.
    pub fn rebuild_file(&mut self, locator: &str) -> Result<RebuildOutcome, BuildError> {
        if self.built.is_none() {
            self.build()?;
        }
        let id = self.locate(locator)?;
        self.rebuild_or_fallback(&[id])
    }

    fn locate(&self, locator: &str) -> Result<NodeId, BuildError> {
        let built = self
            .built
            .as_ref()
            .ok_or_else(|| BuildError::UnknownNode(locator.to_owned()))?;
        if let Some(id) = built.tree.find_by_rel_path(Path::new(locator)) {
            return Ok(id);
        }
        built
            .registry
            .lookup(locator)
            .map_err(|_| BuildError::UnknownNode(locator.to_owned()))
    }

    fn rebuild_or_fallback(&mut self, pages: &[NodeId]) -> Result<RebuildOutcome, BuildError> {
        match self.rebuild_pages(pages) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "Incremental rebuild failed, rebuilding everything");
                self.build().map(RebuildOutcome::Full)
            }
        }
    }

    /// Replay `pages`, re-trace and rewrite their artifacts plus any node the
    /// replay newly published.
    fn rebuild_pages(&mut self, pages: &[NodeId]) -> Result<RebuildOutcome, BuildError> {
        let seed = self.seed();
        let options = self.process_options();
        let output_options = self.output_options();
        let Some(built) = self.built.as_mut() else {
            return Err(BuildError::UnknownNode(String::new()));
        };
        let tree = &built.tree;
        self.services.history.invalidate();

        let mut state = built.state.clone();
        let before: HashSet<NodeId> = state.published(tree).into_iter().collect();
        for &id in pages {
            state.node_mut(id).dates = None;
        }

        let rendered = {
            let mut processor = Processor::new(tree, &built.registry, &mut state, &self.services, &options);
            for &id in pages {
                processor.process_single(id, &seed)?;
            }
            processor.rendered()
        };
        tracer::trace(tree, &mut state);
        plan_outputs(tree, &state)?;

        let writer = Writer::new(tree, &state, output_options);
        let newly_published = state.published(tree).into_iter().filter(|id| !before.contains(id));
        let mut targets: Vec<NodeId> = pages.iter().copied().chain(newly_published).collect();
        targets.sort_unstable();
        targets.dedup();

        let mut written = 0;
        for id in targets {
            if writer.write_node(&self.config.output_dir, id)? {
                written += 1;
            }
        }
        tracing::info!(rendered, written, "Incremental rebuild complete");

        built.state = state;
        Ok(RebuildOutcome::Incremental { rendered, written })
    }
}
