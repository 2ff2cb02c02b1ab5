//! Build error types.

use std::fmt;
use std::path::PathBuf;

use weft_renderer::{CompileError, TemplateError};
use weft_storage::{CrawlError, StorageError};

/// Invalid content configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A directory configuration sets a title different from the existing one.
    #[error("Conflicting titles for {}: '{existing}' and '{new}'", dir.display())]
    TitleConflict {
        dir: PathBuf,
        existing: String,
        new: String,
    },
    /// `skip` is not a list of strings.
    #[error("Invalid skip in {}: expected a list of names", path.display())]
    InvalidSkip { path: PathBuf },
    /// A sort directive is malformed.
    #[error("Invalid {key} in {}: {message}", path.display())]
    InvalidSort {
        path: PathBuf,
        key: String,
        message: String,
    },
    /// A markup page has neither `layout_raw` nor `layout`.
    #[error("No layout for {}: set 'layout' or 'layout_raw'", page.display())]
    MissingLayout { page: PathBuf },
    /// A YAML tag names no known builder.
    #[error("Unknown builder '!{tag}' in {}", path.display())]
    UnknownBuilder { path: PathBuf, tag: String },
    /// `!exec` used without `build.allow_exec`.
    #[error("'!exec' in {} requires build.allow_exec", path.display())]
    ExecDisabled { path: PathBuf },
    /// A builder could not produce its value.
    #[error("Builder '!{tag}' failed in {}: {message}", path.display())]
    Builder {
        path: PathBuf,
        tag: String,
        message: String,
    },
    /// Directory configuration is not valid YAML.
    #[error("Invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// Directory configuration is not a mapping.
    #[error("{} must contain a mapping", path.display())]
    NotAMapping { path: PathBuf },
    /// More than one index page in a directory.
    #[error("Multiple index pages in {}: {}", dir.display(), candidates.join(", "))]
    MultipleIndexPages {
        dir: PathBuf,
        candidates: Vec<String>,
    },
}

/// A link name shared by several files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The contested link name.
    pub name: String,
    /// Content-relative paths of every file claiming it.
    pub paths: Vec<PathBuf>,
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
        write!(f, "'{}' ({})", self.name, paths.join(", "))
    }
}

fn join_collisions(collisions: &[Collision]) -> String {
    collisions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Link resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// No file is registered under the name.
    #[error("No page named '{name}'")]
    NotFound { name: String },
    /// Several files share a link name.
    #[error("Link name collisions: {}", join_collisions(.0))]
    Collisions(Vec<Collision>),
    /// The name is a directory that has no index page to link to.
    #[error("Directory '{name}' has no index page ({})", dir.display())]
    DirectoryWithoutIndex { name: String, dir: PathBuf },
}

/// Build failure.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Link(#[from] LinkError),
    /// Two published nodes map to the same output path.
    #[error("Output path already exists: {}", path.display())]
    OutputConflict { path: PathBuf },
    /// The output directory exists and clearing it was not requested.
    #[error("Output directory {} already exists (use --clear-output)", path.display())]
    OutputExists { path: PathBuf },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// No node matches a path or link name given for a single-file rebuild.
    #[error("No content node for '{0}'")]
    UnknownNode(String),
    /// A failure while building one page.
    #[error("{}: {source}", page.display())]
    Page {
        page: PathBuf,
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// Attach the content-relative path of the page being built.
    #[must_use]
    pub fn in_page(self, page: impl Into<PathBuf>) -> Self {
        match self {
            Self::Page { .. } => self,
            other => Self::Page {
                page: page.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, without page context.
    #[must_use]
    pub fn root(&self) -> &BuildError {
        match self {
            Self::Page { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<CrawlError> for BuildError {
    fn from(e: CrawlError) -> Self {
        match e {
            CrawlError::Storage(e) => Self::Storage(e),
            CrawlError::MultipleIndexPages { dir, candidates } => {
                ConfigurationError::MultipleIndexPages { dir, candidates }.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collisions_display_every_path() {
        let err = LinkError::Collisions(vec![Collision {
            name: "guide".to_owned(),
            paths: vec![PathBuf::from("a/guide.md"), PathBuf::from("b/Guide.md")],
        }]);
        assert_eq!(
            err.to_string(),
            "Link name collisions: 'guide' (a/guide.md, b/Guide.md)"
        );
    }

    #[test]
    fn test_in_page_wraps_once() {
        let err = BuildError::from(LinkError::NotFound {
            name: "x".to_owned(),
        })
        .in_page("docs/a.md")
        .in_page("ignored.md");
        assert_eq!(err.to_string(), "docs/a.md: No page named 'x'");
        assert!(matches!(err.root(), BuildError::Link(LinkError::NotFound { .. })));
    }

    #[test]
    fn test_crawl_error_conversion() {
        let err = BuildError::from(CrawlError::MultipleIndexPages {
            dir: PathBuf::from("/c"),
            candidates: vec!["index.md".to_owned(), "index.tpl.html".to_owned()],
        });
        assert!(matches!(
            err,
            BuildError::Configuration(ConfigurationError::MultipleIndexPages { .. })
        ));
    }
}
