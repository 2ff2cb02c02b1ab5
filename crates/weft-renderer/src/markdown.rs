//! Markdown compilation.
//!
//! Markup pages may open with a YAML front matter block (`---` fenced). Its
//! mapping becomes page metadata; when it has no `title`, the text of the
//! first H1 heading is used instead.

use pulldown_cmark::{Event, HeadingLevel, MetadataBlockKind, Options, Parser, Tag, TagEnd};
use serde_json::{Map, Value};

/// Result of compiling a Markdown document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compiled {
    /// Rendered HTML body.
    pub html: String,
    /// Front matter bindings, plus `title` from the first H1 when absent.
    pub metadata: Map<String, Value>,
}

/// Markdown compilation failures.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Front matter is not valid YAML.
    #[error("Invalid front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
    /// Front matter is valid YAML but not a mapping.
    #[error("Front matter must be a mapping")]
    NotAMapping,
}

/// Converts Markdown text to HTML and metadata.
pub trait MarkdownCompiler: Send + Sync {
    /// Compile `text`.
    fn compile(&self, text: &str) -> Result<Compiled, CompileError>;
}

/// CommonMark compiler backed by pulldown-cmark with GFM extensions.
#[derive(Debug, Clone)]
pub struct CommonMarkCompiler {
    gfm: bool,
}

impl Default for CommonMarkCompiler {
    fn default() -> Self {
        Self { gfm: true }
    }
}

impl CommonMarkCompiler {
    /// Create a compiler with GFM enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable GitHub Flavored Markdown features.
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    fn parser_options(&self) -> Options {
        let base = Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
        if self.gfm {
            base | Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_GFM
        } else {
            base
        }
    }
}

/// Parse front matter YAML into a JSON object.
fn parse_front_matter(yaml: &str) -> Result<Map<String, Value>, CompileError> {
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(CompileError::NotAMapping),
    }
}

impl MarkdownCompiler for CommonMarkCompiler {
    fn compile(&self, text: &str) -> Result<Compiled, CompileError> {
        let mut front_matter = String::new();
        let mut in_metadata = false;
        let mut title: Option<String> = None;
        let mut in_title = false;

        let events: Vec<Event<'_>> = Parser::new_ext(text, self.parser_options())
            .filter_map(|event| {
                match &event {
                    Event::Start(Tag::MetadataBlock(MetadataBlockKind::YamlStyle)) => {
                        in_metadata = true;
                        return None;
                    }
                    Event::End(TagEnd::MetadataBlock(_)) => {
                        in_metadata = false;
                        return None;
                    }
                    Event::Text(t) if in_metadata => {
                        front_matter.push_str(t);
                        return None;
                    }
                    Event::Start(Tag::Heading {
                        level: HeadingLevel::H1,
                        ..
                    }) if title.is_none() => {
                        in_title = true;
                        title = Some(String::new());
                    }
                    Event::End(TagEnd::Heading(HeadingLevel::H1)) => in_title = false,
                    Event::Text(t) | Event::Code(t) if in_title => {
                        if let Some(title) = title.as_mut() {
                            title.push_str(t);
                        }
                    }
                    _ => {}
                }
                Some(event)
            })
            .collect();

        let mut html = String::with_capacity(text.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, events.into_iter());

        let mut metadata = parse_front_matter(&front_matter)?;
        if let Some(title) = title.filter(|t| !t.trim().is_empty())
            && !metadata.contains_key("title")
        {
            metadata.insert("title".to_owned(), Value::String(title.trim().to_owned()));
        }

        Ok(Compiled { html, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn compile(text: &str) -> Compiled {
        CommonMarkCompiler::new().compile(text).unwrap()
    }

    #[test]
    fn test_renders_html() {
        let compiled = compile("Some **bold** text");
        assert_eq!(compiled.html, "<p>Some <strong>bold</strong> text</p>\n");
        assert!(compiled.metadata.is_empty());
    }

    #[test]
    fn test_front_matter_becomes_metadata() {
        let compiled = compile("---\ntitle: Guide\ntags: [a, b]\n---\n\nBody\n");
        assert_eq!(compiled.metadata.get("title"), Some(&json!("Guide")));
        assert_eq!(compiled.metadata.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(compiled.html, "<p>Body</p>\n");
    }

    #[test]
    fn test_first_h1_used_as_title() {
        let compiled = compile("# Getting `started`\n\n# Second\n");
        assert_eq!(compiled.metadata.get("title"), Some(&json!("Getting started")));
        assert!(compiled.html.contains("<h1>Second</h1>"));
    }

    #[test]
    fn test_front_matter_title_wins_over_h1() {
        let compiled = compile("---\ntitle: Explicit\n---\n# Heading\n");
        assert_eq!(compiled.metadata.get("title"), Some(&json!("Explicit")));
    }

    #[test]
    fn test_non_mapping_front_matter_is_error() {
        let err = CommonMarkCompiler::new()
            .compile("---\n- a\n- b\n---\nBody\n")
            .unwrap_err();
        assert!(matches!(err, CompileError::NotAMapping));
    }

    #[test]
    fn test_gfm_tables() {
        let compiled = compile("| a |\n|---|\n| 1 |\n");
        assert!(compiled.html.contains("<table>"));

        let plain = CommonMarkCompiler::new()
            .with_gfm(false)
            .compile("| a |\n|---|\n| 1 |\n")
            .unwrap();
        assert!(!plain.html.contains("<table>"));
    }
}
