//! Template rendering.
//!
//! Every page is itself a template: the page source is rendered against the
//! current frame before Markdown compilation, and layouts are rendered with
//! the compiled body bound to `content`.
//!
//! Templates can call back into the site engine:
//!
//! - `link(name)` - relative URL of a page, recording a link edge
//! - `path(name)` - relative path of a page, without recording an edge
//! - `warn(message)` - attach a warning to the page being rendered
//!
//! Filters: `markdown` compiles Markdown text to HTML, `date(format)` formats
//! an ISO date or datetime string.

use std::sync::Arc;

use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, Error, ErrorKind};
use serde_json::Map;

use crate::frame::Frame;
use crate::markdown::MarkdownCompiler;

/// Site engine hooks available to templates.
pub trait TemplateCallbacks: Send + Sync {
    /// Resolve a link name to a URL and record the reference.
    fn link(&self, name: &str) -> Result<String, String>;
    /// Resolve a link name to a path without recording a reference.
    fn path(&self, name: &str) -> Result<String, String>;
    /// Record a warning for the page being rendered.
    fn warn(&self, message: &str);
}

/// Output of a template render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    /// Rendered text.
    pub text: String,
    /// Top-level variables assigned with `{% set %}`.
    pub exports: Map<String, serde_json::Value>,
}

/// Template rendering failure.
#[derive(Debug, thiserror::Error)]
#[error("Template error in {name}: {source:#}")]
pub struct TemplateError {
    name: String,
    #[source]
    source: Error,
}

impl TemplateError {
    /// Name of the failing template.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Renders a template source against a frame.
pub trait TemplateEngine: Send + Sync {
    /// Render `source` (identified by `name` in diagnostics).
    fn render(
        &self,
        name: &str,
        source: &str,
        frame: &Frame,
        callbacks: Arc<dyn TemplateCallbacks>,
    ) -> Result<Rendered, TemplateError>;
}

/// Template engine backed by minijinja.
pub struct MiniJinjaEngine {
    compiler: Arc<dyn MarkdownCompiler>,
}

impl MiniJinjaEngine {
    /// Create an engine whose `markdown` filter uses `compiler`.
    #[must_use]
    pub fn new(compiler: Arc<dyn MarkdownCompiler>) -> Self {
        Self { compiler }
    }

    fn environment<'s>(&self, callbacks: &Arc<dyn TemplateCallbacks>) -> Environment<'s> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);

        let cb = Arc::clone(callbacks);
        env.add_function("link", move |name: &str| -> Result<String, Error> {
            cb.link(name)
                .map_err(|msg| Error::new(ErrorKind::InvalidOperation, msg))
        });
        let cb = Arc::clone(callbacks);
        env.add_function("path", move |name: &str| -> Result<String, Error> {
            cb.path(name)
                .map_err(|msg| Error::new(ErrorKind::InvalidOperation, msg))
        });
        let cb = Arc::clone(callbacks);
        env.add_function("warn", move |message: &str| -> String {
            cb.warn(message);
            String::new()
        });

        let compiler = Arc::clone(&self.compiler);
        env.add_filter("markdown", move |text: &str| -> Result<Value, Error> {
            compiler
                .compile(text)
                .map(|compiled| Value::from_safe_string(compiled.html))
                .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
        });
        env.add_filter("date", ext::date);
        env
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(
        &self,
        name: &str,
        source: &str,
        frame: &Frame,
        callbacks: Arc<dyn TemplateCallbacks>,
    ) -> Result<Rendered, TemplateError> {
        let wrap = |source: Error| TemplateError {
            name: name.to_owned(),
            source,
        };

        let env = self.environment(&callbacks);
        let template = env.template_from_named_str(name, source).map_err(wrap)?;
        let (text, state) = template
            .render_and_return_state(Value::from_serialize(frame))
            .map_err(wrap)?;

        let mut exports = Map::new();
        for key in state.exports() {
            if let Some(value) = state.lookup(key)
                && let Ok(json) = serde_json::to_value(&value)
            {
                exports.insert(key.to_owned(), json);
            }
        }
        Ok(Rendered { text, exports })
    }
}

mod ext {
    use chrono::{DateTime, NaiveDate};
    use minijinja::{Error, ErrorKind};

    /// Format an ISO date (`2024-03-05`) or RFC 3339 datetime.
    pub(super) fn date(value: &str, format: Option<&str>) -> Result<String, Error> {
        let format = format.unwrap_or("%Y-%m-%d");
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(date.format(format).to_string());
        }
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.format(format).to_string())
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("cannot format '{value}' as a date: {e}"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::markdown::CommonMarkCompiler;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        links: Mutex<Vec<String>>,
        warnings: Mutex<Vec<String>>,
    }

    impl TemplateCallbacks for Recorder {
        fn link(&self, name: &str) -> Result<String, String> {
            if name == "missing" {
                return Err(format!("no page named '{name}'"));
            }
            self.links.lock().unwrap().push(name.to_owned());
            Ok(format!("../{name}/"))
        }

        fn path(&self, name: &str) -> Result<String, String> {
            Ok(format!("{name}.html"))
        }

        fn warn(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_owned());
        }
    }

    fn engine() -> MiniJinjaEngine {
        MiniJinjaEngine::new(Arc::new(CommonMarkCompiler::new()))
    }

    fn render(source: &str, frame: &Frame, recorder: &Arc<Recorder>) -> Result<Rendered, TemplateError> {
        let callbacks: Arc<dyn TemplateCallbacks> = Arc::clone(recorder) as Arc<dyn TemplateCallbacks>;
        engine().render("page.md", source, frame, callbacks)
    }

    #[test]
    fn test_frame_bindings_visible() {
        let mut frame = Frame::new();
        frame.insert("site", json!({"name": "Notes"}));
        let out = render("Welcome to {{ site.name }}\n", &frame, &Arc::default()).unwrap();
        assert_eq!(out.text, "Welcome to Notes\n");
    }

    #[test]
    fn test_html_not_escaped() {
        let mut frame = Frame::new();
        frame.insert("content", "<p>Body</p>");
        let out = render("<main>{{ content }}</main>", &frame, &Arc::default()).unwrap();
        assert_eq!(out.text, "<main><p>Body</p></main>");
    }

    #[test]
    fn test_link_and_path_callbacks() {
        let recorder = Arc::new(Recorder::default());
        let out = render(
            "[a]({{ link('about') }}) {{ path('logo') }}",
            &Frame::new(),
            &recorder,
        )
        .unwrap();
        assert_eq!(out.text, "[a](../about/) logo.html");
        assert_eq!(*recorder.links.lock().unwrap(), vec!["about".to_owned()]);
    }

    #[test]
    fn test_link_failure_is_template_error() {
        let err = render("{{ link('missing') }}", &Frame::new(), &Arc::default()).unwrap_err();
        assert_eq!(err.name(), "page.md");
        assert!(err.to_string().contains("no page named 'missing'"));
    }

    #[test]
    fn test_warn_records_message() {
        let recorder = Arc::new(Recorder::default());
        let out = render("a{{ warn('draft') }}b", &Frame::new(), &recorder).unwrap();
        assert_eq!(out.text, "ab");
        assert_eq!(*recorder.warnings.lock().unwrap(), vec!["draft".to_owned()]);
    }

    #[test]
    fn test_markdown_filter() {
        let out = render("{{ '*hi*' | markdown }}", &Frame::new(), &Arc::default()).unwrap();
        assert_eq!(out.text, "<p><em>hi</em></p>\n");
    }

    #[test]
    fn test_date_filter() {
        let out = render(
            "{{ '2024-03-05' | date('%d %b %Y') }}",
            &Frame::new(),
            &Arc::default(),
        )
        .unwrap();
        assert_eq!(out.text, "05 Mar 2024");
    }

    #[test]
    fn test_set_exports_returned() {
        let out = render("{% set public = true %}body", &Frame::new(), &Arc::default()).unwrap();
        assert_eq!(out.text, "body");
        assert_eq!(out.exports.get("public"), Some(&json!(true)));
    }

    #[test]
    fn test_syntax_error() {
        assert!(render("{% if %}", &Frame::new(), &Arc::default()).is_err());
    }
}
