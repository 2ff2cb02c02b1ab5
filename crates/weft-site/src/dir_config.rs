//! Directory configuration files.
//!
//! A directory's configuration file (`_config.yaml` by default) is a YAML
//! mapping merged into the environment of that directory and everything
//! beneath it. Values are plain data except for a closed set of builder tags:
//!
//! | Tag | Value |
//! |---|---|
//! | `!read <path>` | text of a file, relative to the configuration's directory |
//! | `!exec [cmd, args...]` | trimmed stdout of a process (requires `build.allow_exec`) |
//! | `!path <link-name>` | path from the configuration's directory to a page |
//! | `!markdown <text>` | HTML of the Markdown text |
//!
//! Keys starting with `_` are private and dropped. `title` names the
//! directory and is not bound. `skip` must be a list of names.

use std::path::Path;
use std::process::Command;

use serde_json::{Map, Number, Value};
use serde_yaml::Value as Yaml;
use weft_renderer::MarkdownCompiler;

use crate::error::{BuildError, ConfigurationError, LinkError};

/// Evaluated directory configuration.
#[derive(Debug, Default, PartialEq)]
pub struct DirConfig {
    /// Public bindings for the directory's frame.
    pub bindings: Map<String, Value>,
    /// Directory title.
    pub title: Option<String>,
}

/// Capabilities available to builder tags.
pub struct BuilderContext<'a> {
    /// Configuration file being evaluated (for diagnostics).
    pub config_path: &'a Path,
    /// Directory relative paths are resolved against.
    pub config_dir: &'a Path,
    /// Whether `!exec` may run processes.
    pub allow_exec: bool,
    /// Compiler behind `!markdown`.
    pub compiler: &'a dyn MarkdownCompiler,
    /// Resolver behind `!path`.
    pub resolve_path: &'a dyn Fn(&str) -> Result<String, LinkError>,
}

impl BuilderContext<'_> {
    fn builder_error(&self, tag: &str, message: impl Into<String>) -> BuildError {
        ConfigurationError::Builder {
            path: self.config_path.to_path_buf(),
            tag: tag.to_owned(),
            message: message.into(),
        }
        .into()
    }

    fn read(&self, value: &Yaml) -> Result<Value, BuildError> {
        let Yaml::String(rel) = value else {
            return Err(self.builder_error("read", "expected a file path"));
        };
        let path = self.config_dir.join(rel);
        std::fs::read_to_string(&path)
            .map(Value::String)
            .map_err(|e| self.builder_error("read", format!("{}: {e}", path.display())))
    }

    fn exec(&self, value: &Yaml) -> Result<Value, BuildError> {
        if !self.allow_exec {
            return Err(ConfigurationError::ExecDisabled {
                path: self.config_path.to_path_buf(),
            }
            .into());
        }
        let argv: Vec<String> = match value {
            Yaml::String(cmd) => cmd.split_whitespace().map(str::to_owned).collect(),
            Yaml::Sequence(items) => items
                .iter()
                .map(|item| scalar_to_string(item).ok_or_else(|| self.builder_error("exec", "arguments must be scalars")))
                .collect::<Result<_, _>>()?,
            _ => return Err(self.builder_error("exec", "expected a command or a list")),
        };
        let Some((program, args)) = argv.split_first() else {
            return Err(self.builder_error("exec", "empty command"));
        };

        tracing::debug!(program, dir = %self.config_dir.display(), "Running configuration command");
        let output = Command::new(program)
            .args(args)
            .current_dir(self.config_dir)
            .output()
            .map_err(|e| self.builder_error("exec", format!("{program}: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.builder_error(
                "exec",
                format!("{program} exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(Value::String(String::from_utf8_lossy(&output.stdout).trim().to_owned()))
    }

    fn path(&self, value: &Yaml) -> Result<Value, BuildError> {
        let Yaml::String(name) = value else {
            return Err(self.builder_error("path", "expected a link name"));
        };
        Ok(Value::String((self.resolve_path)(name)?))
    }

    fn markdown(&self, value: &Yaml) -> Result<Value, BuildError> {
        let Yaml::String(text) = value else {
            return Err(self.builder_error("markdown", "expected Markdown text"));
        };
        Ok(Value::String(self.compiler.compile(text)?.html))
    }

    /// Convert a YAML value to JSON, running builders for tagged values.
    fn convert(&self, value: &Yaml) -> Result<Value, BuildError> {
        Ok(match value {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => Value::Bool(*b),
            Yaml::Number(n) => number(n),
            Yaml::String(s) => Value::String(s.clone()),
            Yaml::Sequence(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.convert(item))
                    .collect::<Result<_, _>>()?,
            ),
            Yaml::Mapping(mapping) => {
                let mut map = Map::new();
                for (key, item) in mapping {
                    let key = scalar_to_string(key).ok_or_else(|| {
                        BuildError::from(ConfigurationError::NotAMapping {
                            path: self.config_path.to_path_buf(),
                        })
                    })?;
                    map.insert(key, self.convert(item)?);
                }
                Value::Object(map)
            }
            Yaml::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                let tag = tag.trim_start_matches('!');
                match tag {
                    "read" => self.read(&tagged.value)?,
                    "exec" => self.exec(&tagged.value)?,
                    "path" => self.path(&tagged.value)?,
                    "markdown" => self.markdown(&tagged.value)?,
                    other => {
                        return Err(ConfigurationError::UnknownBuilder {
                            path: self.config_path.to_path_buf(),
                            tag: other.to_owned(),
                        }
                        .into());
                    }
                }
            }
        })
    }
}

fn number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }
}

fn scalar_to_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Bool(b) => Some(b.to_string()),
        Yaml::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Evaluate a configuration file's source.
///
/// # Errors
///
/// Returns configuration errors for malformed YAML, unknown or failing
/// builders, a non-string title and an invalid `skip`.
pub fn evaluate(source: &str, ctx: &BuilderContext<'_>) -> Result<DirConfig, BuildError> {
    let yaml: Yaml = serde_yaml::from_str(source).map_err(|source| ConfigurationError::Yaml {
        path: ctx.config_path.to_path_buf(),
        source,
    })?;
    let mapping = match yaml {
        Yaml::Null => return Ok(DirConfig::default()),
        Yaml::Mapping(mapping) => mapping,
        _ => {
            return Err(ConfigurationError::NotAMapping {
                path: ctx.config_path.to_path_buf(),
            }
            .into());
        }
    };

    let mut config = DirConfig::default();
    for (key, value) in &mapping {
        let Some(key) = scalar_to_string(key) else {
            return Err(ConfigurationError::NotAMapping {
                path: ctx.config_path.to_path_buf(),
            }
            .into());
        };
        if key.starts_with('_') {
            continue;
        }
        let value = ctx.convert(value)?;
        match key.as_str() {
            "title" => match value {
                Value::String(title) => config.title = Some(title),
                _ => {
                    return Err(ctx.builder_error("title", "title must be a string"));
                }
            },
            "skip" => {
                skip_list(&value, ctx.config_path)?;
                config.bindings.insert(key, value);
            }
            _ => {
                config.bindings.insert(key, value);
            }
        }
    }
    Ok(config)
}

/// Validate a `skip` binding.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidSkip`] unless `value` is a list of
/// strings.
pub fn skip_list(value: &Value, origin: &Path) -> Result<Vec<String>, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidSkip {
        path: origin.to_path_buf(),
    };
    let Value::Array(items) = value else {
        return Err(invalid());
    };
    items
        .iter()
        .map(|item| item.as_str().map(str::to_owned).ok_or_else(invalid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use weft_renderer::CommonMarkCompiler;

    fn resolve(name: &str) -> Result<String, LinkError> {
        match name {
            "home" => Ok("../".to_owned()),
            _ => Err(LinkError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    fn eval_in(dir: &Path, source: &str, allow_exec: bool) -> Result<DirConfig, BuildError> {
        let compiler = CommonMarkCompiler::new();
        let config_path = dir.join("_config.yaml");
        let ctx = BuilderContext {
            config_path: &config_path,
            config_dir: dir,
            allow_exec,
            compiler: &compiler,
            resolve_path: &resolve,
        };
        evaluate(source, &ctx)
    }

    fn eval(source: &str) -> Result<DirConfig, BuildError> {
        eval_in(Path::new("/content"), source, false)
    }

    #[test]
    fn test_plain_bindings() {
        let config = eval("author: Ada\ntags: [a, b]\ncount: 3\nratio: 0.5\n").unwrap();
        assert_eq!(config.bindings.get("author"), Some(&json!("Ada")));
        assert_eq!(config.bindings.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(config.bindings.get("count"), Some(&json!(3)));
        assert_eq!(config.bindings.get("ratio"), Some(&json!(0.5)));
        assert_eq!(config.title, None);
    }

    #[test]
    fn test_empty_file() {
        assert_eq!(eval("").unwrap(), DirConfig::default());
    }

    #[test]
    fn test_private_keys_dropped() {
        let config = eval("_scratch: 1\nkept: 2\n").unwrap();
        assert_eq!(config.bindings.keys().collect::<Vec<_>>(), vec!["kept"]);
    }

    #[test]
    fn test_title_not_bound() {
        let config = eval("title: Guides\n").unwrap();
        assert_eq!(config.title.as_deref(), Some("Guides"));
        assert!(!config.bindings.contains_key("title"));
    }

    #[test]
    fn test_skip_must_be_list_of_strings() {
        let config = eval("skip: [drafts, old-post]\n").unwrap();
        assert_eq!(config.bindings.get("skip"), Some(&json!(["drafts", "old-post"])));

        let err = eval("skip: drafts\n").unwrap_err();
        assert!(matches!(err, BuildError::Configuration(ConfigurationError::InvalidSkip { .. })));
        let err = eval("skip: [1, 2]\n").unwrap_err();
        assert!(matches!(err, BuildError::Configuration(ConfigurationError::InvalidSkip { .. })));
    }

    #[test]
    fn test_read_relative_to_config_dir() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("footer.html"), "<footer/>").unwrap();
        let config = eval_in(temp.path(), "footer: !read footer.html\n", false).unwrap();
        assert_eq!(config.bindings.get("footer"), Some(&json!("<footer/>")));
    }

    #[test]
    fn test_read_missing_file_is_builder_error() {
        let err = eval("x: !read nope.txt\n").unwrap_err();
        assert!(matches!(err, BuildError::Configuration(ConfigurationError::Builder { .. })));
    }

    #[test]
    fn test_path_builder() {
        let config = eval("home: !path home\n").unwrap();
        assert_eq!(config.bindings.get("home"), Some(&json!("../")));
        assert!(matches!(eval("x: !path nowhere\n"), Err(BuildError::Link(_))));
    }

    #[test]
    fn test_markdown_builder() {
        let config = eval("blurb: !markdown '*hi*'\n").unwrap();
        assert_eq!(config.bindings.get("blurb"), Some(&json!("<p><em>hi</em></p>\n")));
    }

    #[test]
    fn test_nested_builders() {
        let config = eval("links:\n  - !path home\n  - plain\n").unwrap();
        assert_eq!(config.bindings.get("links"), Some(&json!(["../", "plain"])));
    }

    #[test]
    fn test_exec_disabled() {
        let err = eval("rev: !exec [git, rev-parse, HEAD]\n").unwrap_err();
        assert!(matches!(err, BuildError::Configuration(ConfigurationError::ExecDisabled { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_runs_in_config_dir() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "").unwrap();
        let config = eval_in(temp.path(), "listing: !exec ls\n", true).unwrap();
        assert_eq!(config.bindings.get("listing"), Some(&json!("marker.txt")));
    }

    #[test]
    fn test_unknown_builder() {
        let err = eval("x: !python 'print(1)'\n").unwrap_err();
        match err {
            BuildError::Configuration(ConfigurationError::UnknownBuilder { tag, .. }) => {
                assert_eq!(tag, "python");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_not_a_mapping() {
        assert!(matches!(
            eval("- a\n- b\n"),
            Err(BuildError::Configuration(ConfigurationError::NotAMapping { .. }))
        ));
        assert!(matches!(
            eval("a: [\n"),
            Err(BuildError::Configuration(ConfigurationError::Yaml { .. }))
        ));
    }
}
