//! Configuration management for weft.
//!
//! Parses `weft.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Directory settings support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `content.source_dir`
//! - `content.output_dir`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override content source directory.
    pub source_dir: Option<PathBuf>,
    /// Override output directory.
    pub output_dir: Option<PathBuf>,
    /// Override the clear-output flag.
    pub clear_output: Option<bool>,
    /// Override the copy-assets flag.
    pub copy_assets: Option<bool>,
    /// Extra seed bindings, merged over the configured seed.
    pub seed: Option<serde_json::Map<String, serde_json::Value>>,
    /// Additional ignore patterns.
    pub ignore: Vec<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "weft.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Content configuration (paths are relative strings from TOML).
    content: ContentConfigRaw,
    /// Build behaviour.
    pub build: BuildConfig,
    /// Watch mode configuration.
    pub watch: WatchConfig,

    /// Resolved content configuration (set after loading).
    #[serde(skip)]
    pub content_resolved: ContentConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    #[allow(clippy::derivable_impls)]
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw content configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ContentConfigRaw {
    source_dir: Option<String>,
    output_dir: Option<String>,
    config_filename: Option<String>,
    markup_extension: Option<String>,
    scripted_marker: Option<String>,
    index_name: Option<String>,
    ignore: Vec<String>,
}

/// Resolved content configuration with absolute paths.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Content tree root.
    pub source_dir: PathBuf,
    /// Output directory for the generated site.
    pub output_dir: PathBuf,
    /// Reserved per-directory configuration filename.
    pub config_filename: String,
    /// Extension (without dot) of markup pages.
    pub markup_extension: String,
    /// Marker segment identifying scripted pages (`name.<marker>.ext`).
    pub scripted_marker: String,
    /// Base name of index pages.
    pub index_name: String,
    /// Glob patterns (relative to the content root) to ignore entirely.
    pub ignore: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("content"),
            output_dir: PathBuf::from("site"),
            config_filename: "_config.yaml".to_owned(),
            markup_extension: "md".to_owned(),
            scripted_marker: "tpl".to_owned(),
            index_name: "index".to_owned(),
            ignore: Vec::new(),
        }
    }
}

/// Build behaviour configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Delete an existing output directory before publishing.
    pub clear_output: bool,
    /// Copy static assets instead of symlinking them.
    pub copy_assets: bool,
    /// Allow directory configuration to run external processes (`!exec`).
    pub allow_exec: bool,
    /// Seed bindings for the root environment frame.
    pub seed: serde_json::Map<String, serde_json::Value>,
}

/// Watch mode configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet window before a batch of changes triggers a rebuild.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

impl WatchConfig {
    /// Debounce window as a [`Duration`].
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`content.source_dir`").
        field: String,
        /// Error message (e.g., "${`SITE_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a name to be a single dot-free segment.
fn require_plain_segment(value: &str, field: &str) -> Result<(), ConfigError> {
    require_non_empty(value, field)?;
    if value.contains(['.', '/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "{field} must not contain '.', '/' or '\\'"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `weft.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails, or
    /// the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.content_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(output_dir) = &settings.output_dir {
            self.content_resolved.output_dir.clone_from(output_dir);
        }
        if let Some(clear_output) = settings.clear_output {
            self.build.clear_output = clear_output;
        }
        if let Some(copy_assets) = settings.copy_assets {
            self.build.copy_assets = copy_assets;
        }
        if let Some(seed) = &settings.seed {
            for (key, value) in seed {
                self.build.seed.insert(key.clone(), value.clone());
            }
        }
        self.content_resolved
            .ignore
            .extend(settings.ignore.iter().cloned());
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let defaults = ContentConfig::default();
        Self {
            content: ContentConfigRaw::default(),
            build: BuildConfig::default(),
            watch: WatchConfig::default(),
            content_resolved: ContentConfig {
                source_dir: base.join(&defaults.source_dir),
                output_dir: base.join(&defaults.output_dir),
                ..defaults
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically by [`Config::load`] after CLI settings are applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_content()?;
        self.validate_watch()?;
        Ok(())
    }

    /// Validate content configuration.
    fn validate_content(&self) -> Result<(), ConfigError> {
        let content = &self.content_resolved;
        require_non_empty(&content.config_filename, "content.config_filename")?;
        require_plain_segment(&content.markup_extension, "content.markup_extension")?;
        require_plain_segment(&content.scripted_marker, "content.scripted_marker")?;
        require_plain_segment(&content.index_name, "content.index_name")?;

        if content.source_dir == content.output_dir {
            return Err(ConfigError::Validation(
                "content.output_dir must differ from content.source_dir".to_owned(),
            ));
        }

        for pattern in &content.ignore {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("content.ignore pattern '{pattern}': {e}"))
            })?;
        }

        Ok(())
    }

    /// Validate watch configuration.
    fn validate_watch(&self) -> Result<(), ConfigError> {
        const MIN_DEBOUNCE_MS: u64 = 10;
        const MAX_DEBOUNCE_MS: u64 = 10_000;

        let ms = self.watch.debounce_ms;
        if !(MIN_DEBOUNCE_MS..=MAX_DEBOUNCE_MS).contains(&ms) {
            return Err(ConfigError::Validation(format!(
                "watch.debounce_ms must be between {MIN_DEBOUNCE_MS} and {MAX_DEBOUNCE_MS}"
            )));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.content.source_dir {
            self.content.source_dir = Some(expand::expand_env(dir, "content.source_dir")?);
        }
        if let Some(ref dir) = self.content.output_dir {
            self.content.output_dir = Some(expand::expand_env(dir, "content.output_dir")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let defaults = ContentConfig::default();
        let raw = &self.content;
        let resolve = |path: Option<&str>, default: &Path| {
            path.map_or_else(|| config_dir.join(default), |p| config_dir.join(p))
        };

        self.content_resolved = ContentConfig {
            source_dir: resolve(raw.source_dir.as_deref(), &defaults.source_dir),
            output_dir: resolve(raw.output_dir.as_deref(), &defaults.output_dir),
            config_filename: raw
                .config_filename
                .clone()
                .unwrap_or(defaults.config_filename),
            markup_extension: raw
                .markup_extension
                .clone()
                .unwrap_or(defaults.markup_extension),
            scripted_marker: raw
                .scripted_marker
                .clone()
                .unwrap_or(defaults.scripted_marker),
            index_name: raw.index_name.clone().unwrap_or(defaults.index_name),
            ignore: raw.ignore.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        let content = &config.content_resolved;
        assert_eq!(content.source_dir, PathBuf::from("/test/content"));
        assert_eq!(content.output_dir, PathBuf::from("/test/site"));
        assert_eq!(content.config_filename, "_config.yaml");
        assert_eq!(content.markup_extension, "md");
        assert_eq!(content.scripted_marker, "tpl");
        assert_eq!(content.index_name, "index");
        assert!(!config.build.clear_output);
        assert!(!config.build.copy_assets);
        assert!(!config.build.allow_exec);
        assert_eq!(config.watch.debounce(), Duration::from_millis(200));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.build.seed.is_empty());
        assert_eq!(config.watch.debounce_ms, 200);
    }

    #[test]
    fn test_parse_build_config() {
        let toml = r#"
[build]
clear_output = true
copy_assets = true
allow_exec = true

[build.seed]
site_name = "Notes"
year = 2024
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.build.clear_output);
        assert!(config.build.copy_assets);
        assert!(config.build.allow_exec);
        assert_eq!(
            config.build.seed.get("site_name"),
            Some(&serde_json::json!("Notes"))
        );
        assert_eq!(config.build.seed.get("year"), Some(&serde_json::json!(2024)));
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[content]
source_dir = "pages"
output_dir = "public"
config_filename = "dir.yaml"
scripted_marker = "tmpl"
ignore = ["drafts/**"]
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        let content = &config.content_resolved;
        assert_eq!(content.source_dir, PathBuf::from("/project/pages"));
        assert_eq!(content.output_dir, PathBuf::from("/project/public"));
        assert_eq!(content.config_filename, "dir.yaml");
        assert_eq!(content.scripted_marker, "tmpl");
        assert_eq!(content.markup_extension, "md");
        assert_eq!(content.ignore, vec!["drafts/**".to_owned()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[content]\nsource_dir = \"src\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.content_resolved.source_dir, dir.path().join("src"));
        assert_eq!(config.content_resolved.output_dir, dir.path().join("site"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/weft.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_cli_settings_override() {
        let mut config = Config::default_with_base(Path::new("/base"));
        let mut seed = serde_json::Map::new();
        seed.insert("author".to_owned(), serde_json::json!("Ada"));

        config.apply_cli_settings(&CliSettings {
            source_dir: Some(PathBuf::from("/elsewhere/content")),
            output_dir: None,
            clear_output: Some(true),
            copy_assets: None,
            seed: Some(seed),
            ignore: vec!["tmp".to_owned()],
        });

        assert_eq!(
            config.content_resolved.source_dir,
            PathBuf::from("/elsewhere/content")
        );
        assert_eq!(config.content_resolved.output_dir, PathBuf::from("/base/site"));
        assert!(config.build.clear_output);
        assert!(!config.build.copy_assets);
        assert_eq!(config.build.seed.get("author"), Some(&serde_json::json!("Ada")));
        assert_eq!(config.content_resolved.ignore, vec!["tmp".to_owned()]);
    }

    #[test]
    fn test_validate_rejects_marker_with_dot() {
        let mut config = Config::default_with_base(Path::new("/base"));
        config.content_resolved.scripted_marker = "t.pl".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("content.scripted_marker"));
    }

    #[test]
    fn test_validate_rejects_same_source_and_output() {
        let mut config = Config::default_with_base(Path::new("/base"));
        config.content_resolved.output_dir = config.content_resolved.source_dir.clone();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_bad_ignore_pattern() {
        let mut config = Config::default_with_base(Path::new("/base"));
        config.content_resolved.ignore.push("[".to_owned());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_debounce_range() {
        let mut config = Config::default_with_base(Path::new("/base"));
        config.watch.debounce_ms = 0;
        assert!(config.validate().is_err());
        config.watch.debounce_ms = 500;
        assert!(config.validate().is_ok());
    }
}
