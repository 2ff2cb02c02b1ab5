//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod watch;

pub(crate) use build::BuildArgs;
pub(crate) use watch::WatchArgs;

use std::path::PathBuf;

use clap::Args;
use serde_json::{Map, Value};
use weft_config::{CliSettings, Config};
use weft_site::SiteConfig;
use weft_storage::CrawlOptions;

use crate::error::CliError;
use crate::output::Output;

/// Arguments shared by every command.
#[derive(Args)]
pub(crate) struct SiteArgs {
    /// Path to configuration file (default: auto-discover weft.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Content source directory (overrides config).
    #[arg(long)]
    content: Option<PathBuf>,

    /// Output directory (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Replace an existing output directory.
    #[arg(long)]
    clear_output: bool,

    /// Copy static assets instead of symlinking them.
    #[arg(long)]
    copy_assets: bool,

    /// Extra root bindings as a JSON object.
    #[arg(long, value_name = "JSON")]
    seed: Option<String>,

    /// Glob pattern (relative to the content root) to exclude; repeatable.
    #[arg(long, value_name = "GLOB")]
    ignore: Vec<String>,

    /// Enable verbose output (per-file progress).
    #[arg(short, long)]
    pub verbose: bool,
}

impl SiteArgs {
    /// Load configuration with these arguments applied.
    pub(crate) fn load(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            source_dir: self.content.clone(),
            output_dir: self.output.clone(),
            clear_output: self.clear_output.then_some(true),
            copy_assets: self.copy_assets.then_some(true),
            seed: self.seed.as_deref().map(parse_seed).transpose()?,
            ignore: self.ignore.clone(),
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }
}

/// Parse `--seed` into a binding map.
fn parse_seed(raw: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::Validation("--seed must be a JSON object".to_owned())),
        Err(e) => Err(CliError::Validation(format!("Invalid --seed: {e}"))),
    }
}

/// Map loaded settings to the site engine's configuration.
pub(crate) fn site_config(config: &Config) -> SiteConfig {
    let content = &config.content_resolved;
    SiteConfig {
        source_dir: content.source_dir.clone(),
        output_dir: content.output_dir.clone(),
        config_filename: content.config_filename.clone(),
        crawl: CrawlOptions {
            markup_extension: content.markup_extension.clone(),
            scripted_marker: content.scripted_marker.clone(),
            index_name: content.index_name.clone(),
        },
        ignore: content.ignore.clone(),
        clear_output: config.build.clear_output,
        copy_assets: config.build.copy_assets,
        allow_exec: config.build.allow_exec,
        seed: config.build.seed.clone(),
    }
}

/// Print the resolved directories.
pub(crate) fn print_paths(output: &Output, config: &Config) {
    if let Some(path) = &config.config_path {
        output.info(&format!("Config: {}", path.display()));
    }
    output.info(&format!(
        "Content directory: {}",
        config.content_resolved.source_dir.display()
    ));
    output.info(&format!(
        "Output directory: {}",
        config.content_resolved.output_dir.display()
    ));
}
