//! TOML configuration parsing and validation.
//!
//! Everything that can be rejected is rejected here, before any record is
//! fetched: unknown synthetic properties, unknown provider/fetcher kinds,
//! and missing settings for the chosen kinds.

use anyhow::{bail, Context, Result};
use page_dump_core::{FollowLinksDirective, SyntheticProperty};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub dump: DumpConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DumpConfig {
    #[serde(default = "default_follow")]
    pub follow_children: FollowLinksDirective,
    #[serde(default = "default_follow")]
    pub follow_refs: FollowLinksDirective,
    #[serde(default = "default_include_properties")]
    pub include_properties: Vec<String>,
    #[serde(default = "default_add_properties")]
    pub add_properties: Vec<String>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            follow_children: default_follow(),
            follow_refs: default_follow(),
            include_properties: default_include_properties(),
            add_properties: default_add_properties(),
        }
    }
}

fn default_follow() -> FollowLinksDirective {
    FollowLinksDirective::Deep
}

fn default_include_properties() -> Vec<String> {
    ["uid", "string", "title", "children", "order", "refs", "id", "heading"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_add_properties() -> Vec<String> {
    vec!["vertex-type".to_string(), "media-type".to_string()]
}

impl DumpConfig {
    /// Parsed synthetic properties, in configured order.
    pub fn synthetic_properties(&self) -> Result<Vec<SyntheticProperty>> {
        Ok(SyntheticProperty::parse_all(&self.add_properties)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: String,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_source_kind() -> String {
    "file".to_string()
}
fn default_token_env() -> String {
    "ROAM_API_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_kind")]
    pub kind: String,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            kind: default_fetch_kind(),
            dir: None,
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_fetch_kind() -> String {
    "http".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: default_format(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./out")
}
fn default_format() -> String {
    "zip".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    // Validate dump
    config
        .dump
        .synthetic_properties()
        .context("Invalid dump.add_properties")?;
    for required in ["uid", "id"] {
        if !config.dump.include_properties.iter().any(|p| p == required) {
            bail!("dump.include_properties must contain '{}'", required);
        }
    }

    // Validate source
    match config.source.kind.as_str() {
        "file" => {
            if config.source.dir.is_none() {
                bail!("source.dir must be set when source.kind is 'file'");
            }
        }
        "http" => {
            if config.source.endpoint.is_none() {
                bail!("source.endpoint must be set when source.kind is 'http'");
            }
        }
        other => bail!("Unknown source kind: '{}'. Must be file or http.", other),
    }
    if config.source.timeout_secs == 0 {
        bail!("source.timeout_secs must be > 0");
    }

    // Validate fetch
    match config.fetch.kind.as_str() {
        "http" => {}
        "dir" => {
            if config.fetch.dir.is_none() {
                bail!("fetch.dir must be set when fetch.kind is 'dir'");
            }
        }
        other => bail!("Unknown fetch kind: '{}'. Must be http or dir.", other),
    }
    if config.fetch.timeout_secs == 0 {
        bail!("fetch.timeout_secs must be > 0");
    }
    if config.fetch.max_concurrency == 0 {
        bail!("fetch.max_concurrency must be > 0");
    }

    // Validate output
    match config.output.format.as_str() {
        "zip" | "json" => {}
        other => bail!("Unknown output format: '{}'. Must be zip or json.", other),
    }

    Ok(())
}
