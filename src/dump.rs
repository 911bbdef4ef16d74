//! The page dump pipeline.
//!
//! ```text
//! shell fetch ─┐
//!              ├─▶ concat ─▶ dedupe ids ─▶ pick ─▶ assemble ─▶ resolve files
//! content fetch┘                                                   │
//!        finish ◀── write files ◀── write graph ◀── render ◀── validate (warn)
//! ```
//!
//! Nothing is written to the archive until every file has resolved; any
//! earlier failure drops the writer and leaves no container behind.

use anyhow::{bail, Context, Result};
use page_dump_core::validate::{validate, ValidationFailure};
use page_dump_core::{
    assemble_graph, render_vertices, FollowLinksDirective, RawRecord, SyntheticProperty, Vertex,
};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::archive::{file_entry_path, graph_entry_path, to_pretty_json};
use crate::config::Config;
use crate::fetch_dir::DirFileFetcher;
use crate::fetch_http::HttpFileFetcher;
use crate::provider_file::FileQueryProvider;
use crate::provider_http::HttpQueryProvider;
use crate::resolve::{resolve_files, ResolveOptions};
use crate::traits::{ArchiveWriter, FileFetcher, QueryProvider};

/// Everything `dump_page` needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub follow_children: FollowLinksDirective,
    pub follow_refs: FollowLinksDirective,
    pub include_properties: Vec<String>,
    pub add_properties: Vec<SyntheticProperty>,
    pub resolve: ResolveOptions,
}

impl DumpOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            follow_children: config.dump.follow_children,
            follow_refs: config.dump.follow_refs,
            include_properties: config.dump.include_properties.clone(),
            add_properties: config.dump.synthetic_properties()?,
            resolve: ResolveOptions {
                max_concurrency: config.fetch.max_concurrency,
                timeout: Duration::from_secs(config.fetch.timeout_secs),
            },
        })
    }
}

/// Summary of one completed extraction.
#[derive(Debug, Clone)]
pub struct DumpReport {
    pub title: String,
    pub output: PathBuf,
    /// Vertex count per `vertex-type` wire name.
    pub vertex_counts: BTreeMap<&'static str, usize>,
    pub files: usize,
    pub failures: Vec<ValidationFailure>,
}

impl DumpReport {
    pub fn total_vertices(&self) -> usize {
        self.vertex_counts.values().sum()
    }
}

/// Extract the page titled `title` into `writer`.
pub async fn dump_page(
    title: &str,
    options: &DumpOptions,
    provider: &dyn QueryProvider,
    fetcher: Arc<dyn FileFetcher>,
    mut writer: Box<dyn ArchiveWriter>,
) -> Result<DumpReport> {
    tracing::info!(
        %title,
        follow_children = %options.follow_children,
        follow_refs = %options.follow_refs,
        "dumping page"
    );

    let shell = provider
        .fetch_records(
            title,
            FollowLinksDirective::DontFollow,
            FollowLinksDirective::DontFollow,
        )
        .await
        .with_context(|| format!("Failed to fetch page shell for '{}'", title))?;
    if shell.is_empty() {
        bail!("No page titled '{}'", title);
    }
    let content = provider
        .fetch_records(title, options.follow_children, options.follow_refs)
        .await
        .with_context(|| format!("Failed to fetch page content for '{}'", title))?;
    tracing::info!(shell = shell.len(), content = content.len(), "records fetched");

    let records: Vec<RawRecord> = dedupe_records(shell.into_iter().chain(content))
        .into_iter()
        .map(|r| r.pick(&options.include_properties))
        .collect();

    let vertices = assemble_graph(&records).context("Failed to normalize records")?;
    tracing::info!(vertices = vertices.len(), "graph assembled");

    let resolution = resolve_files(vertices, fetcher, &options.resolve).await?;

    let failures = validate(&resolution.vertices);
    for failure in &failures {
        tracing::warn!(rule = %failure.rule, "{}", failure.message);
    }

    let rendered = render_vertices(&resolution.vertices, &options.add_properties)
        .context("Failed to render graph")?;
    let name = writer.name().to_string();
    writer.add_entry(&graph_entry_path(&name), &to_pretty_json(&rendered)?, None)?;
    for file in &resolution.files {
        writer.add_entry(
            &file_entry_path(&name, &file.file_name),
            &file.bytes,
            file.last_modified,
        )?;
    }
    let output = writer.finish()?;

    let report = DumpReport {
        title: title.to_string(),
        output,
        vertex_counts: count_by_type(&resolution.vertices),
        files: resolution.files.len(),
        failures,
    };
    tracing::info!(
        output = %report.output.display(),
        vertices = report.total_vertices(),
        files = report.files,
        "dump complete"
    );
    Ok(report)
}

/// Query provider selected by `source.kind`.
pub fn provider_from_config(config: &Config) -> Result<Box<dyn QueryProvider>> {
    match config.source.kind.as_str() {
        "file" => {
            let dir = config.source.dir.clone().context("source.dir is not set")?;
            Ok(Box::new(FileQueryProvider::new(dir)))
        }
        "http" => Ok(Box::new(HttpQueryProvider::from_config(&config.source)?)),
        other => bail!("Unknown source kind: '{}'", other),
    }
}

/// File fetcher selected by `fetch.kind`.
pub fn fetcher_from_config(config: &Config) -> Result<Arc<dyn FileFetcher>> {
    match config.fetch.kind.as_str() {
        "http" => Ok(Arc::new(HttpFileFetcher::new(Duration::from_secs(
            config.fetch.timeout_secs,
        ))?)),
        "dir" => {
            let dir = config.fetch.dir.clone().context("fetch.dir is not set")?;
            Ok(Arc::new(DirFileFetcher::new(dir)))
        }
        other => bail!("Unknown fetch kind: '{}'", other),
    }
}

/// Keep the first record for each internal id. The shell and content
/// fetches both return the root page.
fn dedupe_records(records: impl IntoIterator<Item = RawRecord>) -> Vec<RawRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let first = seen.insert(r.id);
            if !first {
                tracing::debug!(uid = %r.uid, id = r.id, "dropping repeated record");
            }
            first
        })
        .collect()
}

fn count_by_type(vertices: &[Vertex]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for v in vertices {
        *counts.entry(v.vertex_type.as_str()).or_default() += 1;
    }
    counts
}
