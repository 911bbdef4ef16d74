//! Concurrent resolution of external file vertices.
//!
//! One task per unresolved file vertex, bounded by a semaphore and a
//! per-fetch timeout. Resolution is all-or-nothing: the first failure
//! aborts the remaining tasks and the extraction.
//!
//! Results are attached by uid, so completion order never affects the
//! output. Fetched names are reduced to a single path component before
//! they reach the archive, then made unique in vertex order: a later file
//! whose name is already taken is renamed to `<uid>-<file_name>`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use page_dump_core::{Vertex, VertexType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::traits::{FetchedFile, FileFetcher};

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub max_concurrency: usize,
    pub timeout: Duration,
}

/// Content of one resolved file, ready for the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    pub uid: String,
    pub file_name: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub bytes: Vec<u8>,
}

/// The enriched graph plus file contents in vertex order.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub vertices: Vec<Vertex>,
    pub files: Vec<ResolvedFile>,
}

/// Fetch every file vertex and return the graph with `file-name` and
/// `media-type` attached.
pub async fn resolve_files(
    vertices: Vec<Vertex>,
    fetcher: Arc<dyn FileFetcher>,
    options: &ResolveOptions,
) -> Result<Resolution> {
    let pending: Vec<(String, String)> = vertices
        .iter()
        .filter(|v| v.vertex_type == VertexType::ExternalFile)
        .filter_map(|v| v.source.clone().map(|s| (v.uid.clone(), s)))
        .collect();

    if pending.is_empty() {
        return Ok(Resolution {
            vertices,
            files: Vec::new(),
        });
    }
    tracing::info!(
        files = pending.len(),
        max_concurrency = options.max_concurrency,
        "resolving external files"
    );

    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let mut join_set = JoinSet::new();
    for (uid, source) in pending {
        let fetcher = Arc::clone(&fetcher);
        let semaphore = Arc::clone(&semaphore);
        let timeout = options.timeout;
        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| anyhow!("fetch pool closed: {}", e))?;
            let fetched = tokio::time::timeout(timeout, fetcher.fetch(&uid, &source))
                .await
                .map_err(|_| anyhow!("timed out after {:?}", timeout))
                .and_then(|r| r)
                .with_context(|| format!("Failed to resolve file {} ({})", uid, source))?;
            Ok::<_, anyhow::Error>((uid, fetched))
        });
    }

    let mut fetched: HashMap<String, FetchedFile> = HashMap::new();
    while let Some(joined) = join_set.join_next().await {
        let outcome = joined.map_err(|e| anyhow!("file fetch task failed: {}", e))?;
        match outcome {
            Ok((uid, file)) => {
                tracing::debug!(%uid, file_name = %file.file_name, "file resolved");
                fetched.insert(uid, file);
            }
            Err(e) => {
                join_set.abort_all();
                return Err(e);
            }
        }
    }

    attach(vertices, fetched)
}

fn attach(vertices: Vec<Vertex>, mut fetched: HashMap<String, FetchedFile>) -> Result<Resolution> {
    let mut taken = HashSet::new();
    let mut files = Vec::new();
    let mut out = Vec::with_capacity(vertices.len());

    for vertex in vertices {
        let Some(file) = fetched.remove(&vertex.uid) else {
            out.push(vertex);
            continue;
        };
        let file_name = unique_file_name(
            &vertex.uid,
            &safe_file_name(&vertex.uid, &file.file_name),
            &mut taken,
        );
        if file_name != file.file_name {
            tracing::warn!(
                uid = %vertex.uid,
                original = %file.file_name,
                renamed = %file_name,
                "file name collision"
            );
        }
        out.push(vertex.resolved(file_name.clone(), file.media_type));
        files.push(ResolvedFile {
            uid: vertex.uid,
            file_name,
            last_modified: file.last_modified,
            bytes: file.bytes,
        });
    }

    Ok(Resolution {
        vertices: out,
        files,
    })
}

/// Last `/` or `\` separated component of `file_name` without control
/// characters. Falls back to `uid` when nothing usable is left.
fn safe_file_name(uid: &str, file_name: &str) -> String {
    let last = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        uid.to_string()
    } else {
        cleaned.to_string()
    }
}

fn unique_file_name(uid: &str, file_name: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = file_name.to_string();
    let mut prefix = uid.to_string();
    while taken.contains(&candidate) {
        candidate = format!("{}-{}", prefix, file_name);
        prefix.push_str(&format!("-{}", uid));
    }
    taken.insert(candidate.clone());
    candidate
}
