//! Query provider backed by pre-exported JSON files.
//!
//! Reads `<dir>/<title>-shell-input.json` when neither relation is
//! followed and `<dir>/<title>-content-input.json` otherwise. The files
//! hold either a flat array of records or the host's raw query result, an
//! array of single-record arrays.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use page_dump_core::query::is_shell;
use page_dump_core::{FollowLinksDirective, RawRecord};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::traits::QueryProvider;

pub struct FileQueryProvider {
    dir: PathBuf,
}

impl FileQueryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Input file consulted for `title` under the given directives.
    pub fn input_path(
        &self,
        title: &str,
        follow_children: FollowLinksDirective,
        follow_refs: FollowLinksDirective,
    ) -> PathBuf {
        let entity = if is_shell(follow_children, follow_refs) {
            "shell"
        } else {
            "content"
        };
        self.dir.join(format!("{}-{}-input.json", title, entity))
    }
}

#[async_trait]
impl QueryProvider for FileQueryProvider {
    async fn fetch_records(
        &self,
        title: &str,
        follow_children: FollowLinksDirective,
        follow_refs: FollowLinksDirective,
    ) -> Result<Vec<RawRecord>> {
        let path = self.input_path(title, follow_children, follow_refs);
        tracing::debug!(path = %path.display(), "reading query input");
        read_records(&path).await
    }
}

async fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read query input: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    parse_records(value).with_context(|| format!("Invalid records in {}", path.display()))
}

/// Flatten a query result (flat, or an array of single-record arrays) and
/// deserialize each record.
pub fn parse_records(value: Value) -> Result<Vec<RawRecord>> {
    let Value::Array(items) = value else {
        bail!("expected a JSON array of records");
    };
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(nested) => {
                for inner in nested {
                    records.push(parse_record(inner)?);
                }
            }
            other => records.push(parse_record(other)?),
        }
    }
    Ok(records)
}

fn parse_record(value: Value) -> Result<RawRecord> {
    let summary = value.get("uid").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).with_context(|| format!("Malformed record (uid {})", summary))
}
