//! End-to-end tests of `dump_page` with in-memory collaborators.
//!
//! The query provider and file fetcher are hardcoded; the archive writers
//! are the real zip/json writers pointed at a temp directory.

use anyhow::{bail, Result};
use async_trait::async_trait;
use page_dump::archive::{create_writer, read_dump};
use page_dump::dump::{dump_page, DumpOptions};
use page_dump::resolve::ResolveOptions;
use page_dump::traits::{FetchedFile, FileFetcher, QueryProvider};
use page_dump_core::query::is_shell;
use page_dump_core::{FollowLinksDirective, RawRecord, SyntheticProperty, VertexType};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const URL: &str = "https://firebasestorage.googleapis.com/v0/b/app.appspot.com/o/imgs%2Fflower.jpeg?alt=media&token=tok-1";

// ─── Test Provider ──────────────────────────────────────────────────

struct InMemoryProvider {
    shell: Vec<Value>,
    content: Vec<Value>,
}

#[async_trait]
impl QueryProvider for InMemoryProvider {
    async fn fetch_records(
        &self,
        _title: &str,
        follow_children: FollowLinksDirective,
        follow_refs: FollowLinksDirective,
    ) -> Result<Vec<RawRecord>> {
        let values = if is_shell(follow_children, follow_refs) {
            &self.shell
        } else {
            &self.content
        };
        Ok(values
            .iter()
            .map(|v| serde_json::from_value(v.clone()))
            .collect::<Result<_, _>>()?)
    }
}

fn root_page() -> InMemoryProvider {
    let root = json!({"id": 1, "uid": "p1", "title": "Root", "children": [{"id": 3}, {"id": 2}], "time": 1});
    InMemoryProvider {
        shell: vec![root.clone()],
        content: vec![
            root,
            json!({"id": 2, "uid": "b1", "string": "see [[Other]]", "order": 1, "heading": 2, "refs": [{"id": 4}]}),
            json!({"id": 3, "uid": "b2", "string": format!("pic ![]({})", URL), "order": 0}),
            json!({"id": 4, "uid": "o1", "title": "Other"}),
        ],
    }
}

// ─── Test Fetcher ───────────────────────────────────────────────────

struct InMemoryFetcher {
    files: HashMap<String, FetchedFile>,
}

impl InMemoryFetcher {
    fn flower() -> Self {
        let mut files = HashMap::new();
        files.insert(
            "tok-1".to_string(),
            FetchedFile {
                file_name: "flower.jpeg".to_string(),
                media_type: "image/jpeg".to_string(),
                last_modified: None,
                bytes: b"jpeg-bytes".to_vec(),
            },
        );
        Self { files }
    }

    fn empty() -> Self {
        Self {
            files: HashMap::new(),
        }
    }
}

#[async_trait]
impl FileFetcher for InMemoryFetcher {
    async fn fetch(&self, uid: &str, _source: &str) -> Result<FetchedFile> {
        match self.files.get(uid) {
            Some(file) => Ok(file.clone()),
            None => bail!("404 for {}", uid),
        }
    }
}

fn options() -> DumpOptions {
    DumpOptions {
        follow_children: FollowLinksDirective::Deep,
        follow_refs: FollowLinksDirective::Deep,
        include_properties: ["uid", "string", "title", "children", "order", "refs", "id", "heading"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        add_properties: vec![SyntheticProperty::VertexType, SyntheticProperty::MediaType],
        resolve: ResolveOptions {
            max_concurrency: 4,
            timeout: Duration::from_secs(5),
        },
    }
}

fn read_zip_entry(path: &std::path::Path, name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut out = Vec::new();
    entry.read_to_end(&mut out).unwrap();
    out
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dump_to_zip() {
    let tmp = TempDir::new().unwrap();
    let writer = create_writer("zip", tmp.path(), "Root").unwrap();
    let report = dump_page(
        "Root",
        &options(),
        &root_page(),
        Arc::new(InMemoryFetcher::flower()),
        writer,
    )
    .await
    .unwrap();

    assert_eq!(report.output, tmp.path().join("Root.zip"));
    assert_eq!(report.files, 1);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.vertex_counts.get("roam/page"), Some(&2));
    assert_eq!(report.total_vertices(), 5);

    let graph: Value =
        serde_json::from_slice(&read_zip_entry(&report.output, "Root/Root.json")).unwrap();
    assert_eq!(
        graph,
        json!([
            {"uid": "p1", "text": "Root", "children": ["b2", "b1"],
             "vertex-type": "roam/page", "media-type": "text/plain"},
            {"uid": "b1", "text": "see [[o1]]", "refs": ["o1"], "heading": 2,
             "vertex-type": "roam/block-heading", "media-type": "text/plain"},
            {"uid": "b2", "text": "pic ![](<<tok-1>>)", "refs": ["tok-1"],
             "vertex-type": "roam/block-content", "media-type": "text/plain"},
            {"uid": "tok-1", "source": URL, "file-name": "flower.jpeg",
             "vertex-type": "roam/file", "media-type": "image/jpeg"},
            {"uid": "o1", "text": "Other",
             "vertex-type": "roam/page", "media-type": "text/plain"}
        ])
    );
    assert_eq!(
        read_zip_entry(&report.output, "Root/files/flower.jpeg"),
        b"jpeg-bytes"
    );

    let vertices = read_dump(&report.output).unwrap();
    assert_eq!(vertices[3].vertex_type, VertexType::ExternalFile);
}

#[tokio::test]
async fn test_dump_to_json_still_resolves_files() {
    let tmp = TempDir::new().unwrap();
    let writer = create_writer("json", tmp.path(), "Root").unwrap();
    let report = dump_page(
        "Root",
        &options(),
        &root_page(),
        Arc::new(InMemoryFetcher::flower()),
        writer,
    )
    .await
    .unwrap();

    let text = std::fs::read_to_string(&report.output).unwrap();
    assert!(text.starts_with("[\n    {"), "{}", text);
    let vertices = read_dump(&report.output).unwrap();
    assert_eq!(vertices[3].file_name.as_deref(), Some("flower.jpeg"));
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_hostile_file_name_stays_under_files_dir() {
    let tmp = TempDir::new().unwrap();
    let mut fetcher = InMemoryFetcher::flower();
    if let Some(file) = fetcher.files.get_mut("tok-1") {
        file.file_name = "../../../evil.sh".to_string();
    }
    let writer = create_writer("zip", tmp.path(), "Root").unwrap();
    let report = dump_page("Root", &options(), &root_page(), Arc::new(fetcher), writer)
        .await
        .unwrap();

    let archive = zip::ZipArchive::new(std::fs::File::open(&report.output).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["Root/", "Root/Root.json", "Root/files/evil.sh"]);
    for name in names.iter().filter(|n| n.starts_with("Root/files/")) {
        let rest = &name["Root/files/".len()..];
        assert!(!rest.contains(['/', '\\']) && rest != ".." && rest != ".", "{}", name);
    }

    let vertices = read_dump(&report.output).unwrap();
    assert_eq!(vertices[3].file_name.as_deref(), Some("evil.sh"));
}

#[tokio::test]
async fn test_fetch_failure_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let writer = create_writer("zip", tmp.path(), "Root").unwrap();
    let err = dump_page(
        "Root",
        &options(),
        &root_page(),
        Arc::new(InMemoryFetcher::empty()),
        writer,
    )
    .await
    .unwrap_err();

    assert!(format!("{:#}", err).contains("tok-1"));
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_dangling_child_fails_before_fetching() {
    let tmp = TempDir::new().unwrap();
    let mut provider = root_page();
    provider.content.retain(|r| r["uid"] != "b1");
    let writer = create_writer("zip", tmp.path(), "Root").unwrap();
    let err = dump_page(
        "Root",
        &options(),
        &provider,
        Arc::new(InMemoryFetcher::flower()),
        writer,
    )
    .await
    .unwrap_err();

    assert!(format!("{:#}", err).contains("children"), "{:#}", err);
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_page() {
    let tmp = TempDir::new().unwrap();
    let provider = InMemoryProvider {
        shell: vec![],
        content: vec![],
    };
    let writer = create_writer("json", tmp.path(), "Nope").unwrap();
    let err = dump_page(
        "Nope",
        &options(),
        &provider,
        Arc::new(InMemoryFetcher::empty()),
        writer,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("No page titled 'Nope'"));
}

#[tokio::test]
async fn test_property_selection_drops_heading() {
    let tmp = TempDir::new().unwrap();
    let mut opts = options();
    opts.include_properties.retain(|p| p != "heading");
    opts.add_properties = vec![SyntheticProperty::VertexType];
    let writer = create_writer("json", tmp.path(), "Root").unwrap();
    let report = dump_page(
        "Root",
        &opts,
        &root_page(),
        Arc::new(InMemoryFetcher::flower()),
        writer,
    )
    .await
    .unwrap();

    let graph: Value = serde_json::from_slice(&std::fs::read(&report.output).unwrap()).unwrap();
    assert_eq!(graph[1]["vertex-type"], "roam/block-content");
    assert!(graph[1].get("heading").is_none());
    assert!(graph[1].get("media-type").is_none());
}
