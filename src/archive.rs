//! Output containers: a zip archive or a bare JSON file.
//!
//! # Zip layout
//!
//! ```text
//! <out>/<name>.zip
//! └── <name>/
//!     ├── <name>.json
//!     └── files/
//!         └── <file_name>
//! ```
//!
//! The JSON container is `<out>/<name>.json` holding the vertex array
//! only; file entries are skipped. Both are written to a temporary path
//! and renamed into place on [`ArchiveWriter::finish`], so a failed
//! extraction never leaves a partial container behind.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use page_dump_core::Vertex;
use serde_json::Value;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::traits::ArchiveWriter;

/// Largest graph JSON entry accepted when reading an archive back.
const MAX_GRAPH_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

/// Container base name for a page title: path separators become `_`.
pub fn archive_name(title: &str) -> String {
    title
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

/// `<name>/<name>.json`
pub fn graph_entry_path(name: &str) -> String {
    format!("{}/{}.json", name, name)
}

/// `<name>/files/<file_name>`
pub fn file_entry_path(name: &str, file_name: &str) -> String {
    format!("{}/files/{}", name, file_name)
}

/// Serialize the rendered vertex array with a 4-space indent.
pub fn to_pretty_json(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(value, &mut ser).context("Failed to serialize graph")?;
    Ok(buf)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

// ═══════════════════════════════════════════════════════════════════════
// Zip
// ═══════════════════════════════════════════════════════════════════════

pub struct ZipArchiveWriter {
    zip: ZipWriter<File>,
    name: String,
    path: PathBuf,
    tmp: PartialFile,
}

/// Removes the temporary container unless it was moved into place.
struct PartialFile(Option<PathBuf>);

impl PartialFile {
    fn persist(mut self, dest: &Path) -> Result<()> {
        if let Some(tmp) = self.0.take() {
            std::fs::rename(&tmp, dest)
                .with_context(|| format!("Failed to move output into {}", dest.display()))?;
        }
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(tmp) = self.0.take() {
            let _ = std::fs::remove_file(tmp);
        }
    }
}

impl ZipArchiveWriter {
    pub fn create(out_dir: &Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create output dir: {}", out_dir.display()))?;
        let path = out_dir.join(format!("{}.zip", name));
        let tmp = tmp_path(&path);
        let file = File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        let mut zip = ZipWriter::new(file);
        zip.add_directory(format!("{}/", name), SimpleFileOptions::default())
            .context("Failed to add root directory entry")?;
        Ok(Self {
            zip,
            name: name.to_string(),
            path,
            tmp: PartialFile(Some(tmp)),
        })
    }
}

impl ArchiveWriter for ZipArchiveWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_entry(
        &mut self,
        path: &str,
        bytes: &[u8],
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        if let Some(ts) = last_modified.and_then(zip_time) {
            options = options.last_modified_time(ts);
        }
        self.zip
            .start_file(path, options)
            .with_context(|| format!("Failed to start zip entry {}", path))?;
        self.zip
            .write_all(bytes)
            .with_context(|| format!("Failed to write zip entry {}", path))?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<PathBuf> {
        let ZipArchiveWriter { zip, path, tmp, .. } = *self;
        zip.finish().context("Failed to finish zip archive")?;
        tmp.persist(&path)?;
        Ok(path)
    }
}

/// Zip timestamps cover 1980..=2107 at two-second resolution.
fn zip_time(ts: DateTime<Utc>) -> Option<zip::DateTime> {
    let year = u16::try_from(ts.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        ts.month() as u8,
        ts.day() as u8,
        ts.hour() as u8,
        ts.minute() as u8,
        ts.second() as u8,
    )
    .ok()
}

// ═══════════════════════════════════════════════════════════════════════
// JSON
// ═══════════════════════════════════════════════════════════════════════

pub struct JsonFileWriter {
    name: String,
    path: PathBuf,
    graph: Option<Vec<u8>>,
}

impl JsonFileWriter {
    pub fn create(out_dir: &Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create output dir: {}", out_dir.display()))?;
        Ok(Self {
            name: name.to_string(),
            path: out_dir.join(format!("{}.json", name)),
            graph: None,
        })
    }
}

impl ArchiveWriter for JsonFileWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_entry(
        &mut self,
        path: &str,
        bytes: &[u8],
        _last_modified: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if path == graph_entry_path(&self.name) {
            self.graph = Some(bytes.to_vec());
        } else {
            tracing::debug!(path, "json output skips file entry");
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<PathBuf> {
        let Some(graph) = self.graph else {
            bail!("No graph entry was written for {}", self.name);
        };
        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, &graph)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        PartialFile(Some(tmp)).persist(&self.path)?;
        Ok(self.path)
    }
}

/// Open the writer for `format` (`zip` or `json`).
pub fn create_writer(format: &str, out_dir: &Path, name: &str) -> Result<Box<dyn ArchiveWriter>> {
    match format {
        "zip" => Ok(Box::new(ZipArchiveWriter::create(out_dir, name)?)),
        "json" => Ok(Box::new(JsonFileWriter::create(out_dir, name)?)),
        other => bail!("Unknown output format: '{}'. Must be zip or json.", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Reading back
// ═══════════════════════════════════════════════════════════════════════

/// Read the vertex array from a `.zip` or `.json` container.
pub fn read_dump(path: &Path) -> Result<Vec<Vertex>> {
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    let bytes = if is_zip {
        read_graph_entry(path)?
    } else {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Invalid graph JSON in {}", path.display()))?;
    let Value::Array(items) = value else {
        bail!("Graph in {} is not a JSON array", path.display());
    };
    items
        .iter()
        .map(|item| Vertex::from_value(item).map_err(anyhow::Error::from))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Malformed vertex in {}", path.display()))
}

fn read_graph_entry(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a zip archive: {}", path.display()))?;

    let entry_name = archive
        .file_names()
        .find(|n| is_graph_entry(n))
        .map(str::to_string)
        .with_context(|| format!("No graph entry in {}", path.display()))?;

    let entry = archive.by_name(&entry_name)?;
    let mut out = Vec::new();
    entry.take(MAX_GRAPH_ENTRY_BYTES).read_to_end(&mut out)?;
    if out.len() as u64 >= MAX_GRAPH_ENTRY_BYTES {
        bail!(
            "Graph entry {} exceeds size limit ({} bytes)",
            entry_name,
            MAX_GRAPH_ENTRY_BYTES
        );
    }
    Ok(out)
}

/// `<name>/<name>.json`
fn is_graph_entry(entry: &str) -> bool {
    match entry.split_once('/') {
        Some((dir, rest)) => rest.strip_suffix(".json") == Some(dir),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use page_dump_core::{SyntheticProperty, VertexType};
    use tempfile::TempDir;

    fn graph_bytes() -> Vec<u8> {
        let mut page = Vertex::text("p1", VertexType::Page);
        page.text = Some("Root".to_string());
        let value = Value::Array(vec![page
            .to_value(&[SyntheticProperty::VertexType, SyntheticProperty::MediaType])
            .unwrap()]);
        to_pretty_json(&value).unwrap()
    }

    #[test]
    fn test_archive_name_replaces_separators() {
        assert_eq!(archive_name("Notes/2024: Plans"), "Notes_2024_ Plans");
        assert_eq!(archive_name("Plain"), "Plain");
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let text = String::from_utf8(graph_bytes()).unwrap();
        assert!(text.contains("\n        \"uid\": \"p1\""), "{}", text);
    }

    #[test]
    fn test_zip_layout_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let mut writer: Box<dyn ArchiveWriter> =
            Box::new(ZipArchiveWriter::create(tmp.path(), "Root").unwrap());
        writer
            .add_entry(&graph_entry_path("Root"), &graph_bytes(), None)
            .unwrap();
        let ts = Utc.with_ymd_and_hms(2022, 3, 4, 5, 6, 8).unwrap();
        writer
            .add_entry(&file_entry_path("Root", "a.png"), b"png", Some(ts))
            .unwrap();
        let path = writer.finish().unwrap();
        assert_eq!(path, tmp.path().join("Root.zip"));
        assert!(!tmp.path().join("Root.zip.partial").exists());

        let archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["Root/", "Root/Root.json", "Root/files/a.png"]);
        drop(archive);

        let vertices = read_dump(&path).unwrap();
        assert_eq!(vertices.len(), 1);
        assert_eq!(vertices[0].text.as_deref(), Some("Root"));
    }

    #[test]
    fn test_zip_time_range() {
        let ts = Utc.with_ymd_and_hms(2022, 3, 4, 5, 6, 8).unwrap();
        assert!(zip_time(ts).is_some());
        let too_early = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert!(zip_time(too_early).is_none());
    }

    #[test]
    fn test_unfinished_zip_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let writer = ZipArchiveWriter::create(tmp.path(), "Root").unwrap();
        drop(writer);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_json_writer_skips_files() {
        let tmp = TempDir::new().unwrap();
        let mut writer = create_writer("json", tmp.path(), "Root").unwrap();
        writer
            .add_entry(&graph_entry_path("Root"), &graph_bytes(), None)
            .unwrap();
        writer
            .add_entry(&file_entry_path("Root", "a.png"), b"png", None)
            .unwrap();
        let path = writer.finish().unwrap();
        assert_eq!(path, tmp.path().join("Root.json"));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
        assert_eq!(read_dump(&path).unwrap()[0].uid, "p1");
    }

    #[test]
    fn test_json_writer_requires_graph() {
        let tmp = TempDir::new().unwrap();
        let writer = create_writer("json", tmp.path(), "Root").unwrap();
        assert!(writer.finish().is_err());
        assert!(create_writer("tar", tmp.path(), "Root").is_err());
    }

    #[test]
    fn test_graph_entry_detection() {
        assert!(is_graph_entry("Root/Root.json"));
        assert!(!is_graph_entry("Root/files/Root.json"));
        assert!(!is_graph_entry("Root/"));
    }
}
