//! File fetcher backed by a local directory of pre-downloaded files.
//!
//! Layout: `<dir>/<uid>/<file_name>`, exactly one regular file per uid
//! directory. The source URL is ignored.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use page_dump_core::models::guess_media_type;
use std::path::PathBuf;

use crate::traits::{FetchedFile, FileFetcher};

pub struct DirFileFetcher {
    dir: PathBuf,
}

impl DirFileFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FileFetcher for DirFileFetcher {
    async fn fetch(&self, uid: &str, _source: &str) -> Result<FetchedFile> {
        let uid_dir = self.dir.join(uid);
        let mut entries = tokio::fs::read_dir(&uid_dir)
            .await
            .with_context(|| format!("No local copy of file {} in {}", uid, uid_dir.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        let path = match files.as_slice() {
            [single] => single.clone(),
            [] => bail!("{} holds no file", uid_dir.display()),
            _ => bail!("{} holds {} files, expected one", uid_dir.display(), files.len()),
        };

        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| uid.to_string());
        let last_modified = tokio::fs::metadata(&path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        Ok(FetchedFile {
            media_type: guess_media_type(&file_name).to_string(),
            file_name,
            last_modified,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_single_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("tok-1")).unwrap();
        std::fs::write(tmp.path().join("tok-1").join("flower.jpeg"), b"jpeg").unwrap();

        let fetched = DirFileFetcher::new(tmp.path())
            .fetch("tok-1", "https://ignored")
            .await
            .unwrap();
        assert_eq!(fetched.file_name, "flower.jpeg");
        assert_eq!(fetched.media_type, "image/jpeg");
        assert_eq!(fetched.bytes, b"jpeg");
        assert!(fetched.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_missing_or_ambiguous_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let fetcher = DirFileFetcher::new(tmp.path());
        assert!(fetcher.fetch("absent", "x").await.is_err());

        std::fs::create_dir(tmp.path().join("two")).unwrap();
        std::fs::write(tmp.path().join("two").join("a.txt"), b"a").unwrap();
        std::fs::write(tmp.path().join("two").join("b.txt"), b"b").unwrap();
        let err = fetcher.fetch("two", "x").await.unwrap_err();
        assert!(err.to_string().contains("expected one"));
    }
}
