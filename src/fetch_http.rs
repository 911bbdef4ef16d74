//! File fetcher that downloads external files over HTTP.
//!
//! # Metadata
//!
//! | Field | Source | Fallback |
//! |-------|--------|----------|
//! | `file_name` | `Content-Disposition` filename | last `%2F` segment of the URL path, `.enc` removed; then the uid |
//! | `media_type` | `Content-Type` (parameters dropped) | guessed from the file name |
//! | `last_modified` | `Last-Modified` | none |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use page_dump_core::models::{guess_media_type, MEDIA_TYPE_OCTET_STREAM};
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE, LAST_MODIFIED};
use std::time::Duration;

use crate::traits::{FetchedFile, FileFetcher};

pub struct HttpFileFetcher {
    client: reqwest::Client,
}

impl HttpFileFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FileFetcher for HttpFileFetcher {
    async fn fetch(&self, uid: &str, source: &str) -> Result<FetchedFile> {
        let resp = self
            .client
            .get(source)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch file {}: {}", uid, e))?;

        if !resp.status().is_success() {
            bail!("Fetching file {} failed (HTTP {})", uid, resp.status());
        }

        let headers = resp.headers().clone();
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of file {}", uid))?
            .to_vec();

        let file_name = header_str(&headers, CONTENT_DISPOSITION)
            .and_then(disposition_file_name)
            .or_else(|| url_file_name(source))
            .unwrap_or_else(|| uid.to_string());
        let media_type = header_str(&headers, CONTENT_TYPE)
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_string())
            .filter(|ct| !ct.is_empty() && ct != MEDIA_TYPE_OCTET_STREAM)
            .unwrap_or_else(|| guess_media_type(&file_name).to_string());
        let last_modified = header_str(&headers, LAST_MODIFIED).and_then(parse_http_date);

        tracing::debug!(uid, %file_name, %media_type, size = bytes.len(), "fetched file");
        Ok(FetchedFile {
            file_name,
            media_type,
            last_modified,
            bytes,
        })
    }
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `filename*=UTF-8''name` takes precedence over `filename="name"`.
pub fn disposition_file_name(header: &str) -> Option<String> {
    let mut plain = None;
    for part in header.split(';').map(str::trim) {
        if let Some(value) = part.strip_prefix("filename*=") {
            let value = value.rsplit("''").next().unwrap_or(value);
            let decoded = percent_decode(value);
            if !decoded.is_empty() {
                return Some(decoded);
            }
        } else if let Some(value) = part.strip_prefix("filename=") {
            let value = value.trim_matches('"');
            if !value.is_empty() {
                plain = Some(value.to_string());
            }
        }
    }
    plain
}

/// Object name from a storage URL: the last `%2F`-separated path segment.
pub fn url_file_name(source: &str) -> Option<String> {
    let path = source.split(['?', '#']).next()?;
    let last = path.rsplit('/').next()?;
    let segment = last.rsplit("%2F").next()?;
    let segment = segment.rsplit("%2f").next()?;
    let name = percent_decode(segment);
    let name = name.strip_suffix(".enc").unwrap_or(&name).to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
