//! Collaborator traits injected into the dump pipeline.
//!
//! The pipeline in [`crate::dump`] never touches the network or the
//! filesystem directly. Everything external goes through one of these
//! three traits, so tests can swap in in-memory implementations and the
//! binary can pick an implementation from config.
//!
//! ```text
//!  QueryProvider ──▶ RawRecord[] ──▶ assemble ──▶ Vertex[]
//!                                                   │
//!                         FileFetcher ◀── resolve ◀─┘
//!                                                   │
//!                                                   ▼
//!                                             ArchiveWriter
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use page_dump_core::{FollowLinksDirective, RawRecord};

// ═══════════════════════════════════════════════════════════════════════
// Query Provider
// ═══════════════════════════════════════════════════════════════════════

/// Source of raw records for one page title.
///
/// The pipeline calls [`fetch_records`](QueryProvider::fetch_records)
/// twice per extraction: once with both directives set to
/// [`FollowLinksDirective::DontFollow`] (the page shell) and once with the
/// configured directives (the content).
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use page_dump::traits::QueryProvider;
/// use page_dump_core::{FollowLinksDirective, RawRecord};
///
/// pub struct Empty;
///
/// #[async_trait]
/// impl QueryProvider for Empty {
///     async fn fetch_records(
///         &self,
///         _title: &str,
///         _follow_children: FollowLinksDirective,
///         _follow_refs: FollowLinksDirective,
///     ) -> Result<Vec<RawRecord>> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait QueryProvider: Send + Sync {
    /// Records reachable from the page titled `title` under the given
    /// directives. Order is significant: it becomes output order.
    async fn fetch_records(
        &self,
        title: &str,
        follow_children: FollowLinksDirective,
        follow_refs: FollowLinksDirective,
    ) -> Result<Vec<RawRecord>>;
}

// ═══════════════════════════════════════════════════════════════════════
// File Fetcher
// ═══════════════════════════════════════════════════════════════════════

/// Content and metadata of one external file.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedFile {
    pub file_name: String,
    pub media_type: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub bytes: Vec<u8>,
}

/// Retrieves external file content by uid and source URL.
///
/// Implementations must be safe to call concurrently; the resolver runs
/// one task per file vertex.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, uid: &str, source: &str) -> Result<FetchedFile>;
}

// ═══════════════════════════════════════════════════════════════════════
// Archive Writer
// ═══════════════════════════════════════════════════════════════════════

/// Sink for the output container.
///
/// Paths are relative to the container root (e.g. `Page/Page.json`,
/// `Page/files/flower.jpeg`). Nothing is visible on disk until
/// [`finish`](ArchiveWriter::finish) succeeds.
pub trait ArchiveWriter: Send {
    /// Container base name; entry paths are built under it.
    fn name(&self) -> &str;

    fn add_entry(
        &mut self,
        path: &str,
        bytes: &[u8],
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Close the container and return the path it was written to.
    fn finish(self: Box<Self>) -> Result<std::path::PathBuf>;
}
