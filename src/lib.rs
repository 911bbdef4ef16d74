//! # page-dump
//!
//! Extracts one page of an outline-style note graph, and everything it
//! reaches through `children` and `refs`, into a self-contained archive:
//! a canonical JSON vertex graph plus the external files its blocks embed.
//!
//! The pure normalization pipeline lives in the `page-dump-core` crate.
//! This crate supplies the I/O around it: configuration, query providers,
//! file fetchers, concurrent file resolution, archive writers and the
//! `page-dump` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │QueryProvider │──▶│  page-dump-core  │──▶│   resolve    │
//! │ file / http  │   │ index+normalize  │   │ FileFetcher  │
//! └──────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                  ▼
//!                                          ┌──────────────┐
//!                                          │ArchiveWriter │
//!                                          │  zip / json  │
//!                                          └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! page-dump dump "My Page"              # writes ./out/My Page.zip
//! page-dump dump "My Page" --format json
//! page-dump validate "./out/My Page.zip"
//! page-dump query --follow-refs shallow
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`traits`] | Collaborator traits: query provider, file fetcher, archive writer |
//! | [`provider_file`] | Query provider over pre-exported JSON files |
//! | [`provider_http`] | Query provider over the host's HTTP query endpoint |
//! | [`fetch_http`] | File fetcher over HTTP |
//! | [`fetch_dir`] | File fetcher over a local directory |
//! | [`resolve`] | Concurrent, all-or-nothing file resolution |
//! | [`archive`] | Zip and JSON containers, reading dumps back |
//! | [`dump`] | The pipeline entry point |

pub mod archive;
pub mod config;
pub mod dump;
pub mod fetch_dir;
pub mod fetch_http;
pub mod provider_file;
pub mod provider_http;
pub mod resolve;
pub mod traits;

pub use dump::{dump_page, DumpOptions, DumpReport};
