//! # page-dump core
//!
//! Pure, synchronous logic for turning the raw records of one page
//! extraction into a canonical vertex graph: data model, reference index,
//! property normalizer, merge accumulator, graph assembler, synthetic
//! properties, graph validation and the Datalog query builder.
//!
//! This crate does no I/O. Query providers, file fetchers and archive
//! writers live in the `page-dump` application crate and are injected at
//! the pipeline entry point.
//!
//! ```text
//! RawRecord[] ──▶ ReferenceIndex ──▶ normalize_record (per record)
//!                                          │
//!                                          ▼
//!                                   assemble_graph ──▶ Vertex[]
//! ```

pub mod assemble;
pub mod error;
pub mod index;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod query;
pub mod validate;

pub use assemble::{assemble_graph, render_vertices};
pub use error::NormalizeError;
pub use index::ReferenceIndex;
pub use models::{FollowLinksDirective, IdRef, RawRecord, SyntheticProperty, Vertex, VertexType};
