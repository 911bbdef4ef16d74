//! Reference index built once per extraction.
//!
//! Translates internal numeric ids to stable uids (carrying the record's
//! `order` alongside for the children sort) and page titles to uids. Must
//! be built over the complete record set before any record is normalized.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::NormalizeError;
use crate::models::RawRecord;

/// Stable id of a record plus its raw `order`, if it has one.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub uid: String,
    pub order: Option<Value>,
}

/// Lookup tables for one extraction.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    id_to_stable: HashMap<i64, IndexEntry>,
    title_to_stable: HashMap<String, String>,
    duplicate_titles: Vec<String>,
}

impl ReferenceIndex {
    /// Build both mappings in one pass over `records`.
    ///
    /// Records without a title are never indexed by title. A repeated
    /// title keeps the last uid seen and is listed in
    /// [`duplicate_titles`](Self::duplicate_titles).
    pub fn build(records: &[RawRecord]) -> Self {
        let mut index = ReferenceIndex::default();
        for record in records {
            index.id_to_stable.insert(
                record.id,
                IndexEntry {
                    uid: record.uid.clone(),
                    order: record.order.clone(),
                },
            );
            if let Some(title) = &record.title {
                let previous = index
                    .title_to_stable
                    .insert(title.clone(), record.uid.clone());
                if matches!(previous, Some(prev) if prev != record.uid) {
                    index.duplicate_titles.push(title.clone());
                }
            }
        }
        index
    }

    /// Look up the entry for a numeric id referenced from `field` of
    /// record `uid`.
    pub fn entry(&self, uid: &str, field: &'static str, id: i64) -> Result<&IndexEntry, NormalizeError> {
        self.id_to_stable
            .get(&id)
            .ok_or_else(|| NormalizeError::DanglingReference {
                uid: uid.to_string(),
                field,
                id,
            })
    }

    /// Stable id of the page with this title, if any.
    pub fn uid_for_title(&self, title: &str) -> Option<&str> {
        self.title_to_stable.get(title).map(String::as_str)
    }

    pub fn duplicate_titles(&self) -> &[String] {
        &self.duplicate_titles
    }

    pub fn len(&self) -> usize {
        self.id_to_stable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_stable.is_empty()
    }
}
