//! Per-record property normalization.
//!
//! Converts one [`RawRecord`] into a primary [`Vertex`] plus zero or more
//! derived external-file vertices, given the [`ReferenceIndex`] of the
//! whole extraction. Every field step is a pure function that takes the
//! index and the field value explicitly and returns [`Contribution`]s; the
//! [`VertexBuilder`] folds them together.
//!
//! | Field | Output |
//! |-------|--------|
//! | `title` | `text`, verbatim |
//! | `string` | `text` with page refs rewritten and file URLs replaced by `<<uid>>`; minted uids appended to `refs` |
//! | `children` | `children`, uids sorted by the children's `order` |
//! | `refs` | `refs`, uids in input order |
//! | `order`, `id` | dropped |
//! | anything else | passed through |

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::NormalizeError;
use crate::index::ReferenceIndex;
use crate::merge::{Contribution, VertexBuilder};
use crate::models::{IdRef, RawRecord, Vertex, VertexType};

/// `[[Page Title]]`, no nested brackets.
const PAGE_REF_PATTERN: &str = r"\[\[([^\[\]]+)\]\]";

/// File URL on the host's storage service. Group 1 is the access token.
const FILE_URL_PATTERN: &str =
    r"https://firebasestorage\.googleapis\.com/[^\s)\]]*?[?&]token=([0-9A-Za-z-]+)";

fn page_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PAGE_REF_PATTERN).expect("page ref pattern is valid"))
}

fn file_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FILE_URL_PATTERN).expect("file url pattern is valid"))
}

/// Result of normalizing one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub vertex: Vertex,
    /// External-file vertices minted from the record's text.
    pub derived: Vec<Vertex>,
}

/// Output of the `string` step.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedString {
    pub text: String,
    /// Uids minted for the external files found in the text.
    pub refs: Vec<String>,
    pub derived: Vec<Vertex>,
}

/// Decide the vertex type of a record.
///
/// Exactly one of `title` and `string` must be present; `heading` on a
/// string-bearing record makes it a heading block.
pub fn classify(record: &RawRecord) -> Result<VertexType, NormalizeError> {
    match (&record.title, &record.string) {
        (Some(_), None) => Ok(VertexType::Page),
        (None, Some(_)) if record.heading.is_some() => Ok(VertexType::BlockHeading),
        (None, Some(_)) => Ok(VertexType::BlockContent),
        (title, string) => Err(NormalizeError::Classification {
            uid: record.uid.clone(),
            has_title: title.is_some(),
            has_string: string.is_some(),
        }),
    }
}

/// Normalize one record against the extraction's index.
pub fn normalize_record(
    record: &RawRecord,
    index: &ReferenceIndex,
) -> Result<Normalized, NormalizeError> {
    let vertex_type = classify(record)?;
    let mut builder = VertexBuilder::new(&record.uid, vertex_type);
    let mut derived = Vec::new();

    if let Some(title) = &record.title {
        builder.push(normalize_title(title))?;
    }
    if let Some(string) = &record.string {
        let normalized = normalize_string(string, index);
        builder.push(Contribution::Text(normalized.text))?;
        if !normalized.refs.is_empty() {
            builder.push(Contribution::Refs(normalized.refs))?;
        }
        derived = normalized.derived;
    }
    if let Some(children) = &record.children {
        builder.push(Contribution::Children(normalize_children(
            &record.uid,
            children,
            index,
        )?))?;
    }
    if let Some(refs) = &record.refs {
        builder.push(Contribution::Refs(normalize_refs(&record.uid, refs, index)?))?;
    }
    if let Some(heading) = &record.heading {
        builder.push(Contribution::Passthrough(
            "heading".to_string(),
            heading.clone(),
        ))?;
    }
    for (key, value) in &record.extra {
        builder.push(Contribution::Passthrough(key.clone(), value.clone()))?;
    }

    Ok(Normalized {
        vertex: builder.build(),
        derived,
    })
}

pub fn normalize_title(title: &str) -> Contribution {
    Contribution::Text(title.to_string())
}

/// Rewrite page references, then extract external files.
pub fn normalize_string(value: &str, index: &ReferenceIndex) -> NormalizedString {
    let rewritten = rewrite_page_refs(value, index);
    extract_resources(&rewritten)
}

/// Replace `[[Title]]` with `[[uid]]` for every title the index knows.
///
/// Unknown titles are left exactly as written.
pub fn rewrite_page_refs(value: &str, index: &ReferenceIndex) -> String {
    page_ref_regex()
        .replace_all(value, |caps: &Captures| {
            let title = &caps[1];
            match index.uid_for_title(title) {
                Some(uid) => format!("[[{}]]", uid),
                None => {
                    tracing::warn!(title, "page reference does not resolve; left as written");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Replace every storage-service URL with `<<token>>` and mint one
/// external-file vertex per distinct token.
pub fn extract_resources(value: &str) -> NormalizedString {
    let mut refs = Vec::new();
    let mut derived = Vec::new();
    let mut seen = HashSet::new();

    let text = file_url_regex()
        .replace_all(value, |caps: &Captures| {
            let token = caps[1].to_string();
            if seen.insert(token.clone()) {
                refs.push(token.clone());
                derived.push(Vertex::external_file(token.clone(), &caps[0]));
            }
            format!("<<{}>>", token)
        })
        .into_owned();

    NormalizedString {
        text,
        refs,
        derived,
    }
}

/// Look up each child, stable-sort by `order`, keep only the uids.
pub fn normalize_children(
    uid: &str,
    children: &[IdRef],
    index: &ReferenceIndex,
) -> Result<Vec<String>, NormalizeError> {
    let mut ordered = children
        .iter()
        .map(|child| {
            let entry = index.entry(uid, "children", child.id)?;
            let order = entry
                .order
                .as_ref()
                .and_then(|o| o.as_i64())
                .ok_or_else(|| NormalizeError::MalformedOrder {
                    uid: uid.to_string(),
                    child: entry.uid.clone(),
                    found: entry
                        .order
                        .as_ref()
                        .map(|o| o.to_string())
                        .unwrap_or_else(|| "missing".to_string()),
                })?;
            Ok((entry.uid.clone(), order))
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;
    ordered.sort_by_key(|(_, order)| *order);
    Ok(ordered.into_iter().map(|(uid, _)| uid).collect())
}

/// Look up each ref; order is irrelevant and kept as given.
pub fn normalize_refs(
    uid: &str,
    refs: &[IdRef],
    index: &ReferenceIndex,
) -> Result<Vec<String>, NormalizeError> {
    refs.iter()
        .map(|r| index.entry(uid, "refs", r.id).map(|e| e.uid.clone()))
        .collect()
}
