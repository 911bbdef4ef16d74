//! Typed failures raised while normalizing one extraction.
//!
//! Every variant is fatal for the extraction it occurs in. Variants carry
//! the uid of the offending record and, where it applies, the field.

/// Failure raised by the index, normalizer, accumulator or renderer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// A `children`/`refs` entry points at an id no record in the
    /// extraction carries.
    #[error("record {uid}: {field} references unknown id {id}")]
    DanglingReference {
        uid: String,
        field: &'static str,
        id: i64,
    },

    /// A record carries both or neither of `title` and `string`.
    #[error("record {uid}: exactly one of title/string must be present (title: {has_title}, string: {has_string})")]
    Classification {
        uid: String,
        has_title: bool,
        has_string: bool,
    },

    /// A child record has a missing or non-integer `order`.
    #[error("record {uid}: child {child} has malformed order: {found}")]
    MalformedOrder {
        uid: String,
        child: String,
        found: String,
    },

    /// A synthetic property name outside the recognized set.
    #[error("unrecognized synthetic property: '{0}'. Must be vertex-type or media-type.")]
    UnrecognizedProperty(String),

    /// A media type was requested for a file vertex before its content
    /// was resolved.
    #[error("vertex {uid}: media type requested before resolution")]
    UnresolvedMediaType { uid: String },

    /// Two contributions to the same vertex field that cannot be merged.
    #[error("record {uid}: conflicting values for field {field}")]
    Conflict { uid: String, field: String },

    /// A vertex read back from a dump does not have the archive shape.
    #[error("malformed vertex: {0}")]
    MalformedVertex(String),
}
