//! Accumulator that folds per-field contributions into one [`Vertex`].
//!
//! Each normalization step for a record emits [`Contribution`]s
//! independently. When two steps emit the same field, the field's
//! [`MergePolicy`] decides the outcome; nothing is silently overwritten.
//!
//! | Field | Policy |
//! |-------|--------|
//! | `text` | [`MergePolicy::RejectConflict`] |
//! | `children` | [`MergePolicy::Concat`] |
//! | `refs` | [`MergePolicy::Concat`] |
//! | pass-through | [`MergePolicy::Collect`] |

use serde_json::Value;

use crate::error::NormalizeError;
use crate::models::{Vertex, VertexType};

/// One key-value contribution from a normalization step.
#[derive(Debug, Clone, PartialEq)]
pub enum Contribution {
    Text(String),
    Children(Vec<String>),
    Refs(Vec<String>),
    Passthrough(String, Value),
}

/// How a second contribution to an already-set field is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// A second value is a [`NormalizeError::Conflict`].
    RejectConflict,
    /// Lists are concatenated in arrival order.
    Concat,
    /// Scalar + scalar becomes a two-element array; anything involving an
    /// array is concatenated.
    Collect,
}

impl Contribution {
    pub fn field(&self) -> &str {
        match self {
            Contribution::Text(_) => "text",
            Contribution::Children(_) => "children",
            Contribution::Refs(_) => "refs",
            Contribution::Passthrough(key, _) => key,
        }
    }

    pub fn policy(&self) -> MergePolicy {
        match self {
            Contribution::Text(_) => MergePolicy::RejectConflict,
            Contribution::Children(_) | Contribution::Refs(_) => MergePolicy::Concat,
            Contribution::Passthrough(..) => MergePolicy::Collect,
        }
    }
}

/// Builds one primary vertex from the contributions of its record.
#[derive(Debug)]
pub struct VertexBuilder {
    vertex: Vertex,
}

impl VertexBuilder {
    pub fn new(uid: &str, vertex_type: VertexType) -> Self {
        Self {
            vertex: Vertex::text(uid, vertex_type),
        }
    }

    pub fn push(&mut self, contribution: Contribution) -> Result<(), NormalizeError> {
        match contribution {
            Contribution::Text(text) => {
                if self.vertex.text.is_some() {
                    return Err(NormalizeError::Conflict {
                        uid: self.vertex.uid.clone(),
                        field: "text".to_string(),
                    });
                }
                self.vertex.text = Some(text);
            }
            Contribution::Children(items) => {
                self.vertex.children.get_or_insert_with(Vec::new).extend(items);
            }
            Contribution::Refs(items) => {
                self.vertex.refs.get_or_insert_with(Vec::new).extend(items);
            }
            Contribution::Passthrough(key, value) => {
                let merged = match self.vertex.extra.remove(&key) {
                    Some(existing) => collect_values(existing, value),
                    None => value,
                };
                self.vertex.extra.insert(key, merged);
            }
        }
        Ok(())
    }

    pub fn build(self) -> Vertex {
        self.vertex
    }
}

/// Merge two JSON values under [`MergePolicy::Collect`].
pub fn collect_values(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Value::Array(a)
        }
        (Value::Array(mut a), b) => {
            a.push(b);
            Value::Array(a)
        }
        (a, Value::Array(b)) => {
            let mut out = Vec::with_capacity(b.len() + 1);
            out.push(a);
            out.extend(b);
            Value::Array(out)
        }
        (a, b) => Value::Array(vec![a, b]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_scalar_scalar() {
        assert_eq!(collect_values(json!("a"), json!("b")), json!(["a", "b"]));
    }

    #[test]
    fn test_collect_with_arrays() {
        assert_eq!(collect_values(json!(["a"]), json!("b")), json!(["a", "b"]));
        assert_eq!(collect_values(json!("a"), json!(["b", "c"])), json!(["a", "b", "c"]));
        assert_eq!(collect_values(json!(["a"]), json!(["b"])), json!(["a", "b"]));
    }

    #[test]
    fn test_refs_concat_from_two_steps() {
        let mut builder = VertexBuilder::new("b1", VertexType::BlockContent);
        builder
            .push(Contribution::Refs(vec!["x".to_string()]))
            .unwrap();
        builder
            .push(Contribution::Refs(vec!["y".to_string(), "z".to_string()]))
            .unwrap();
        let vertex = builder.build();
        assert_eq!(vertex.refs, Some(vec!["x".into(), "y".into(), "z".into()]));
    }

    #[test]
    fn test_second_text_is_conflict() {
        let mut builder = VertexBuilder::new("b1", VertexType::BlockContent);
        builder.push(Contribution::Text("one".to_string())).unwrap();
        let err = builder
            .push(Contribution::Text("two".to_string()))
            .unwrap_err();
        assert!(matches!(err, NormalizeError::Conflict { .. }));
    }

    #[test]
    fn test_passthrough_collects() {
        let mut builder = VertexBuilder::new("b1", VertexType::BlockContent);
        builder
            .push(Contribution::Passthrough("tag".to_string(), json!(1)))
            .unwrap();
        builder
            .push(Contribution::Passthrough("tag".to_string(), json!(2)))
            .unwrap();
        assert_eq!(builder.build().extra["tag"], json!([1, 2]));
    }

    #[test]
    fn test_policies() {
        assert_eq!(
            Contribution::Text(String::new()).policy(),
            MergePolicy::RejectConflict
        );
        assert_eq!(Contribution::Refs(vec![]).policy(), MergePolicy::Concat);
        assert_eq!(
            Contribution::Passthrough("heading".into(), json!(1)).field(),
            "heading"
        );
    }
}
