//! Graph assembly: index once, normalize every record, flatten.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::NormalizeError;
use crate::index::ReferenceIndex;
use crate::models::{RawRecord, SyntheticProperty, Vertex};
use crate::normalize::normalize_record;

/// Normalize the full record set of one extraction into a flat vertex
/// sequence.
///
/// Primary vertices appear in source record order; each record's derived
/// file vertices follow it. A file referenced from several records is
/// emitted once, at its first occurrence.
pub fn assemble_graph(records: &[RawRecord]) -> Result<Vec<Vertex>, NormalizeError> {
    let index = ReferenceIndex::build(records);
    for title in index.duplicate_titles() {
        tracing::warn!(title = %title, "duplicate page title; last record wins");
    }
    tracing::debug!(records = records.len(), "reference index built");

    let mut vertices = Vec::with_capacity(records.len());
    let mut derived_seen = HashSet::new();
    for record in records {
        let normalized = normalize_record(record, &index)?;
        vertices.push(normalized.vertex);
        for file in normalized.derived {
            if derived_seen.insert(file.uid.clone()) {
                vertices.push(file);
            }
        }
    }
    Ok(vertices)
}

/// Serialize vertices to the archive JSON array, attaching synthetic
/// properties in the configured order.
pub fn render_vertices(
    vertices: &[Vertex],
    properties: &[SyntheticProperty],
) -> Result<Value, NormalizeError> {
    vertices
        .iter()
        .map(|v| v.to_value(properties))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VertexType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const URL: &str = "https://firebasestorage.googleapis.com/v0/b/app.appspot.com/o/imgs%2Fflower.jpeg?alt=media&token=tok-1";

    fn records(values: Vec<Value>) -> Vec<RawRecord> {
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    #[test]
    fn test_root_with_one_block() {
        let input = records(vec![
            json!({"id": 1, "uid": "p1", "title": "Root", "children": [{"id": 2}]}),
            json!({"id": 2, "uid": "b1", "string": "hello [[Root]]", "order": 0}),
        ]);
        let vertices = assemble_graph(&input).unwrap();
        let rendered = render_vertices(&vertices, &[SyntheticProperty::VertexType]).unwrap();
        assert_eq!(
            rendered,
            json!([
                {"uid": "p1", "vertex-type": "roam/page", "text": "Root", "children": ["b1"]},
                {"uid": "b1", "vertex-type": "roam/block-content", "text": "hello [[p1]]"}
            ])
        );
    }

    #[test]
    fn test_derived_files_follow_their_record() {
        let input = records(vec![
            json!({"id": 1, "uid": "p1", "title": "Root", "children": [{"id": 2}, {"id": 3}]}),
            json!({"id": 2, "uid": "b1", "string": format!("img {}", URL), "order": 0}),
            json!({"id": 3, "uid": "b2", "string": format!("again {}", URL), "order": 1}),
        ]);
        let vertices = assemble_graph(&input).unwrap();
        let uids: Vec<&str> = vertices.iter().map(|v| v.uid.as_str()).collect();
        assert_eq!(uids, vec!["p1", "b1", "tok-1", "b2"]);
        assert_eq!(vertices[2].vertex_type, VertexType::ExternalFile);
        assert_eq!(vertices[3].refs, Some(vec!["tok-1".to_string()]));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let input = records(vec![
            json!({"id": 1, "uid": "p1", "title": "Root", "children": [{"id": 3}, {"id": 2}]}),
            json!({"id": 2, "uid": "b1", "string": "one", "order": 1}),
            json!({"id": 3, "uid": "b2", "string": format!("two {}", URL), "order": 0}),
        ]);
        assert_eq!(assemble_graph(&input).unwrap(), assemble_graph(&input).unwrap());
    }

    #[test]
    fn test_first_error_aborts() {
        let input = records(vec![
            json!({"id": 1, "uid": "p1", "title": "Root"}),
            json!({"id": 2, "uid": "odd", "title": "X", "string": "Y"}),
        ]);
        assert!(matches!(
            assemble_graph(&input),
            Err(NormalizeError::Classification { .. })
        ));
    }

    #[test]
    fn test_media_type_requires_resolution() {
        let input = records(vec![
            json!({"id": 1, "uid": "b1", "string": format!("img {}", URL)}),
        ]);
        let vertices = assemble_graph(&input).unwrap();
        let err = render_vertices(&vertices, &[SyntheticProperty::MediaType]).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::UnresolvedMediaType {
                uid: "tok-1".to_string()
            }
        );
        let rendered = render_vertices(&vertices, &[SyntheticProperty::VertexType]).unwrap();
        assert_eq!(rendered[1]["source"], URL);
    }

    #[test]
    fn test_text_vertices_get_text_media_type() {
        let input = records(vec![json!({"id": 1, "uid": "p1", "title": "Root"})]);
        let vertices = assemble_graph(&input).unwrap();
        let rendered = render_vertices(
            &vertices,
            &[SyntheticProperty::VertexType, SyntheticProperty::MediaType],
        )
        .unwrap();
        assert_eq!(rendered[0]["media-type"], "text/plain");
    }
}
