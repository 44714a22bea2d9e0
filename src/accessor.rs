//! Dotted-path field access over an [`ObjectGraph`].
//!
//! A path such as `memberships.organization` is read one segment at a time.
//! When an intermediate value is a list, the rest of the path is applied to
//! every element and the per-element results are flattened by exactly one
//! level. The last segment indexes directly, so a field that holds a list is
//! returned as that list.

use crate::graph::{ObjectGraph, SourceValue};
use crate::types::PATH_SEPARATOR;

/// The path segment that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSegment {
    pub segment: String,
}

/// Resolve `path` starting at `value`.
///
/// # Errors
///
/// Returns the first segment that is absent, or that lands on a scalar.
pub fn resolve(
    graph: &ObjectGraph,
    value: &SourceValue,
    path: &str,
) -> Result<SourceValue, MissingSegment> {
    let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    resolve_segments(graph, value, &segments)
}

fn resolve_segments(
    graph: &ObjectGraph,
    value: &SourceValue,
    segments: &[&str],
) -> Result<SourceValue, MissingSegment> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(value.clone());
    };

    match value {
        SourceValue::List(items) => {
            let mut flattened = Vec::with_capacity(items.len());
            for item in items {
                match resolve_segments(graph, item, segments)? {
                    SourceValue::List(inner) => flattened.extend(inner),
                    other => flattened.push(other),
                }
            }
            Ok(SourceValue::List(flattened))
        }
        SourceValue::Record(id) => {
            let field = graph.record(*id).get(head).ok_or_else(|| MissingSegment {
                segment: head.to_string(),
            })?;
            resolve_segments(graph, field, rest)
        }
        SourceValue::Scalar(_) => Err(MissingSegment {
            segment: head.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn load(doc: serde_json::Value) -> (ObjectGraph, SourceValue) {
        ObjectGraph::from_json(&doc).unwrap()
    }

    #[test]
    fn single_segment_reads_field() {
        let (graph, root) = load(json!({"name": "Bob"}));
        assert_eq!(
            resolve(&graph, &root, "name"),
            Ok(SourceValue::scalar("Bob"))
        );
    }

    #[test]
    fn nested_record_segments() {
        let (graph, root) = load(json!({"address": {"city": "Trondheim"}}));
        let city = resolve(&graph, &root, "address.city").unwrap();
        assert_eq!(graph.to_json(&city), Some(json!("Trondheim")));
    }

    #[test]
    fn list_intermediate_maps_remaining_path() {
        let (graph, root) = load(json!({
            "memberships": [
                {"organization": {"id": 2}},
                {"organization": {"id": 3}}
            ]
        }));
        let orgs = resolve(&graph, &root, "memberships.organization").unwrap();
        assert_eq!(graph.to_json(&orgs), Some(json!([{"id": 2}, {"id": 3}])));
    }

    #[test]
    fn flattens_exactly_one_level() {
        let (graph, root) = load(json!({
            "teams": [
                {"members": [{"id": 1}, {"id": 2}]},
                {"members": [{"id": 3}]}
            ]
        }));
        let members = resolve(&graph, &root, "teams.members").unwrap();
        assert_eq!(
            graph.to_json(&members),
            Some(json!([{"id": 1}, {"id": 2}, {"id": 3}]))
        );

        let (graph, root) = load(json!({
            "groups": [
                {"grid": [[1, 2], [3]]},
                {"grid": [[4]]}
            ]
        }));
        let grid = resolve(&graph, &root, "groups.grid").unwrap();
        assert_eq!(graph.to_json(&grid), Some(json!([[1, 2], [3], [4]])));
    }

    #[test]
    fn terminal_list_is_returned_as_is() {
        let (graph, root) = load(json!({"tags": ["a", "b"]}));
        let tags = resolve(&graph, &root, "tags").unwrap();
        assert_eq!(graph.to_json(&tags), Some(json!(["a", "b"])));
    }

    #[test]
    fn missing_segment_is_reported() {
        let (graph, root) = load(json!({"address": {"street": "Elgeseter"}}));
        assert_eq!(
            resolve(&graph, &root, "address.city"),
            Err(MissingSegment {
                segment: "city".into()
            })
        );
    }

    #[test]
    fn segment_through_scalar_is_missing() {
        let (graph, root) = load(json!({"name": "Bob"}));
        assert_eq!(
            resolve(&graph, &root, "name.first"),
            Err(MissingSegment {
                segment: "first".into()
            })
        );
    }

    #[test]
    fn missing_segment_inside_list_element_fails() {
        let (graph, root) = load(json!({
            "memberships": [{"organization": {"id": 2}}, {}]
        }));
        assert!(resolve(&graph, &root, "memberships.organization").is_err());
    }
}
