//! Rewrites side-loaded relationships of a dumped resource into id references.

use serde_json::{Map, Value};

use crate::schema::SchemaRegistry;
use crate::walker::{Child, DumpedNode};

/// Build the `links` record of `nodes[index]`.
///
/// Every linked relationship contributes its field: an id for to-one
/// relationships (`null` when the source held `null`), an ordered id list for
/// to-many ones. An empty list is kept. Embedded relationships stay inline and
/// contribute nothing. Returns `None` when the schema declares no linked
/// relationship at all.
pub fn extract_links(
    registry: &SchemaRegistry,
    nodes: &[DumpedNode],
    index: usize,
) -> Option<Map<String, Value>> {
    let node = &nodes[index];
    let schema = registry.schema(node.schema);
    if !schema.has_linked_relationships() {
        return None;
    }

    let mut links = Map::new();
    for (rel, children) in schema.relationships.iter().zip(&node.relations) {
        if !rel.is_linked() {
            continue;
        }
        let mut ids = children.iter().map(|child| child_id(nodes, child));
        let value = if rel.cardinality.is_many() {
            Value::Array(ids.collect())
        } else {
            ids.next().unwrap_or(Value::Null)
        };
        links.insert(rel.field.clone(), value);
    }
    Some(links)
}

/// A link marker contributes the id it carries; an expanded node its key.
fn child_id(nodes: &[DumpedNode], child: &Child) -> Value {
    match child {
        Child::Node(index) => nodes[*index].key.clone(),
        Child::Link(key) => key.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ObjectGraph;
    use crate::schema::{RelationshipDecl, SchemaDecl};
    use crate::walker::{GraphWalker, VisitedSet};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .declare(
                SchemaDecl::new("organizations", "organization_id")
                    .relationship(
                        RelationshipDecl::linked("owners", "users")
                            .many(true)
                            .attribute("users"),
                    )
                    .relationship(RelationshipDecl::linked("founder", "users")),
            )
            .declare(SchemaDecl::new("users", "user_id"))
            .declare(
                SchemaDecl::new("tags", "tag")
                    .relationship(RelationshipDecl::embedded("notes", "tags").many(true)),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn ids_from_nodes_and_markers() {
        let registry = registry();
        let (graph, root) = ObjectGraph::from_json(&json!({
            "organization_id": 2,
            "users": [{"$id": "u1", "user_id": 1}, {"user_id": 2}],
            "founder": {"$ref": "u1"}
        }))
        .unwrap();
        let orgs = registry.get("organizations").unwrap();
        let dump = GraphWalker::new(&registry, &graph)
            .dump(&root, orgs, &mut VisitedSet::new())
            .unwrap();

        let links = extract_links(&registry, &dump.nodes, 0).unwrap();
        assert_eq!(Value::Object(links), json!({"owners": [1, 2], "founder": 1}));
    }

    #[test]
    fn empty_list_and_null_are_recorded() {
        let registry = registry();
        let (graph, root) = ObjectGraph::from_json(&json!({
            "organization_id": 1,
            "users": [],
            "founder": null
        }))
        .unwrap();
        let orgs = registry.get("organizations").unwrap();
        let dump = GraphWalker::new(&registry, &graph)
            .dump(&root, orgs, &mut VisitedSet::new())
            .unwrap();

        let links = extract_links(&registry, &dump.nodes, 0).unwrap();
        assert_eq!(Value::Object(links), json!({"owners": [], "founder": null}));
    }

    #[test]
    fn no_links_without_linked_relationships() {
        let registry = registry();
        let (graph, root) = ObjectGraph::from_json(&json!({"tag": "a", "notes": []})).unwrap();
        let tags = registry.get("tags").unwrap();
        let dump = GraphWalker::new(&registry, &graph)
            .dump(&root, tags, &mut VisitedSet::new())
            .unwrap();
        assert!(extract_links(&registry, &dump.nodes, 0).is_none());

        let (graph, root) = ObjectGraph::from_json(&json!({"user_id": 5})).unwrap();
        let users = registry.get("users").unwrap();
        let dump = GraphWalker::new(&registry, &graph)
            .dump(&root, users, &mut VisitedSet::new())
            .unwrap();
        assert!(extract_links(&registry, &dump.nodes, 0).is_none());
    }
}
