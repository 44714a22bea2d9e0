//! Static relationship topology of a root schema.
//!
//! The map is derived from schema declarations alone. Every relationship
//! reachable from the root contributes `"<owner>.<field>" -> {"type": target}`.
//! Owners reached through an embedded field are named by the embedding path
//! instead of their own type, e.g. `reservations.ticket_reservations`, so
//! their fields read as if they were declared on the root.

use std::collections::HashSet;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::schema::{SchemaId, SchemaRegistry};
use crate::types::{RelationKind, PATH_SEPARATOR};

/// Map of `"<owner>.<field>"` to target type, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootLinksMap {
    entries: Vec<(String, String)>,
}

impl RootLinksMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, t)| t.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (path, target) in self.iter() {
            map.insert(path.to_string(), json!({ "type": target }));
        }
        Value::Object(map)
    }

    fn insert(&mut self, path: String, target: &str) {
        if self.get(&path).is_none() {
            self.entries.push((path, target.to_string()));
        }
    }
}

impl Serialize for RootLinksMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Target<'a> {
            #[serde(rename = "type")]
            type_name: &'a str,
        }

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, target) in self.iter() {
            map.serialize_entry(path, &Target { type_name: target })?;
        }
        map.end()
    }
}

struct Frame {
    schema: SchemaId,
    prefix: String,
    /// Schemas on the current embedding chain, outermost first.
    embedding: Vec<SchemaId>,
}

/// Derive the links map reachable from `root`.
///
/// Linked targets are described under their own type name, once each.
/// An embedded target that is already on the current embedding chain keeps
/// its entry but is not expanded again.
pub fn describe(registry: &SchemaRegistry, root: SchemaId) -> RootLinksMap {
    let mut map = RootLinksMap::new();
    let mut expanded: HashSet<String> = HashSet::new();
    let mut stack = vec![Frame {
        schema: root,
        prefix: registry.schema(root).type_name.clone(),
        embedding: vec![root],
    }];

    while let Some(frame) = stack.pop() {
        if !expanded.insert(frame.prefix.clone()) {
            continue;
        }

        let owner = registry.schema(frame.schema);
        let mut next = Vec::new();
        for rel in &owner.relationships {
            let target = registry.schema(rel.target);
            let path = format!("{}{}{}", frame.prefix, PATH_SEPARATOR, rel.field);
            map.insert(path.clone(), &target.type_name);

            match rel.kind {
                RelationKind::Linked => next.push(Frame {
                    schema: rel.target,
                    prefix: target.type_name.clone(),
                    embedding: vec![rel.target],
                }),
                RelationKind::Embedded if frame.embedding.contains(&rel.target) => {
                    tracing::debug!(path = %path, "embedding cycle, not expanded");
                }
                RelationKind::Embedded => {
                    let mut embedding = frame.embedding.clone();
                    embedding.push(rel.target);
                    next.push(Frame {
                        schema: rel.target,
                        prefix: path,
                        embedding,
                    });
                }
            }
        }
        stack.extend(next.into_iter().rev());
    }

    map
}
