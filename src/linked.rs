//! Side-loaded store and post-order aggregation of dumped resources.

use std::collections::{HashMap, HashSet};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::links::extract_links;
use crate::schema::{SchemaId, SchemaRegistry};
use crate::types::{LINKS_KEY, LINK_MARKER_KEY};
use crate::walker::{Child, Dump, DumpedNode, Placement};

/// One side-loaded resource body with the key it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedEntry {
    pub key: Value,
    pub body: Map<String, Value>,
}

/// Side-loaded resources grouped by type, in first-seen type order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkedStore {
    groups: Vec<(String, Vec<LinkedEntry>)>,
    keys: HashSet<(String, String)>,
}

impl LinkedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Duplicates are not checked; see [`LinkedStore::merge`].
    pub fn push(&mut self, type_name: &str, key: Value, body: Map<String, Value>) {
        self.keys.insert((type_name.to_string(), key.to_string()));
        let entry = LinkedEntry { key, body };
        match self.groups.iter_mut().find(|(t, _)| t == type_name) {
            Some((_, entries)) => entries.push(entry),
            None => self.groups.push((type_name.to_string(), vec![entry])),
        }
    }

    pub fn contains(&self, type_name: &str, key: &Value) -> bool {
        self.keys
            .contains(&(type_name.to_string(), key.to_string()))
    }

    pub fn get(&self, type_name: &str) -> Option<&[LinkedEntry]> {
        self.groups
            .iter()
            .find(|(t, _)| t == type_name)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(t, _)| t.as_str())
    }

    /// Total number of entries across all types.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, entries)| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Fold another store into this one, type by type.
    ///
    /// With `dedup`, entries whose `(type, key)` is already present are
    /// dropped; without it, entries are concatenated as they are.
    pub fn merge(&mut self, other: LinkedStore, dedup: bool) {
        for (type_name, entries) in other.groups {
            for entry in entries {
                if dedup && self.contains(&type_name, &entry.key) {
                    continue;
                }
                self.push(&type_name, entry.key, entry.body);
            }
        }
    }

    /// Drop every entry of `type_name` whose key is in `keys`.
    pub fn remove_keys(&mut self, type_name: &str, keys: &[Value]) {
        let Some(position) = self.groups.iter().position(|(t, _)| t == type_name) else {
            return;
        };
        let entries = &mut self.groups[position].1;
        entries.retain(|entry| !keys.contains(&entry.key));
        if entries.is_empty() {
            self.groups.remove(position);
        }
        for key in keys {
            self.keys.remove(&(type_name.to_string(), key.to_string()));
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (type_name, entries) in &self.groups {
            let bodies = entries
                .iter()
                .map(|entry| Value::Object(entry.body.clone()))
                .collect();
            map.insert(type_name.clone(), Value::Array(bodies));
        }
        Value::Object(map)
    }
}

impl Serialize for LinkedStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (type_name, entries) in &self.groups {
            let bodies: Vec<&Map<String, Value>> = entries.iter().map(|e| &e.body).collect();
            map.serialize_entry(type_name, &bodies)?;
        }
        map.end()
    }
}

/// A serialized top-level resource and everything it side-loads.
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub key: Value,
    pub body: Map<String, Value>,
    pub linked: LinkedStore,
}

/// Assemble final bodies from a dump and collect the side-loaded store.
///
/// Nodes are finished in reverse discovery order, so every child body is
/// complete before its parent needs it. Embedded children are moved inline
/// into their parent; linked children that were fully expanded go to the
/// store, in discovery order. An embedded resource that a linked
/// relationship also refers to stays inline and is copied into the store at
/// its discovery position. The root never enters its own store.
///
/// Embedded bodies nest as deep as the embedding chain in the source graph.
/// The walk itself is iterative, but building, serializing and dropping a
/// `serde_json::Value` are recursive, so chains tens of thousands of levels
/// deep can exhaust the stack. `check` reports embedding cycles (W002), the
/// declarations that allow such chains.
pub fn aggregate(registry: &SchemaRegistry, dump: Dump) -> Aggregated {
    let Dump { root, mut nodes } = dump;

    let root_index = match root {
        Child::Node(index) => index,
        Child::Link(key) => {
            return Aggregated {
                body: link_marker(&key),
                key,
                linked: LinkedStore::new(),
            }
        }
    };

    let also_linked = embedded_link_targets(registry, &nodes);

    let mut bodies: Vec<Option<Map<String, Value>>> = vec![None; nodes.len()];
    for index in (0..nodes.len()).rev() {
        let links = extract_links(registry, &nodes, index);
        let node = &mut nodes[index];
        let schema = registry.schema(node.schema);
        let mut body = std::mem::take(&mut node.attributes);

        for (rel, children) in schema.relationships.iter().zip(&node.relations) {
            if rel.is_linked() {
                continue;
            }
            let mut inline = children.iter().map(|child| match child {
                Child::Node(c) if also_linked.contains(c) => {
                    Value::Object(bodies[*c].clone().unwrap_or_default())
                }
                Child::Node(c) => Value::Object(bodies[*c].take().unwrap_or_default()),
                Child::Link(key) => Value::Object(link_marker(key)),
            });
            let value = if rel.cardinality.is_many() {
                Value::Array(inline.by_ref().collect())
            } else {
                inline.next().unwrap_or(Value::Null)
            };
            body.insert(rel.field.clone(), value);
        }

        if let Some(links) = links {
            body.insert(LINKS_KEY.to_string(), Value::Object(links));
        }
        bodies[index] = Some(body);
    }

    let mut linked = LinkedStore::new();
    for (index, node) in nodes.iter().enumerate() {
        if node.placement != Placement::Linked && !also_linked.contains(&index) {
            continue;
        }
        if let Some(body) = bodies[index].take() {
            let type_name = &registry.schema(node.schema).type_name;
            linked.push(type_name, node.key.clone(), body);
        }
    }

    tracing::debug!(
        resources = nodes.len(),
        linked = linked.len(),
        "aggregated dump"
    );

    Aggregated {
        key: nodes[root_index].key.clone(),
        body: bodies[root_index].take().unwrap_or_default(),
        linked,
    }
}

/// Embedded nodes that a linked relationship elsewhere reaches as a link marker.
fn embedded_link_targets(registry: &SchemaRegistry, nodes: &[DumpedNode]) -> HashSet<usize> {
    let embedded: HashMap<(SchemaId, String), usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.placement == Placement::Embedded)
        .map(|(index, node)| ((node.schema, node.key.to_string()), index))
        .collect();
    if embedded.is_empty() {
        return HashSet::new();
    }

    let mut targets = HashSet::new();
    for node in nodes {
        let schema = registry.schema(node.schema);
        for (rel, children) in schema.relationships.iter().zip(&node.relations) {
            if !rel.is_linked() {
                continue;
            }
            for child in children {
                if let Child::Link(key) = child {
                    if let Some(&index) = embedded.get(&(rel.target, key.to_string())) {
                        targets.insert(index);
                    }
                }
            }
        }
    }
    targets
}

/// Inline form of a link marker: the id and nothing else.
fn link_marker(key: &Value) -> Map<String, Value> {
    let mut marker = Map::new();
    marker.insert(LINK_MARKER_KEY.to_string(), key.clone());
    marker
}
