//! Graph walking: expands source records into dumped resources.
//!
//! The walk is a depth-first pre-order traversal driven by an explicit work
//! stack. Each `(type, primary key)` pair is expanded at most once per
//! [`VisitedSet`]; any later encounter yields a [`Child::Link`] marker that
//! carries only the key. A node is marked before its relationships are
//! pushed, so a record pointing at itself ends in a link marker.
//!
//! Dumped nodes are stored flat, in discovery order. A child always has a
//! higher index than its parent, which lets later passes run post-order by
//! iterating indices backwards.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::accessor::{self, MissingSegment};
use crate::error::SerializeError;
use crate::graph::{ObjectGraph, RecordId, SourceValue};
use crate::schema::{SchemaId, SchemaRegistry};
use crate::types::{display_key, Cardinality, RelationKind};

/// Field name reported when the value handed to the walker is not a record.
pub const ROOT_FIELD: &str = "(root)";

/// `(type, primary key)` pairs already expanded in one traversal.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    seen: HashSet<(String, String)>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a pair as visited. Returns false if it already was.
    pub fn mark(&mut self, type_name: &str, key: &Value) -> bool {
        self.seen.insert((type_name.to_string(), key.to_string()))
    }

    pub fn contains(&self, type_name: &str, key: &Value) -> bool {
        self.seen.contains(&(type_name.to_string(), key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Where a dumped node ends up in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Root,
    Linked,
    Embedded,
}

/// One relationship slot entry: a full expansion or a link marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(usize),
    Link(Value),
}

/// A fully expanded resource.
#[derive(Debug, Clone)]
pub struct DumpedNode {
    pub schema: SchemaId,
    pub key: Value,
    pub placement: Placement,
    /// Declared attributes, in declaration order.
    pub attributes: Map<String, Value>,
    /// One slot per schema relationship, same order as the schema.
    /// An empty slot on a to-one relationship means the source held `null`.
    pub relations: Vec<Vec<Child>>,
}

/// Result of walking one top-level record.
#[derive(Debug, Clone)]
pub struct Dump {
    pub root: Child,
    pub nodes: Vec<DumpedNode>,
}

/// (relationship index, target record, target schema, placement)
type PendingChild = (usize, RecordId, SchemaId, Placement);

struct Task {
    record: RecordId,
    schema: SchemaId,
    placement: Placement,
    /// (parent node index, relationship index)
    parent: Option<(usize, usize)>,
}

/// Walks source graphs against a registry.
pub struct GraphWalker<'a> {
    registry: &'a SchemaRegistry,
    graph: &'a ObjectGraph,
}

impl<'a> GraphWalker<'a> {
    pub fn new(registry: &'a SchemaRegistry, graph: &'a ObjectGraph) -> Self {
        Self { registry, graph }
    }

    /// Dump `value` as a resource of `schema`.
    ///
    /// # Errors
    ///
    /// Returns `SerializeError::MissingPrimaryKey`, `MissingAttribute` or
    /// `TypeMismatch` on the first offending record; nothing is returned
    /// for the partial walk.
    pub fn dump(
        &self,
        value: &SourceValue,
        schema: SchemaId,
        visited: &mut VisitedSet,
    ) -> Result<Dump, SerializeError> {
        let SourceValue::Record(record) = value else {
            return Err(SerializeError::TypeMismatch {
                resource_type: self.registry.schema(schema).type_name.clone(),
                field: ROOT_FIELD.to_string(),
                key: None,
                expected: "object",
                actual: value.type_name(),
            });
        };

        let mut nodes: Vec<DumpedNode> = Vec::new();
        let mut root = None;
        let mut stack = vec![Task {
            record: *record,
            schema,
            placement: Placement::Root,
            parent: None,
        }];

        while let Some(task) = stack.pop() {
            let resource = self.registry.schema(task.schema);
            let key = self.primary_key(task.record, task.schema)?;

            let child = if visited.mark(&resource.type_name, &key) {
                let index = nodes.len();
                tracing::trace!(
                    resource_type = %resource.type_name,
                    key = %display_key(&key),
                    index,
                    "expand"
                );
                let (node, children) = self.expand(task.record, task.schema, key, task.placement)?;
                nodes.push(node);
                // Reversed so the first child is popped first.
                stack.extend(children.into_iter().rev().map(|(rel, record, target, placement)| {
                    Task {
                        record,
                        schema: target,
                        placement,
                        parent: Some((index, rel)),
                    }
                }));
                Child::Node(index)
            } else {
                tracing::trace!(
                    resource_type = %resource.type_name,
                    key = %display_key(&key),
                    "already visited, link marker"
                );
                Child::Link(key)
            };

            match task.parent {
                Some((parent, rel)) => nodes[parent].relations[rel].push(child),
                None => root = Some(child),
            }
        }

        // The root task is always processed, so `root` is set.
        let root = root.unwrap_or(Child::Node(0));
        Ok(Dump { root, nodes })
    }

    fn primary_key(&self, record: RecordId, schema: SchemaId) -> Result<Value, SerializeError> {
        let resource = self.registry.schema(schema);
        let missing = || SerializeError::MissingPrimaryKey {
            resource_type: resource.type_name.clone(),
            field: resource.primary_key.clone(),
        };

        match accessor::resolve(
            self.graph,
            &SourceValue::Record(record),
            &resource.primary_key,
        ) {
            Ok(SourceValue::Scalar(Value::Null)) | Err(_) => Err(missing()),
            Ok(SourceValue::Scalar(key)) => Ok(key),
            Ok(other) => Err(SerializeError::TypeMismatch {
                resource_type: resource.type_name.clone(),
                field: resource.primary_key.clone(),
                key: None,
                expected: "scalar",
                actual: other.type_name(),
            }),
        }
    }

    /// Copy attributes and collect relationship targets of one record.
    fn expand(
        &self,
        record: RecordId,
        schema: SchemaId,
        key: Value,
        placement: Placement,
    ) -> Result<(DumpedNode, Vec<PendingChild>), SerializeError> {
        let resource = self.registry.schema(schema);
        let source = SourceValue::Record(record);
        let shown_key = Some(display_key(&key));

        let missing = |field: &str, err: MissingSegment| SerializeError::MissingAttribute {
            resource_type: resource.type_name.clone(),
            field: field.to_string(),
            segment: err.segment,
            key: shown_key.clone(),
        };
        let mismatch = |field: &str, expected: &'static str, actual: &'static str| {
            SerializeError::TypeMismatch {
                resource_type: resource.type_name.clone(),
                field: field.to_string(),
                key: shown_key.clone(),
                expected,
                actual,
            }
        };

        let mut attributes = Map::new();
        for attr in &resource.attributes {
            let value = accessor::resolve(self.graph, &source, &attr.source)
                .map_err(|e| missing(&attr.name, e))?;
            let json = self
                .graph
                .to_json(&value)
                .ok_or_else(|| mismatch(&attr.name, "acyclic value", "cyclic object"))?;
            attributes.insert(attr.name.clone(), json);
        }

        let mut children = Vec::new();
        for (index, rel) in resource.relationships.iter().enumerate() {
            let value = accessor::resolve(self.graph, &source, &rel.source)
                .map_err(|e| missing(&rel.field, e))?;
            let placement = match rel.kind {
                RelationKind::Linked => Placement::Linked,
                RelationKind::Embedded => Placement::Embedded,
            };

            match (rel.cardinality, value) {
                (Cardinality::Many, SourceValue::List(items)) => {
                    for item in items {
                        match item {
                            SourceValue::Record(id) => {
                                children.push((index, id, rel.target, placement))
                            }
                            other => return Err(mismatch(&rel.field, "object", other.type_name())),
                        }
                    }
                }
                (Cardinality::Many, other) => {
                    return Err(mismatch(&rel.field, "array", other.type_name()));
                }
                (Cardinality::One, SourceValue::Record(id)) => {
                    children.push((index, id, rel.target, placement));
                }
                (Cardinality::One, SourceValue::Scalar(Value::Null)) => {}
                (Cardinality::One, other) => {
                    return Err(mismatch(&rel.field, "object", other.type_name()));
                }
            }
        }

        let node = DumpedNode {
            schema,
            key,
            placement,
            attributes,
            relations: vec![Vec::new(); resource.relationships.len()],
        };
        Ok((node, children))
    }
}
