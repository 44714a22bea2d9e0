//! Entry point: single and batch serialization into an [`Envelope`].

use serde_json::Value;

use crate::envelope::{Envelope, Primary};
use crate::error::SerializeError;
use crate::graph::{ObjectGraph, SourceValue};
use crate::linked::{aggregate, Aggregated, LinkedStore};
use crate::root_links::{describe, RootLinksMap};
use crate::schema::{SchemaId, SchemaRegistry};
use crate::types::SerializeOptions;
use crate::walker::{GraphWalker, VisitedSet, ROOT_FIELD};

/// Serializes object graphs against a resolved registry.
///
/// Holds no traversal state; every call allocates its own visited set and
/// store, so one serializer can be shared freely.
#[derive(Debug, Clone)]
pub struct Serializer<'a> {
    registry: &'a SchemaRegistry,
    options: SerializeOptions,
}

impl<'a> Serializer<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self::with_options(registry, SerializeOptions::default())
    }

    pub fn with_options(registry: &'a SchemaRegistry, options: SerializeOptions) -> Self {
        Self { registry, options }
    }

    /// Serialize `input` as `schema`, or as a list of `schema` when `many`.
    ///
    /// # Errors
    ///
    /// Returns `SerializeError::TypeMismatch` if `many` is set and `input`
    /// is not a list, plus any error from walking the graph.
    pub fn serialize(
        &self,
        graph: &ObjectGraph,
        input: &SourceValue,
        schema: SchemaId,
        many: bool,
    ) -> Result<Envelope, SerializeError> {
        if !many {
            return self.serialize_one(graph, input, schema);
        }
        match input {
            SourceValue::List(items) => self.serialize_many(graph, items, schema),
            other => Err(SerializeError::TypeMismatch {
                resource_type: self.registry.schema(schema).type_name.clone(),
                field: ROOT_FIELD.to_string(),
                key: None,
                expected: "array",
                actual: other.type_name(),
            }),
        }
    }

    /// Serialize a single top-level resource.
    pub fn serialize_one(
        &self,
        graph: &ObjectGraph,
        input: &SourceValue,
        schema: SchemaId,
    ) -> Result<Envelope, SerializeError> {
        let root_type = self.registry.schema(schema).type_name.clone();
        tracing::debug!(resource_type = %root_type, "serialize");

        let item = self.serialize_item(graph, input, schema)?;
        Ok(Envelope {
            root_type,
            primary: Primary::One(item.body),
            linked: item.linked,
            links: describe(self.registry, schema),
        })
    }

    /// Serialize a batch. Each item is walked with its own visited set.
    pub fn serialize_many(
        &self,
        graph: &ObjectGraph,
        items: &[SourceValue],
        schema: SchemaId,
    ) -> Result<Envelope, SerializeError> {
        let root_type = self.registry.schema(schema).type_name.clone();
        tracing::debug!(resource_type = %root_type, items = items.len(), "serialize batch");

        if items.is_empty() {
            return Ok(Envelope {
                root_type,
                primary: Primary::Many(Vec::new()),
                linked: LinkedStore::new(),
                links: RootLinksMap::new(),
            });
        }

        let dedup = self.options.dedup_across_items;
        let mut bodies = Vec::with_capacity(items.len());
        let mut root_keys: Vec<Value> = Vec::with_capacity(items.len());
        let mut linked = LinkedStore::new();

        for item in items {
            let result = self.serialize_item(graph, item, schema)?;
            bodies.push(result.body);
            root_keys.push(result.key);
            linked.merge(result.linked, dedup);
        }

        // A top-level item already present as primary data is not side-loaded again.
        if dedup {
            linked.remove_keys(&root_type, &root_keys);
        }

        Ok(Envelope {
            root_type,
            primary: Primary::Many(bodies),
            linked,
            links: describe(self.registry, schema),
        })
    }

    fn serialize_item(
        &self,
        graph: &ObjectGraph,
        input: &SourceValue,
        schema: SchemaId,
    ) -> Result<Aggregated, SerializeError> {
        let mut visited = VisitedSet::new();
        let dump = GraphWalker::new(self.registry, graph).dump(input, schema, &mut visited)?;
        tracing::trace!(visited = visited.len(), "walk finished");
        Ok(aggregate(self.registry, dump))
    }
}
