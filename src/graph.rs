//! Arena-backed source object graph.
//!
//! Records live in an [`ObjectGraph`] and refer to each other through
//! [`RecordId`]s, so a graph can share sub-objects and contain cycles
//! without reference counting. Identity never matters to the serializer:
//! deduplication keys on `(type, primary key)` only.
//!
//! Graphs can be built by hand or imported from JSON. On import, an object
//! carrying `"$id": "<anchor>"` can be referenced elsewhere with
//! `{"$ref": "<anchor>"}`, before or after its definition:
//!
//! ```json
//! { "$id": "alice", "user_id": 1, "best_friend": { "$ref": "alice" } }
//! ```

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::LoadError;
use crate::types::json_type_name;

/// Key declaring an anchor on an imported object.
pub const ANCHOR_KEY: &str = "$id";

/// Key of a reference object pointing at an anchor.
pub const REF_KEY: &str = "$ref";

/// Index of a record inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(usize);

/// A value reachable from a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// JSON scalar (never an array or object).
    Scalar(Value),
    Record(RecordId),
    List(Vec<SourceValue>),
}

impl SourceValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        SourceValue::Scalar(value.into())
    }

    /// Type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SourceValue::Scalar(v) => json_type_name(v),
            SourceValue::Record(_) => "object",
            SourceValue::List(_) => "array",
        }
    }
}

impl From<RecordId> for SourceValue {
    fn from(id: RecordId) -> Self {
        SourceValue::Record(id)
    }
}

impl From<Vec<SourceValue>> for SourceValue {
    fn from(items: Vec<SourceValue>) -> Self {
        SourceValue::List(items)
    }
}

/// Ordered field set of one source object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, SourceValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SourceValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a field, keeping the original position on replace.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<SourceValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SourceValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &SourceValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl From<Value> for SourceValue {
    /// Scalars only; arrays and objects need a graph, see [`ObjectGraph::import_json`].
    fn from(value: Value) -> Self {
        SourceValue::Scalar(value)
    }
}

/// Arena of records.
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    records: Vec<Record>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: Record) -> RecordId {
        self.records.push(record);
        RecordId(self.records.len() - 1)
    }

    pub fn record(&self, id: RecordId) -> &Record {
        &self.records[id.0]
    }

    /// Mutable access, used to close cycles after both ends exist.
    pub fn record_mut(&mut self, id: RecordId) -> &mut Record {
        &mut self.records[id.0]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Import a JSON document into a fresh graph.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::UnknownAnchor`, `DuplicateAnchor` or
    /// `InvalidAnchor` for broken `$id`/`$ref` usage.
    pub fn from_json(value: &Value) -> Result<(ObjectGraph, SourceValue), LoadError> {
        let mut graph = ObjectGraph::new();
        let root = graph.import_json(value)?;
        Ok((graph, root))
    }

    /// Import a JSON document into this graph, returning its root value.
    ///
    /// Anchors are scoped to this call.
    pub fn import_json(&mut self, value: &Value) -> Result<SourceValue, LoadError> {
        let mut anchors = HashMap::new();
        let root = self.import_value(value, "", &mut anchors)?;

        if let Some((anchor, slot)) = anchors.into_iter().find(|(_, slot)| !slot.defined) {
            return Err(LoadError::UnknownAnchor {
                anchor,
                path: slot.first_ref,
            });
        }
        Ok(root)
    }

    /// Render a value back to plain JSON.
    ///
    /// Returns `None` if the value reaches a record that is already on the
    /// current path, since a cyclic value has no JSON form.
    pub fn to_json(&self, value: &SourceValue) -> Option<Value> {
        self.to_json_inner(value, &mut Vec::new())
    }

    fn to_json_inner(&self, value: &SourceValue, path: &mut Vec<RecordId>) -> Option<Value> {
        match value {
            SourceValue::Scalar(v) => Some(v.clone()),
            SourceValue::List(items) => items
                .iter()
                .map(|item| self.to_json_inner(item, path))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            SourceValue::Record(id) => {
                if path.contains(id) {
                    return None;
                }
                path.push(*id);
                let mut map = Map::new();
                for (name, field) in self.record(*id).fields() {
                    map.insert(name.to_string(), self.to_json_inner(field, path)?);
                }
                path.pop();
                Some(Value::Object(map))
            }
        }
    }

    fn import_value(
        &mut self,
        value: &Value,
        path: &str,
        anchors: &mut HashMap<String, AnchorSlot>,
    ) -> Result<SourceValue, LoadError> {
        match value {
            Value::Array(items) => {
                let mut result = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}/{}", path, i);
                    result.push(self.import_value(item, &item_path, anchors)?);
                }
                Ok(SourceValue::List(result))
            }
            Value::Object(map) => self.import_object(map, path, anchors),
            other => Ok(SourceValue::Scalar(other.clone())),
        }
    }

    fn import_object(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        anchors: &mut HashMap<String, AnchorSlot>,
    ) -> Result<SourceValue, LoadError> {
        // {"$ref": "name"} is a reference, not a record
        if map.len() == 1 {
            if let Some(target) = map.get(REF_KEY) {
                let anchor = anchor_name(target, &format!("{}/{}", path, REF_KEY))?;
                let id = match anchors.get(anchor) {
                    Some(slot) => slot.id,
                    None => {
                        let id = self.insert(Record::new());
                        anchors.insert(
                            anchor.to_string(),
                            AnchorSlot {
                                id,
                                defined: false,
                                first_ref: path.to_string(),
                            },
                        );
                        id
                    }
                };
                return Ok(SourceValue::Record(id));
            }
        }

        let id = match map.get(ANCHOR_KEY) {
            Some(name) => {
                let anchor = anchor_name(name, &format!("{}/{}", path, ANCHOR_KEY))?;
                match anchors.get_mut(anchor) {
                    Some(slot) if slot.defined => {
                        return Err(LoadError::DuplicateAnchor {
                            anchor: anchor.to_string(),
                            path: path.to_string(),
                        });
                    }
                    // Referenced before definition: fill the reserved record
                    Some(slot) => {
                        slot.defined = true;
                        slot.id
                    }
                    None => {
                        let id = self.insert(Record::new());
                        anchors.insert(
                            anchor.to_string(),
                            AnchorSlot {
                                id,
                                defined: true,
                                first_ref: path.to_string(),
                            },
                        );
                        id
                    }
                }
            }
            None => self.insert(Record::new()),
        };

        for (key, field) in map {
            if key == ANCHOR_KEY {
                continue;
            }
            let field_path = format!("{}/{}", path, key);
            let imported = self.import_value(field, &field_path, anchors)?;
            self.record_mut(id).set(key.clone(), imported);
        }

        Ok(SourceValue::Record(id))
    }
}

struct AnchorSlot {
    id: RecordId,
    defined: bool,
    first_ref: String,
}

fn anchor_name<'v>(value: &'v Value, path: &str) -> Result<&'v str, LoadError> {
    value.as_str().ok_or_else(|| LoadError::InvalidAnchor {
        path: path.to_string(),
        actual: json_type_name(value).to_string(),
    })
}
