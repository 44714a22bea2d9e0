//! Core types shared by schemas, the walker and the serializer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between segments of a dotted attribute path.
pub const PATH_SEPARATOR: char = '.';

/// Relationship target naming the declaring schema itself.
pub const SELF_REFERENCE: &str = "self";

/// Envelope key holding the side-loaded store.
pub const LINKED_KEY: &str = "linked";

/// Key holding relationship references (per resource and per envelope).
pub const LINKS_KEY: &str = "links";

/// Envelope keys a resource type name may not take.
pub const RESERVED_TYPE_NAMES: [&str; 2] = [LINKED_KEY, LINKS_KEY];

/// Key carried by a link marker rendered inline.
pub const LINK_MARKER_KEY: &str = "id";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Renders a primary-key value the way error messages and logs show it.
///
/// Strings are shown bare, everything else as JSON text.
pub fn display_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How a relationship's target is placed in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Target moves to the side-loaded store; the body keeps its id.
    Linked,
    /// Target stays inline in the parent body.
    Embedded,
}

/// Whether a relationship holds one related object or a list of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

impl Cardinality {
    /// Create cardinality from a `many` flag.
    pub fn from_many_flag(many: bool) -> Self {
        if many {
            Cardinality::Many
        } else {
            Cardinality::One
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Cardinality::Many)
    }
}

/// Options for a serialize() call.
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// When true, batch serialization drops linked entries whose
    /// (type, key) was already contributed by an earlier item, or that
    /// duplicate one of the top-level items. Defaults to true.
    pub dedup_across_items: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializeOptions {
    /// Create options with cross-item deduplication enabled.
    pub fn new() -> Self {
        Self {
            dedup_across_items: true,
        }
    }

    /// Set cross-item deduplication for batch serialization.
    pub fn dedup_across_items(mut self, dedup: bool) -> Self {
        self.dedup_across_items = dedup;
        self
    }
}
