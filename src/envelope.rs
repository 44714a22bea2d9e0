//! The serialized envelope.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::linked::LinkedStore;
use crate::root_links::RootLinksMap;
use crate::types::{LINKED_KEY, LINKS_KEY};

/// Primary data: one body, or one body per batch item.
#[derive(Debug, Clone, PartialEq)]
pub enum Primary {
    One(Map<String, Value>),
    Many(Vec<Map<String, Value>>),
}

impl Primary {
    pub fn to_json(&self) -> Value {
        match self {
            Primary::One(body) => Value::Object(body.clone()),
            Primary::Many(bodies) => {
                Value::Array(bodies.iter().cloned().map(Value::Object).collect())
            }
        }
    }
}

impl Serialize for Primary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Primary::One(body) => body.serialize(serializer),
            Primary::Many(bodies) => bodies.serialize(serializer),
        }
    }
}

/// `{<root type>: primary, "linked": store, "links": map}`.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub root_type: String,
    pub primary: Primary,
    pub linked: LinkedStore,
    pub links: RootLinksMap,
}

impl Envelope {
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.root_type.clone(), self.primary.to_json());
        map.insert(LINKED_KEY.to_string(), self.linked.to_json());
        map.insert(LINKS_KEY.to_string(), self.links.to_json());
        Value::Object(map)
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(&self.root_type, &self.primary)?;
        map.serialize_entry(LINKED_KEY, &self.linked)?;
        map.serialize_entry(LINKS_KEY, &self.links)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_batch_shape() {
        let envelope = Envelope {
            root_type: "events".into(),
            primary: Primary::Many(Vec::new()),
            linked: LinkedStore::new(),
            links: RootLinksMap::new(),
        };
        let expected = json!({"events": [], "linked": {}, "links": {}});
        assert_eq!(envelope.to_json(), expected);
        assert_eq!(serde_json::to_value(&envelope).unwrap(), expected);
    }

    #[test]
    fn serialized_text_keeps_root_first() {
        let mut body = Map::new();
        body.insert("id".into(), json!(1));
        let envelope = Envelope {
            root_type: "users".into(),
            primary: Primary::One(body),
            linked: LinkedStore::new(),
            links: RootLinksMap::new(),
        };
        assert_eq!(
            serde_json::to_string(&envelope).unwrap(),
            r#"{"users":{"id":1},"linked":{},"links":{}}"#
        );
    }
}
