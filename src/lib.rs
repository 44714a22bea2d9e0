//! Sideload
//!
//! Schema-driven serialization of cyclic object graphs into a flat,
//! deduplicated envelope with side-loaded related resources.
//!
//! Every resource type declares its primary key, its attributes and its
//! relationships. A relationship is either *linked* (the target is replaced
//! by its id under `links` and moved once into the top-level `linked` store)
//! or *embedded* (the target stays inline, but its own linked descendants
//! still bubble up to the top).
//!
//! # Example
//!
//! ```
//! use sideload::{ObjectGraph, RelationshipDecl, SchemaDecl, SchemaRegistry, Serializer};
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::builder()
//!     .declare(
//!         SchemaDecl::new("users", "id")
//!             .attributes(["id", "name"])
//!             .relationship(RelationshipDecl::linked("best_friend", "self")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! // Alice and Bob are each other's best friend.
//! let (graph, alice) = ObjectGraph::from_json(&json!({
//!     "$id": "alice", "id": 1, "name": "Alice",
//!     "best_friend": {"id": 2, "name": "Bob", "best_friend": {"$ref": "alice"}}
//! }))
//! .unwrap();
//!
//! let users = registry.get("users").unwrap();
//! let envelope = Serializer::new(&registry)
//!     .serialize(&graph, &alice, users, false)
//!     .unwrap();
//!
//! assert_eq!(
//!     envelope.to_json(),
//!     json!({
//!         "users": {"id": 1, "name": "Alice", "links": {"best_friend": 2}},
//!         "linked": {"users": [{"id": 2, "name": "Bob", "links": {"best_friend": 1}}]},
//!         "links": {"users.best_friend": {"type": "users"}}
//!     })
//! );
//! ```
//!
//! # Relationship kinds
//!
//! | Kind | In the body | In `linked` |
//! |------|-------------|-------------|
//! | `linked` | id (or id list) under `links` | full body, once per (type, key) |
//! | `embedded` | full body inline | never, but linked descendants are |
//!
//! A resource already expanded earlier in the same call is emitted as a link
//! marker `{"id": key}` wherever it is embedded again.

mod accessor;
mod checker;
mod envelope;
mod error;
mod graph;
mod linked;
mod links;
mod loader;
mod root_links;
mod schema;
mod serializer;
mod types;
mod walker;

pub use accessor::{resolve, MissingSegment};
pub use checker::{check, check_file, CheckResult, Diagnostic, FileResult, FileStatus, Severity};
pub use envelope::{Envelope, Primary};
pub use error::{DeclarationIssue, LoadError, SchemaError, SerializeError};
pub use graph::{ObjectGraph, Record, RecordId, SourceValue};
pub use linked::{aggregate, Aggregated, LinkedEntry, LinkedStore};
pub use links::extract_links;
pub use loader::{
    declaration_issues, is_url, load_graph, load_json, load_json_auto, load_json_str,
    load_registry, load_registry_auto, load_registry_str, registry_from_value,
    registry_meta_schema,
};
pub use root_links::{describe, RootLinksMap};
pub use schema::{
    Attribute, AttributeDecl, RegistryBuilder, RegistryDecl, Relationship, RelationshipDecl,
    ResourceType, SchemaDecl, SchemaId, SchemaRegistry,
};
pub use serializer::Serializer;
pub use types::{Cardinality, RelationKind, SerializeOptions};
pub use walker::{Child, Dump, DumpedNode, GraphWalker, Placement, VisitedSet};

#[cfg(feature = "remote")]
pub use loader::load_json_url;
