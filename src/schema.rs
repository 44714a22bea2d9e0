//! Resource schema declarations and the two-phase registry.
//!
//! Schemas are first declared (possibly naming targets that are declared
//! later, or `"self"`), then [`RegistryBuilder::build`] binds every
//! relationship target to a concrete schema. A built [`SchemaRegistry`] is
//! immutable and holds no traversal state, so one registry can back any
//! number of concurrent serialize() calls.
//!
//! # Example
//!
//! ```
//! use sideload::{RelationshipDecl, SchemaDecl, SchemaRegistry};
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
//! let users = registry.get("users").unwrap();
//! assert_eq!(registry.schema(users).relationships[0].target, users);
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::types::{Cardinality, RelationKind, RESERVED_TYPE_NAMES, SELF_REFERENCE};

/// Index of a resolved schema inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(usize);

/// Top-level registry declaration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDecl {
    pub schemas: Vec<SchemaDecl>,
}

/// Declaration of one resource type, before target resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDecl {
    #[serde(rename = "type")]
    pub type_name: String,
    pub primary_key: String,
    /// Optional alias relationship targets may use instead of the type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDecl>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDecl>,
}

impl SchemaDecl {
    pub fn new(type_name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            primary_key: primary_key.into(),
            name: None,
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Set the alias this schema can be targeted by.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append attributes copied verbatim from same-named source fields.
    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .extend(names.into_iter().map(|n| AttributeDecl::Name(n.into())));
        self
    }

    /// Append an attribute read from a dotted source path.
    pub fn attribute_from(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.attributes.push(AttributeDecl::Mapped {
            name: name.into(),
            attribute: Some(path.into()),
        });
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDecl) -> Self {
        self.relationships.push(relationship);
        self
    }
}

/// Attribute declaration: either a bare field name or a name with a source path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeDecl {
    Name(String),
    Mapped {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
    },
}

impl AttributeDecl {
    pub fn name(&self) -> &str {
        match self {
            AttributeDecl::Name(name) | AttributeDecl::Mapped { name, .. } => name,
        }
    }

    /// Source path, defaulting to the attribute name.
    pub fn source(&self) -> &str {
        match self {
            AttributeDecl::Name(name) => name,
            AttributeDecl::Mapped {
                name, attribute, ..
            } => attribute.as_deref().unwrap_or(name),
        }
    }
}

/// Relationship declaration with a possibly deferred target name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDecl {
    pub field: String,
    pub kind: RelationKind,
    /// Target type name, schema alias, or `"self"`.
    pub target: String,
    #[serde(default)]
    pub many: bool,
    /// Dotted source path, defaulting to the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl RelationshipDecl {
    pub fn linked(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RelationKind::Linked, field, target)
    }

    pub fn embedded(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(RelationKind::Embedded, field, target)
    }

    fn new(kind: RelationKind, field: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            target: target.into(),
            many: false,
            attribute: None,
        }
    }

    pub fn many(mut self, many: bool) -> Self {
        self.many = many;
        self
    }

    pub fn attribute(mut self, path: impl Into<String>) -> Self {
        self.attribute = Some(path.into());
        self
    }
}

/// A copied attribute: output name plus source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub source: String,
}

/// A relationship with its target bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub field: String,
    pub kind: RelationKind,
    pub cardinality: Cardinality,
    pub target: SchemaId,
    pub source: String,
}

impl Relationship {
    pub fn is_linked(&self) -> bool {
        self.kind == RelationKind::Linked
    }
}

/// Immutable metadata of one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    pub type_name: String,
    pub alias: Option<String>,
    pub primary_key: String,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
}

impl ResourceType {
    /// True if at least one relationship is side-loaded, which is what
    /// gives serialized bodies of this type a `links` record.
    pub fn has_linked_relationships(&self) -> bool {
        self.relationships.iter().any(Relationship::is_linked)
    }
}

/// Resolved, read-only set of resource schemas.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<ResourceType>,
    by_type: HashMap<String, SchemaId>,
}

impl SchemaRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a schema by type name or alias.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownType` if no schema answers to `name`.
    pub fn get(&self, name: &str) -> Result<SchemaId, SchemaError> {
        self.by_type
            .get(name)
            .copied()
            .or_else(|| self.find_alias(name))
            .ok_or_else(|| SchemaError::UnknownType {
                type_name: name.to_string(),
            })
    }

    pub fn schema(&self, id: SchemaId) -> &ResourceType {
        &self.schemas[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &ResourceType)> {
        self.schemas
            .iter()
            .enumerate()
            .map(|(i, schema)| (SchemaId(i), schema))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    fn find_alias(&self, name: &str) -> Option<SchemaId> {
        self.schemas
            .iter()
            .position(|s| s.alias.as_deref() == Some(name))
            .map(SchemaId)
    }
}

/// Collects declarations; `build` runs the resolution pass.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    decls: Vec<SchemaDecl>,
}

impl RegistryBuilder {
    pub fn from_decl(decl: RegistryDecl) -> Self {
        Self {
            decls: decl.schemas,
        }
    }

    pub fn declare(mut self, decl: SchemaDecl) -> Self {
        self.decls.push(decl);
        self
    }

    /// Bind every relationship target and freeze the registry.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::ReservedTypeName` for a type named like an
    /// envelope key, `DuplicateType`, `DuplicateAlias` or `DuplicateField`
    /// for conflicting declarations, and `UnresolvableSchemaReference` for a
    /// target that names no schema.
    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut by_type = HashMap::new();
        let mut by_alias = HashMap::new();

        for (i, decl) in self.decls.iter().enumerate() {
            if RESERVED_TYPE_NAMES.contains(&decl.type_name.as_str()) {
                return Err(SchemaError::ReservedTypeName {
                    type_name: decl.type_name.clone(),
                });
            }
            if by_type.insert(decl.type_name.clone(), SchemaId(i)).is_some() {
                return Err(SchemaError::DuplicateType {
                    type_name: decl.type_name.clone(),
                });
            }
            if let Some(alias) = &decl.name {
                if by_alias.insert(alias.clone(), SchemaId(i)).is_some() {
                    return Err(SchemaError::DuplicateAlias {
                        alias: alias.clone(),
                    });
                }
            }
        }

        let mut schemas = Vec::with_capacity(self.decls.len());
        for (i, decl) in self.decls.into_iter().enumerate() {
            check_unique_fields(&decl)?;

            let mut relationships = Vec::with_capacity(decl.relationships.len());
            for rel in decl.relationships {
                let target = if rel.target == SELF_REFERENCE {
                    SchemaId(i)
                } else {
                    by_type
                        .get(&rel.target)
                        .or_else(|| by_alias.get(&rel.target))
                        .copied()
                        .ok_or_else(|| SchemaError::UnresolvableSchemaReference {
                            owner: decl.type_name.clone(),
                            field: rel.field.clone(),
                            target: rel.target.clone(),
                        })?
                };
                let source = rel.attribute.unwrap_or_else(|| rel.field.clone());
                relationships.push(Relationship {
                    field: rel.field,
                    kind: rel.kind,
                    cardinality: Cardinality::from_many_flag(rel.many),
                    target,
                    source,
                });
            }

            let attributes = decl
                .attributes
                .iter()
                .map(|a| Attribute {
                    name: a.name().to_string(),
                    source: a.source().to_string(),
                })
                .collect();

            schemas.push(ResourceType {
                type_name: decl.type_name,
                alias: decl.name,
                primary_key: decl.primary_key,
                attributes,
                relationships,
            });
        }

        tracing::debug!(schemas = schemas.len(), "schema registry resolved");
        Ok(SchemaRegistry { schemas, by_type })
    }
}

fn check_unique_fields(decl: &SchemaDecl) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    let names = decl
        .attributes
        .iter()
        .map(AttributeDecl::name)
        .chain(decl.relationships.iter().map(|r| r.field.as_str()));
    for name in names {
        if !seen.insert(name) {
            return Err(SchemaError::DuplicateField {
                owner: decl.type_name.clone(),
                field: name.to_string(),
            });
        }
    }
    Ok(())
}
