//! Error types for registry building, graph loading and serialization.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors while declaring and resolving resource schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema '{owner}' field '{field}' references unknown schema '{target}'")]
    UnresolvableSchemaReference {
        owner: String,
        field: String,
        target: String,
    },

    #[error("resource type '{type_name}' collides with a reserved envelope key")]
    ReservedTypeName { type_name: String },

    #[error("resource type '{type_name}' is declared more than once")]
    DuplicateType { type_name: String },

    #[error("schema alias '{alias}' is declared more than once")]
    DuplicateAlias { alias: String },

    #[error("schema '{owner}' declares field '{field}' more than once")]
    DuplicateField { owner: String, field: String },

    #[error("unknown resource type '{type_name}'")]
    UnknownType { type_name: String },
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while loading registries and object graphs.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid registry declaration with {} issue(s)", issues.len())]
    InvalidDeclaration { issues: Vec<DeclarationIssue> },

    #[error("unknown anchor \"{anchor}\" referenced at {path}")]
    UnknownAnchor { anchor: String, path: String },

    #[error("anchor \"{anchor}\" declared more than once (again at {path})")]
    DuplicateAnchor { anchor: String, path: String },

    #[error("invalid anchor at {path}: expected string, got {actual}")]
    InvalidAnchor { path: String, actual: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Single declaration problem with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeclarationIssue {
    /// JSON Pointer (RFC 6901) to the offending part of the declaration.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl fmt::Display for DeclarationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors during a serialize() call. None of them leaves a partial envelope.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("{resource_type}: primary key '{field}' is missing or null")]
    MissingPrimaryKey {
        resource_type: String,
        field: String,
    },

    #[error("{resource_type}{}: missing value for '{field}' (segment '{segment}')", KeySuffix(key))]
    MissingAttribute {
        resource_type: String,
        field: String,
        segment: String,
        key: Option<String>,
    },

    #[error("{resource_type}{}: field '{field}' expected {expected}, got {actual}", KeySuffix(key))]
    TypeMismatch {
        resource_type: String,
        field: String,
        key: Option<String>,
        expected: &'static str,
        actual: &'static str,
    },
}

impl SerializeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Renders `[key]` after a resource type when the key is known.
struct KeySuffix<'a>(&'a Option<String>);

impl fmt::Display for KeySuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(key) => write!(f, "[{}]", key),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("registry.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::UnknownAnchor {
            anchor: "bob".into(),
            path: "/best_friend".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = LoadError::Schema(SchemaError::UnknownType {
            type_name: "users".into(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn serialize_error_names_type_field_and_key() {
        let err = SerializeError::MissingAttribute {
            resource_type: "users".into(),
            field: "name".into(),
            segment: "name".into(),
            key: Some("1".into()),
        };
        assert_eq!(
            err.to_string(),
            "users[1]: missing value for 'name' (segment 'name')"
        );

        let err = SerializeError::TypeMismatch {
            resource_type: "users".into(),
            field: "friends".into(),
            key: None,
            expected: "array",
            actual: "object",
        };
        assert_eq!(
            err.to_string(),
            "users: field 'friends' expected array, got object"
        );
    }

    #[test]
    fn declaration_issue_display() {
        let issue = DeclarationIssue {
            path: "/schemas/0/type".into(),
            message: "expected string, got number".into(),
        };
        assert_eq!(
            issue.to_string(),
            "/schemas/0/type: expected string, got number"
        );
    }
}
