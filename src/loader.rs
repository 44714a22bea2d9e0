//! Loading registries and object graphs from files, strings, and HTTP URLs.
//!
//! Registry documents are checked against a built-in JSON Schema before they
//! are deserialized, so a malformed declaration is reported with a JSON
//! Pointer to the offending part rather than a bare parse error.

use std::path::Path;

use serde_json::{json, Value};

use crate::error::{DeclarationIssue, LoadError};
use crate::graph::{ObjectGraph, SourceValue};
use crate::schema::{RegistryBuilder, RegistryDecl, SchemaRegistry};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Schema every registry document must satisfy.
pub fn registry_meta_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["schemas"],
        "additionalProperties": false,
        "properties": {
            "schemas": { "type": "array", "items": { "$ref": "#/$defs/schema" } }
        },
        "$defs": {
            "name": { "type": "string", "minLength": 1 },
            "schema": {
                "type": "object",
                "required": ["type", "primary_key"],
                "additionalProperties": false,
                "properties": {
                    "type": { "$ref": "#/$defs/name" },
                    "primary_key": { "$ref": "#/$defs/name" },
                    "name": { "$ref": "#/$defs/name" },
                    "attributes": { "type": "array", "items": { "$ref": "#/$defs/attribute" } },
                    "relationships": {
                        "type": "array",
                        "items": { "$ref": "#/$defs/relationship" }
                    }
                }
            },
            "attribute": {
                "oneOf": [
                    { "$ref": "#/$defs/name" },
                    {
                        "type": "object",
                        "required": ["name"],
                        "additionalProperties": false,
                        "properties": {
                            "name": { "$ref": "#/$defs/name" },
                            "attribute": { "$ref": "#/$defs/name" }
                        }
                    }
                ]
            },
            "relationship": {
                "type": "object",
                "required": ["field", "kind", "target"],
                "additionalProperties": false,
                "properties": {
                    "field": { "$ref": "#/$defs/name" },
                    "kind": { "enum": ["linked", "embedded"] },
                    "target": { "$ref": "#/$defs/name" },
                    "many": { "type": "boolean" },
                    "attribute": { "$ref": "#/$defs/name" }
                }
            }
        }
    })
}

/// Check a registry document against [`registry_meta_schema`].
///
/// Returns every violation found; an empty list means the document is well formed.
pub fn declaration_issues(document: &Value) -> Vec<DeclarationIssue> {
    let meta = registry_meta_schema();
    let validator = match jsonschema::validator_for(&meta) {
        Ok(validator) => validator,
        Err(e) => {
            return vec![DeclarationIssue {
                path: "/".to_string(),
                message: format!("meta-schema unusable: {}", e),
            }]
        }
    };

    validator
        .iter_errors(document)
        .map(|e| DeclarationIssue {
            path: pointer_or_root(e.instance_path.to_string()),
            message: e.to_string(),
        })
        .collect()
}

/// Validate, deserialize and resolve a registry document.
///
/// # Errors
///
/// Returns `LoadError::InvalidDeclaration` for documents that break the
/// meta-schema, and `LoadError::Schema` when resolution fails.
pub fn registry_from_value(document: &Value) -> Result<SchemaRegistry, LoadError> {
    let issues = declaration_issues(document);
    if !issues.is_empty() {
        return Err(LoadError::InvalidDeclaration { issues });
    }

    let decl: RegistryDecl = serde_json::from_value(document.clone())
        .map_err(|source| LoadError::InvalidJson { source })?;
    Ok(RegistryBuilder::from_decl(decl).build()?)
}

/// Load and resolve a registry from a file path.
pub fn load_registry(path: &Path) -> Result<SchemaRegistry, LoadError> {
    registry_from_value(&load_json(path)?)
}

/// Load and resolve a registry from a JSON string.
pub fn load_registry_str(content: &str) -> Result<SchemaRegistry, LoadError> {
    registry_from_value(&load_json_str(content)?)
}

/// Load and resolve a registry from a file path or URL.
pub fn load_registry_auto(source: &str) -> Result<SchemaRegistry, LoadError> {
    registry_from_value(&load_json_auto(source)?)
}

/// Load an object graph document from a file path.
///
/// # Errors
///
/// Returns the file errors of [`load_json`] and the anchor errors of
/// [`ObjectGraph::from_json`].
pub fn load_graph(path: &Path) -> Result<(ObjectGraph, SourceValue), LoadError> {
    ObjectGraph::from_json(&load_json(path)?)
}

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "loaded file");
    load_json_str(&content)
}

/// Parse a JSON document from a string.
pub fn load_json_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the status is
/// an error, or if the body isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    tracing::debug!(url, "fetching");
    let response = client.get(url).send().map_err(network)?;

    // Check for HTTP errors before parsing
    let response = response.error_for_status().map_err(network)?;

    response.json().map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a JSON document from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_json_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_json(Path::new(source))
    }
}

fn pointer_or_root(pointer: String) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const USERS: &str = r#"{
        "schemas": [{
            "type": "users",
            "primary_key": "user_id",
            "attributes": ["name"],
            "relationships": [{"field": "best_friend", "kind": "linked", "target": "self"}]
        }]
    }"#;

    #[test]
    fn load_registry_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", USERS).unwrap();

        let registry = load_registry(file.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("users").is_ok());
    }

    #[test]
    fn load_registry_file_not_found() {
        let result = load_registry(Path::new("/nonexistent/registry.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_json_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_json(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
        assert!(matches!(
            load_json_str("not json"),
            Err(LoadError::InvalidJson { .. })
        ));
    }

    #[test]
    fn declaration_issues_point_at_offender() {
        let document = json!({
            "schemas": [{
                "type": "users",
                "primary_key": "id",
                "relationships": [{"field": "team", "kind": "nested", "target": "teams"}]
            }]
        });
        let issues = declaration_issues(&document);
        assert!(!issues.is_empty());
        assert!(issues
            .iter()
            .any(|i| i.path == "/schemas/0/relationships/0/kind"));
    }

    #[test]
    fn missing_primary_key_declaration_rejected() {
        let result = load_registry_str(r#"{"schemas": [{"type": "users"}]}"#);
        assert!(matches!(
            result,
            Err(LoadError::InvalidDeclaration { issues }) if issues[0].path == "/schemas/0"
        ));
    }

    #[test]
    fn unresolvable_target_surfaces_schema_error() {
        let result = load_registry_str(
            r#"{"schemas": [{"type": "users", "primary_key": "id",
                "relationships": [{"field": "team", "kind": "linked", "target": "TeamSchema"}]}]}"#,
        );
        assert!(matches!(
            result,
            Err(LoadError::Schema(SchemaError::UnresolvableSchemaReference { .. }))
        ));
    }

    #[test]
    fn load_graph_with_anchors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"$id": "me", "user_id": 1, "best_friend": {{"$ref": "me"}}}}"#
        )
        .unwrap();

        let (graph, root) = load_graph(file.path()).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(matches!(root, SourceValue::Record(_)));
    }

    #[test]
    fn is_url_detection() {
        assert!(is_url("https://example.com/registry.json"));
        assert!(is_url("http://example.com/registry.json"));
        assert!(!is_url("/path/to/registry.json"));
        assert!(!is_url("registry.json"));
    }

    #[test]
    fn load_registry_auto_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", USERS).unwrap();

        let registry = load_registry_auto(file.path().to_str().unwrap()).unwrap();
        assert!(registry.get("users").is_ok());
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn load_registry_from_url() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/registry.json")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(USERS)
                .create();

            let url = format!("{}/registry.json", server.url());
            let registry = load_registry_auto(&url).unwrap();
            assert!(registry.get("users").is_ok());
            mock.assert();
        }

        #[test]
        fn http_error_status_is_network_error() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/missing.json").with_status(404).create();

            let url = format!("{}/missing.json", server.url());
            let result = load_json_url(&url);
            assert!(matches!(result, Err(LoadError::NetworkError { .. })));
            assert_eq!(result.unwrap_err().exit_code(), 3);
        }
    }
}
