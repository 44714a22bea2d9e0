//! Registry checking - static analysis of declaration files.
//!
//! Reports, per file:
//! - JSON syntax errors
//! - declaration shape errors (against the registry meta-schema)
//! - duplicate types, aliases and fields
//! - type names that collide with envelope keys
//! - relationship targets that name no schema
//! - primary keys that never reach the serialized body, and embedding cycles

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::loader::{declaration_issues, load_json};
use crate::schema::{RegistryDecl, SchemaDecl};
use crate::types::{RelationKind, RESERVED_TYPE_NAMES, SELF_REFERENCE};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from checking.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/schemas/0/relationships/1/target")
    pub path: String,
    pub message: String,
}

/// Result of checking a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a checked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of checking a registry file or a directory of them.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl CheckResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Check a registry file, or every `.json` file below a directory.
///
/// If `strict` is true, files with warnings count as failed.
pub fn check(path: &Path, strict: bool) -> CheckResult {
    let files = collect_registry_files(path);
    let base = if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    };
    let results: Vec<FileResult> = files.iter().map(|f| check_file(f, base)).collect();

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| match r.status {
            FileStatus::Ok => false,
            FileStatus::Warning => strict,
            FileStatus::Error => true,
        })
        .count();

    tracing::debug!(files = files.len(), errors, warnings, "check finished");

    CheckResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Check a single registry declaration file.
pub fn check_file(file: &Path, base_path: &Path) -> FileResult {
    let mut report = Report::new(file);

    match load_json(file) {
        Err(e) => report.error("E001", "/", format!("syntax error: {}", e)),
        Ok(document) => {
            let issues = declaration_issues(&document);
            for issue in &issues {
                report.error("E002", &issue.path, issue.message.clone());
            }
            if issues.is_empty() {
                match serde_json::from_value::<RegistryDecl>(document) {
                    Ok(decl) => check_declarations(&decl, &mut report),
                    Err(e) => report.error("E002", "/", e.to_string()),
                }
            }
        }
    }

    report.finish(base_path)
}

struct Report {
    file: PathBuf,
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, severity: Severity, code: &str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: self.file.clone(),
            path: path.to_string(),
            message,
        });
    }

    fn error(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Error, code, path, message);
    }

    fn warning(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Warning, code, path, message);
    }

    fn finish(self, base_path: &Path) -> FileResult {
        let has = |severity: Severity| self.diagnostics.iter().any(|d| d.severity == severity);
        let status = if has(Severity::Error) {
            FileStatus::Error
        } else if has(Severity::Warning) {
            FileStatus::Warning
        } else {
            FileStatus::Ok
        };

        FileResult {
            file: self
                .file
                .strip_prefix(base_path)
                .unwrap_or(self.file.as_path())
                .to_path_buf(),
            status,
            diagnostics: self.diagnostics,
        }
    }
}

fn check_declarations(decl: &RegistryDecl, report: &mut Report) {
    let mut by_type: HashMap<&str, usize> = HashMap::new();
    let mut by_alias: HashMap<&str, usize> = HashMap::new();

    for (i, schema) in decl.schemas.iter().enumerate() {
        if RESERVED_TYPE_NAMES.contains(&schema.type_name.as_str()) {
            report.error(
                "E006",
                &format!("/schemas/{}/type", i),
                format!(
                    "resource type \"{}\" collides with a reserved envelope key",
                    schema.type_name
                ),
            );
        }
        if by_type.insert(&schema.type_name, i).is_some() {
            report.error(
                "E003",
                &format!("/schemas/{}/type", i),
                format!("resource type \"{}\" is declared more than once", schema.type_name),
            );
        }
        if let Some(alias) = &schema.name {
            if by_alias.insert(alias, i).is_some() {
                report.error(
                    "E003",
                    &format!("/schemas/{}/name", i),
                    format!("schema alias \"{}\" is declared more than once", alias),
                );
            }
        }
    }

    let resolve = |owner: usize, target: &str| {
        if target == SELF_REFERENCE {
            Some(owner)
        } else {
            by_type.get(target).or_else(|| by_alias.get(target)).copied()
        }
    };

    // Embedded edges: (owner, relationship index, target).
    let mut embedded: Vec<(usize, usize, usize)> = Vec::new();

    for (i, schema) in decl.schemas.iter().enumerate() {
        check_fields(i, schema, report);

        for (j, rel) in schema.relationships.iter().enumerate() {
            match resolve(i, &rel.target) {
                None => report.error(
                    "E004",
                    &format!("/schemas/{}/relationships/{}/target", i, j),
                    format!(
                        "field \"{}\" references unknown schema \"{}\"",
                        rel.field, rel.target
                    ),
                ),
                Some(target) if rel.kind == RelationKind::Embedded => {
                    embedded.push((i, j, target))
                }
                Some(_) => {}
            }
        }

        let pk_is_attribute = schema
            .attributes
            .iter()
            .any(|a| a.name() == schema.primary_key);
        if !pk_is_attribute {
            report.warning(
                "W001",
                &format!("/schemas/{}/primary_key", i),
                format!(
                    "primary key \"{}\" is not an attribute and will not appear in bodies",
                    schema.primary_key
                ),
            );
        }
    }

    for &(owner, j, target) in &embedded {
        if embeds(&embedded, target, owner) {
            report.warning(
                "W002",
                &format!("/schemas/{}/relationships/{}", owner, j),
                format!(
                    "embedding \"{}\" leads back to \"{}\"",
                    decl.schemas[owner].relationships[j].field, decl.schemas[owner].type_name
                ),
            );
        }
    }
}

fn check_fields(index: usize, schema: &SchemaDecl, report: &mut Report) {
    let mut seen = HashSet::new();
    let attributes = schema
        .attributes
        .iter()
        .enumerate()
        .map(|(k, a)| (format!("/schemas/{}/attributes/{}", index, k), a.name()));
    let relationships = schema
        .relationships
        .iter()
        .enumerate()
        .map(|(j, r)| (format!("/schemas/{}/relationships/{}/field", index, j), r.field.as_str()));

    for (path, name) in attributes.chain(relationships) {
        if !seen.insert(name) {
            report.error(
                "E005",
                &path,
                format!("field \"{}\" is declared more than once", name),
            );
        }
    }
}

/// Whether `to` can be reached from `from` through embedded edges alone.
fn embeds(edges: &[(usize, usize, usize)], from: usize, to: usize) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        stack.extend(
            edges
                .iter()
                .filter(|(owner, _, _)| *owner == current)
                .map(|(_, _, target)| *target),
        );
    }
    false
}

/// Collect all .json files in a path (file or directory).
fn collect_registry_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}
