//! Manifest schema validation
//!
//! Runs the embedded draft-07 schema over a manifest document and reports
//! every violation in one pass. A document that passes is then parsed into
//! the typed [`PluginManifest`]. A document that is not JSON at all yields a
//! single parse-error violation and no further checks.

use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::debug;

use crate::plugin::manifest::{PluginManifest, PLUGIN_DIR, PLUGIN_JSON};
use crate::validate::{Violation, ViolationKind};

/// Draft-07 schema for plugin.json
pub const SCHEMA_SOURCE: &str = include_str!("../../schema/plugin.schema.json");

static SCHEMA: Lazy<Value> =
    Lazy::new(|| serde_json::from_str(SCHEMA_SOURCE).expect("embedded plugin schema is valid JSON"));

static VALIDATOR: Lazy<Validator> =
    Lazy::new(|| jsonschema::draft7::new(&SCHEMA).expect("embedded plugin schema compiles"));

/// Validate raw manifest bytes, collecting every violation. Bytes that are
/// not UTF-8 JSON are a parse error like any other malformed document.
pub fn check_manifest_slice(content: &[u8]) -> Result<PluginManifest, Vec<Violation>> {
    let document: Value = serde_json::from_slice(content).map_err(|e| {
        vec![Violation::new(
            ViolationKind::ParseError,
            manifest_locator(),
            format!("manifest is not valid JSON: {}", e),
        )]
    })?;
    check_manifest_value(&document)
}

/// Validate an already-parsed manifest document.
pub fn check_manifest_value(document: &Value) -> Result<PluginManifest, Vec<Violation>> {
    let violations: Vec<Violation> = VALIDATOR
        .iter_errors(document)
        .map(|error| {
            let pointer = error.instance_path.to_string();
            match &error.kind {
                ValidationErrorKind::Required { property } => {
                    let field = property
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| property.to_string());
                    Violation::new(
                        ViolationKind::MissingField,
                        format!("{}/{}", pointer, field),
                        format!("missing required field '{}'", field),
                    )
                }
                _ => Violation::new(
                    ViolationKind::SchemaType,
                    locator_or_root(pointer),
                    error.to_string(),
                ),
            }
        })
        .collect();

    if !violations.is_empty() {
        debug!(count = violations.len(), "manifest failed schema validation");
        return Err(violations);
    }

    let manifest: PluginManifest = serde_json::from_value(document.clone()).map_err(|e| {
        vec![Violation::new(
            ViolationKind::SchemaType,
            "/",
            format!("manifest does not match the plugin model: {}", e),
        )]
    })?;

    // The schema pattern admits only semver-shaped strings; this confirms it parses.
    if let Err(e) = semver::Version::parse(&manifest.version) {
        return Err(vec![Violation::new(
            ViolationKind::SchemaType,
            "/version",
            format!("'{}' is not a semantic version: {}", manifest.version, e),
        )]);
    }

    Ok(manifest)
}

/// Locator used for violations about the manifest file itself
pub fn manifest_locator() -> String {
    format!("{}/{}", PLUGIN_DIR, PLUGIN_JSON)
}

fn locator_or_root(pointer: String) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "name": "my-plugin",
        "version": "0.1.0",
        "description": "Example plugin",
        "author": { "name": "Jane Doe", "email": "jane@example.com" },
        "category": "development",
        "homepage": "https://example.com/my-plugin",
        "commands": "./commands/"
    }"#;

    #[test]
    fn embedded_schema_compiles() {
        assert!(!VALIDATOR.is_valid(&serde_json::json!({})));
        assert!(SCHEMA.get("required").is_some());
    }

    #[test]
    fn valid_manifest_parses() {
        let manifest = check_manifest_slice(VALID.as_bytes()).unwrap();
        assert_eq!(manifest.name, "my-plugin");
        assert_eq!(manifest.author.name, "Jane Doe");
    }

    #[test]
    fn missing_author_is_reported() {
        let content = r#"{
            "name": "my-plugin",
            "version": "0.1.0",
            "description": "Example plugin",
            "category": "development"
        }"#;
        let violations = check_manifest_slice(content.as_bytes()).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::MissingField);
        assert_eq!(violations[0].locator, "/author");
        assert!(violations[0].message.contains("author"));
    }

    #[test]
    fn all_violations_are_collected() {
        let content = r#"{
            "name": "My_Plugin",
            "version": 3,
            "author": { "name": "Jane" },
            "category": "games",
            "commands": "commands/"
        }"#;
        let violations = check_manifest_slice(content.as_bytes()).unwrap_err();
        let locators: Vec<&str> = violations.iter().map(|v| v.locator.as_str()).collect();

        assert!(locators.contains(&"/description"));
        assert!(locators.contains(&"/name"));
        assert!(locators.contains(&"/version"));
        assert!(locators.contains(&"/category"));
        assert!(locators.contains(&"/commands"));
        assert!(violations.len() >= 5);
    }

    #[test]
    fn unparseable_manifest_short_circuits() {
        let violations = check_manifest_slice(b"{ not json").unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ParseError);
        assert_eq!(violations[0].locator, ".claude-plugin/plugin.json");
    }

    #[test]
    fn non_utf8_manifest_is_a_parse_error() {
        let violations = check_manifest_slice(b"\xff\xfe{}").unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ParseError);
    }

    #[test]
    fn non_object_manifest_is_a_type_violation() {
        let violations = check_manifest_slice(b"[1, 2, 3]").unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::SchemaType && v.locator == "/"));
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let mut doc: Value = serde_json::from_str(VALID).unwrap();
        doc["mcpServers"] = serde_json::json!({ "demo": { "command": "demo" } });
        assert!(check_manifest_value(&doc).is_ok());
    }
}
