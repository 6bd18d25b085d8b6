//! Validator pair
//!
//! Schema validation (collect-all) always runs first; structural validation
//! (fail-fast) runs only when the manifest passed the schema.

pub mod structure;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GateError, Result};
use crate::plugin::schema::{check_manifest_slice, manifest_locator};
use crate::plugin::PluginManifest;

pub use structure::{check_structure, StructuralCheck, StructureContext, STRUCTURAL_CHECKS};

/// Violation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    ParseError,
    SchemaType,
    MissingField,
    DanglingPath,
    Permission,
    Naming,
    VersionMismatch,
    EmptyDirectory,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseError => "parse-error",
            Self::SchemaType => "schema-type",
            Self::MissingField => "missing-field",
            Self::DanglingPath => "dangling-path",
            Self::Permission => "permission",
            Self::Naming => "naming",
            Self::VersionMismatch => "version-mismatch",
            Self::EmptyDirectory => "empty-directory",
        }
    }

    /// Violations produced by the schema stage
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            Self::ParseError | Self::SchemaType | Self::MissingField
        )
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ViolationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "parse-error" => Ok(Self::ParseError),
            "schema-type" => Ok(Self::SchemaType),
            "missing-field" => Ok(Self::MissingField),
            "dangling-path" => Ok(Self::DanglingPath),
            "permission" => Ok(Self::Permission),
            "naming" => Ok(Self::Naming),
            "version-mismatch" => Ok(Self::VersionMismatch),
            "empty-directory" => Ok(Self::EmptyDirectory),
            other => Err(format!("unknown violation kind: {}", other)),
        }
    }
}

/// A single schema or structural violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Field path (`/author/name`) or file path relative to the plugin root
    pub locator: String,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.locator, self.message)
    }
}

/// Outcome of running the validator pair against one plugin tree
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Plugin directory name
    pub plugin: String,
    pub violations: Vec<Violation>,
    /// Whether the structural stage ran
    pub structure_checked: bool,
    /// Typed manifest, present once the schema stage passed
    pub manifest: Option<PluginManifest>,
}

impl ValidationResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Convert into the typed manifest or a `Validation` error
    pub fn into_manifest(self) -> Result<PluginManifest> {
        match self.manifest {
            Some(manifest) if self.violations.is_empty() => Ok(manifest),
            _ => Err(GateError::Validation {
                plugin: self.plugin,
                violations: self.violations,
            }),
        }
    }
}

/// Run schema then structural validation against a plugin directory.
///
/// Returns `Err` only when `plugin_dir` is not a directory; every validation
/// failure is reported inside the `ValidationResult`.
pub fn validate_plugin(plugin_dir: &Path) -> Result<ValidationResult> {
    if !plugin_dir.is_dir() {
        return Err(GateError::PluginNotFound {
            path: plugin_dir.to_path_buf(),
        });
    }
    let plugin = dir_name(plugin_dir);

    let manifest = match schema_stage(plugin_dir) {
        Ok(manifest) => manifest,
        Err(violations) => {
            info!(plugin = %plugin, violations = violations.len(), "schema validation failed");
            return Ok(ValidationResult {
                plugin,
                violations,
                structure_checked: false,
                manifest: None,
            });
        }
    };

    let ctx = StructureContext::new(plugin_dir, &manifest);
    let violations = match check_structure(&ctx) {
        Ok(()) => Vec::new(),
        Err(violation) => {
            info!(plugin = %plugin, %violation, "structural validation failed");
            vec![violation]
        }
    };

    debug!(plugin = %plugin, passed = violations.is_empty(), "validation finished");
    Ok(ValidationResult {
        plugin,
        violations,
        structure_checked: true,
        manifest: Some(manifest),
    })
}

/// Read and schema-check the manifest. A manifest that is missing or cannot
/// be read counts as a parse error, like one that does not decode.
pub fn schema_stage(plugin_dir: &Path) -> std::result::Result<PluginManifest, Vec<Violation>> {
    let parse_error = |message: String| {
        vec![Violation::new(
            ViolationKind::ParseError,
            manifest_locator(),
            message,
        )]
    };
    match PluginManifest::read_raw(plugin_dir) {
        Ok(Some(content)) => check_manifest_slice(&content),
        Ok(None) => Err(parse_error("manifest file not found".to_string())),
        Err(e) => Err(parse_error(format!("manifest could not be read: {}", e))),
    }
}

/// Final path component as a string
pub fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
