use std::path::PathBuf;
use thiserror::Error;

use crate::validate::Violation;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid usage: {message}")]
    Usage { message: String },

    #[error("Plugin directory not found: {path}")]
    PluginNotFound { path: PathBuf },

    #[error("Plugin '{plugin}' failed validation with {} violation(s):\n{}", .violations.len(), format_violations(.violations))]
    Validation {
        plugin: String,
        violations: Vec<Violation>,
    },

    #[error("Plugin '{plugin}' scored {score}/100, below the {bar} bar")]
    BelowThreshold {
        plugin: String,
        score: u32,
        bar: String,
    },

    #[error("Registry generation failed for {path}: {message}")]
    Generation { path: PathBuf, message: String },

    #[error("Registry is locked by another generation run: {path}")]
    RegistryLocked { path: PathBuf },

    #[error("Harness failed:\n{}", .failures.join("\n"))]
    Harness { failures: Vec<String> },

    #[error("Scaffold failed: {message}")]
    Scaffold { message: String },

    #[error("Failed to parse {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;

impl GateError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage { .. } | Self::PluginNotFound { .. } | Self::Scaffold { .. } => 2,
            Self::Generation { .. } | Self::RegistryLocked { .. } => 3,
            _ => 1,
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ViolationKind;

    #[test]
    fn exit_codes_follow_taxonomy() {
        let usage = GateError::Usage {
            message: "bad".to_string(),
        };
        assert_eq!(usage.exit_code(), 2);

        let validation = GateError::Validation {
            plugin: "demo".to_string(),
            violations: vec![],
        };
        assert_eq!(validation.exit_code(), 1);

        let generation = GateError::Generation {
            path: PathBuf::from("marketplace.json"),
            message: "read-only".to_string(),
        };
        assert_eq!(generation.exit_code(), 3);
    }

    #[test]
    fn validation_message_lists_every_violation() {
        let err = GateError::Validation {
            plugin: "demo".to_string(),
            violations: vec![
                Violation::new(ViolationKind::MissingField, "/author", "\"author\" is a required property"),
                Violation::new(ViolationKind::SchemaType, "/version", "not a string"),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("2 violation(s)"));
        assert!(message.contains("author"));
        assert!(message.contains("/version"));
    }
}
