//! Registry document check
//!
//! Verifies a published registry document against the plugin trees it lists.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::registry::types::{PluginSource, RegistryDocument};
use crate::validate::{dir_name, validate_plugin, Violation, ViolationKind};

/// Result of checking a registry document
#[derive(Debug, Default)]
pub struct MarketplaceCheck {
    pub registry: PathBuf,
    /// Entries checked against a local plugin tree
    pub checked: usize,
    /// Entries hosted elsewhere, listed but not inspected
    pub remote: Vec<String>,
    pub violations: Vec<Violation>,
}

impl MarketplaceCheck {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check the registry document under a marketplace root
pub fn check_marketplace(root: &Path, config: &Config) -> Result<MarketplaceCheck> {
    let registry = config.registry_path(root);
    let mut check = MarketplaceCheck {
        registry: registry.clone(),
        ..Default::default()
    };
    let locator = config.marketplace.registry.display().to_string();

    if !registry.is_file() {
        check.violations.push(Violation::new(
            ViolationKind::ParseError,
            locator,
            "registry document not found",
        ));
        return Ok(check);
    }

    let content = std::fs::read_to_string(&registry)?;
    let document = match RegistryDocument::parse(&content) {
        Ok(document) => document,
        Err(e) => {
            check.violations.push(Violation::new(
                ViolationKind::ParseError,
                locator,
                format!("registry document is not valid: {}", e),
            ));
            return Ok(check);
        }
    };

    let mut seen = BTreeSet::new();
    for entry in &document.plugins {
        if !seen.insert(entry.name.as_str()) {
            check.violations.push(Violation::new(
                ViolationKind::Naming,
                entry.name.as_str(),
                "duplicate registry entry",
            ));
            continue;
        }

        let source = match &entry.source {
            PluginSource::Relative(source) => source,
            PluginSource::Structured(_) => {
                check.remote.push(entry.name.clone());
                continue;
            }
        };

        let plugin_dir = root.join(source.trim_start_matches("./"));
        if !plugin_dir.is_dir() {
            check.violations.push(Violation::new(
                ViolationKind::DanglingPath,
                entry.name.as_str(),
                format!("source '{}' does not exist", source),
            ));
            continue;
        }
        if dir_name(&plugin_dir) != entry.name {
            check.violations.push(Violation::new(
                ViolationKind::Naming,
                entry.name.as_str(),
                format!("source '{}' does not match the entry name", source),
            ));
            continue;
        }

        check.checked += 1;
        let result = validate_plugin(&plugin_dir)?;
        if let Some(manifest) = result.manifest.as_ref() {
            if manifest.version != entry.version {
                check.violations.push(Violation::new(
                    ViolationKind::VersionMismatch,
                    entry.name.as_str(),
                    format!(
                        "registry lists {} but manifest says {}; regenerate the registry",
                        entry.version, manifest.version
                    ),
                ));
            }
        }
        check.violations.extend(result.violations.into_iter().map(|v| Violation {
            locator: format!("{}:{}", entry.name, v.locator),
            ..v
        }));
    }

    debug!(
        registry = %registry.display(),
        checked = check.checked,
        violations = check.violations.len(),
        "registry check finished"
    );
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::generator::RegistryGenerator;
    use crate::validate::testing::*;
    use tempfile::TempDir;

    fn generated(temp: &TempDir) -> (PathBuf, Config) {
        let root = temp.path().to_path_buf();
        valid_plugin(&root.join("plugins"), "alpha-tools");
        valid_plugin(&root.join("plugins"), "beta-tools");
        let config = Config::default();
        RegistryGenerator::new(&root, &config).generate().unwrap();
        (root, config)
    }

    #[test]
    fn freshly_generated_registry_passes() {
        let temp = TempDir::new().unwrap();
        let (root, config) = generated(&temp);

        let check = check_marketplace(&root, &config).unwrap();
        assert!(check.passed(), "{:?}", check.violations);
        assert_eq!(check.checked, 2);
    }

    #[test]
    fn missing_registry_is_reported() {
        let temp = TempDir::new().unwrap();
        let check = check_marketplace(temp.path(), &Config::default()).unwrap();
        assert!(!check.passed());
        assert_eq!(check.violations[0].kind, ViolationKind::ParseError);
    }

    #[test]
    fn stale_version_and_removed_plugin_are_reported() {
        let temp = TempDir::new().unwrap();
        let (root, config) = generated(&temp);
        write(
            &root.join("plugins/alpha-tools/.claude-plugin/plugin.json"),
            &manifest_json("alpha-tools", "1.1.0"),
        );
        std::fs::remove_dir_all(root.join("plugins/beta-tools")).unwrap();

        let check = check_marketplace(&root, &config).unwrap();
        let kinds: Vec<ViolationKind> = check.violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![ViolationKind::VersionMismatch, ViolationKind::DanglingPath]
        );
    }

    #[test]
    fn duplicates_and_remote_sources() {
        let temp = TempDir::new().unwrap();
        let (root, config) = generated(&temp);
        let path = config.registry_path(&root);
        let mut doc = RegistryDocument::load(&path).unwrap();
        doc.plugins.push(doc.plugins[0].clone());
        let mut remote = doc.plugins[1].clone();
        remote.name = "hosted-tools".to_string();
        remote.source = PluginSource::Structured(crate::registry::types::StructuredSource {
            source: "github".to_string(),
            repo: Some("acme/hosted-tools".to_string()),
            url: None,
        });
        doc.plugins.push(remote);
        std::fs::write(&path, doc.render().unwrap()).unwrap();

        let check = check_marketplace(&root, &config).unwrap();
        assert_eq!(check.remote, vec!["hosted-tools"]);
        assert_eq!(check.violations.len(), 1);
        assert_eq!(check.violations[0].kind, ViolationKind::Naming);
    }
}
