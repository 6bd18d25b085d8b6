//! Registry Generator
//!
//! Scans every plugin directory, re-runs the validator pair, and writes the
//! aggregated registry document. Invalid plugins are excluded from the
//! document and reported; generation itself fails only when the plugins
//! directory cannot be read or the document cannot be written.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{GateError, Result};
use crate::registry::types::{RegistryDocument, RegistryEntry};
use crate::validate::{dir_name, validate_plugin, ValidationResult};

/// Fields written for each registry entry, in output order
pub const ENTRY_FIELDS: &[&str] = &[
    "name",
    "source",
    "description",
    "version",
    "author",
    "category",
    "homepage",
    "keywords",
    "components",
];

/// Outcome of one generation run
#[derive(Debug)]
pub struct GenerationReport {
    pub path: PathBuf,
    /// Accepted plugin names, sorted
    pub accepted: Vec<String>,
    /// Plugins left out of the document and why
    pub excluded: Vec<ValidationResult>,
    /// Whether the bytes on disk changed
    pub changed: bool,
}

pub struct RegistryGenerator<'a> {
    root: PathBuf,
    config: &'a Config,
}

impl<'a> RegistryGenerator<'a> {
    pub fn new(root: impl Into<PathBuf>, config: &'a Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.config.registry_path(&self.root)
    }

    /// Build the document in memory and the list of excluded plugins
    pub fn build(&self) -> Result<(RegistryDocument, Vec<ValidationResult>)> {
        let plugins_dir = self.config.plugins_dir(&self.root);
        let mut entries: BTreeMap<String, RegistryEntry> = BTreeMap::new();
        let mut excluded = Vec::new();

        for dir in plugin_dirs(&plugins_dir).map_err(|e| GateError::Generation {
            path: self.registry_path(),
            message: format!("cannot read {}: {}", plugins_dir.display(), e),
        })? {
            let result = match validate_plugin(&dir) {
                Ok(result) => result,
                Err(GateError::PluginNotFound { path }) => {
                    warn!(path = %path.display(), "plugin directory vanished during generation");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !result.passed() {
                warn!(
                    plugin = %result.plugin,
                    violations = result.violations.len(),
                    "excluding invalid plugin from registry"
                );
                excluded.push(result);
                continue;
            }
            let Some(manifest) = result.manifest.as_ref() else {
                continue;
            };

            let entry = RegistryEntry::from_manifest(
                manifest,
                &self.config.marketplace.plugins_dir,
                &dir_name(&dir),
            );
            if entries.contains_key(&entry.name) {
                // Directory names are unique and must equal manifest names, so
                // this only triggers on case-insensitive filesystems.
                warn!(plugin = %entry.name, "duplicate plugin name, keeping first");
                continue;
            }
            entries.insert(entry.name.clone(), entry);
        }

        let mut document = RegistryDocument::empty(&self.config.marketplace);
        document.plugins = entries.into_values().collect();
        Ok((document, excluded))
    }

    /// Build, serialize, and atomically replace the registry document
    pub fn generate(&self) -> Result<GenerationReport> {
        let (document, excluded) = self.build()?;
        let path = self.registry_path();
        let rendered = document.render()?;

        let changed = fs::read(&path)
            .map(|bytes| bytes != rendered.as_bytes())
            .unwrap_or(true);
        write_atomic(&path, rendered.as_bytes()).map_err(|e| GateError::Generation {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let accepted: Vec<String> = document.plugins.iter().map(|p| p.name.clone()).collect();
        info!(
            path = %path.display(),
            accepted = accepted.len(),
            excluded = excluded.len(),
            changed,
            "registry generated"
        );

        Ok(GenerationReport {
            path,
            accepted,
            excluded,
            changed,
        })
    }
}

/// Plugin subdirectories, sorted; hidden directories are skipped
pub fn plugin_dirs(plugins_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(plugins_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        dirs.push(path);
    }
    dirs.sort();
    Ok(dirs)
}

/// Write to a temp file in the destination directory, then rename into place
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
