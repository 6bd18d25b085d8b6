//! Registry document types
//!
//! The registry document is a Claude Code marketplace file
//! (`.claude-plugin/marketplace.json`): marketplace identity plus one entry
//! per accepted plugin.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::MarketplaceConfig;
use crate::error::{GateError, Result};
use crate::plugin::{Author, Category, PluginManifest};

/// Aggregated, published listing of accepted plugins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Marketplace name (unique identifier)
    pub name: String,
    pub owner: RegistryOwner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RegistryMetadata>,
    /// Accepted plugins, ordered by name
    #[serde(default)]
    pub plugins: Vec<RegistryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryOwner {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base directory for relative plugin sources
    #[serde(default, rename = "pluginRoot", skip_serializing_if = "Option::is_none")]
    pub plugin_root: Option<String>,
}

/// One accepted plugin: the stable metadata subset plus derived fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub source: PluginSource,
    pub description: String,
    pub version: String,
    pub author: Author,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Sorted, deduplicated manifest keywords
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Sorted artifact kinds the manifest declares
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
}

/// Plugin source specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginSource {
    /// Relative path (e.g., "./plugins/my-plugin")
    Relative(String),
    /// Structured source hosted elsewhere
    Structured(StructuredSource),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSource {
    /// Source type: "github", "url"
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RegistryDocument {
    /// A document with no entries
    pub fn empty(config: &MarketplaceConfig) -> Self {
        Self {
            name: config.name.clone(),
            owner: RegistryOwner {
                name: config.owner.clone(),
                email: config.owner_email.clone(),
            },
            metadata: Some(RegistryMetadata {
                description: config.description.clone(),
                plugin_root: Some(format!("./{}", config.plugins_dir.display())),
            }),
            plugins: Vec::new(),
        }
    }

    /// Parse a registry document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| GateError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Pretty JSON with a trailing newline
    pub fn render(&self) -> Result<String> {
        let mut rendered = serde_json::to_string_pretty(self)?;
        rendered.push('\n');
        Ok(rendered)
    }

    pub fn entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }
}

impl RegistryEntry {
    /// Build an entry strictly from manifest data and the plugin's directory name
    pub fn from_manifest(manifest: &PluginManifest, plugins_dir: &Path, dir_name: &str) -> Self {
        let mut keywords = manifest.keywords.clone();
        keywords.sort();
        keywords.dedup();

        let components = manifest
            .declared_kinds()
            .iter()
            .map(|kind| kind.as_str().to_string())
            .collect();

        Self {
            name: manifest.name.clone(),
            source: PluginSource::Relative(format!(
                "./{}",
                plugins_dir.join(dir_name).display()
            )),
            description: manifest.description.clone(),
            version: manifest.version.clone(),
            author: manifest.author.clone(),
            category: manifest.category,
            homepage: manifest.homepage.clone(),
            keywords,
            components,
        }
    }
}
