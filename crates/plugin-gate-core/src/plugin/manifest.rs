//! Plugin manifest model for .claude-plugin/plugin.json
//!
//! The typed form of a manifest that passed schema validation. Loosely-typed
//! documents never reach this struct; see [`crate::plugin::schema`].

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const PLUGIN_DIR: &str = ".claude-plugin";
pub const PLUGIN_JSON: &str = "plugin.json";

static KEBAB_CASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("kebab-case pattern is a valid regex")
});

/// Check the lowercase-hyphenated identifier convention
pub fn is_kebab_case(name: &str) -> bool {
    KEBAB_CASE.is_match(name)
}

/// Claude Code plugin manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Plugin name (lowercase-hyphenated, unique within the marketplace)
    pub name: String,

    /// Semantic version
    pub version: String,

    pub description: String,

    pub author: Author,

    pub category: Category,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Keywords for discovery
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "ComponentPaths::is_empty")]
    pub commands: ComponentPaths,

    #[serde(default, skip_serializing_if = "ComponentPaths::is_empty")]
    pub agents: ComponentPaths,

    #[serde(default, skip_serializing_if = "ComponentPaths::is_empty")]
    pub skills: ComponentPaths,

    /// Hook configuration files or script directories
    #[serde(default, skip_serializing_if = "ComponentPaths::is_empty")]
    pub hooks: ComponentPaths,
}

/// Author information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Marketplace category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Development,
    Productivity,
    Testing,
    Security,
    Documentation,
    Integration,
    Workflow,
    Utilities,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Productivity => "productivity",
            Self::Testing => "testing",
            Self::Security => "security",
            Self::Documentation => "documentation",
            Self::Integration => "integration",
            Self::Workflow => "workflow",
            Self::Utilities => "utilities",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component paths can be a single string or array of strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentPaths {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl ComponentPaths {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            ComponentPaths::None => Vec::new(),
            ComponentPaths::Single(s) => vec![s.clone()],
            ComponentPaths::Multiple(v) => v.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ComponentPaths::None => true,
            ComponentPaths::Single(_) => false,
            ComponentPaths::Multiple(v) => v.is_empty(),
        }
    }
}

/// Artifact kinds a plugin may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Commands,
    Agents,
    Hooks,
    Skills,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 4] = [Self::Commands, Self::Agents, Self::Hooks, Self::Skills];

    /// Field name in plugin.json, also the conventional directory name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commands => "commands",
            Self::Agents => "agents",
            Self::Hooks => "hooks",
            Self::Skills => "skills",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path declared by the manifest, relative to the plugin root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredPath {
    pub kind: ComponentKind,
    /// As written in plugin.json (e.g. "./commands/")
    pub raw: String,
    /// Normalized, leading "./" removed
    pub relative: PathBuf,
}

impl DeclaredPath {
    /// True when the path climbs out of the plugin root or is absolute
    pub fn escapes_root(&self) -> bool {
        self.relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    }
}

impl PluginManifest {
    /// Location of the manifest inside a plugin directory
    pub fn path(plugin_dir: &Path) -> PathBuf {
        plugin_dir.join(PLUGIN_DIR).join(PLUGIN_JSON)
    }

    /// Read the raw manifest bytes; `None` when the file is missing
    pub fn read_raw(plugin_dir: &Path) -> std::io::Result<Option<Vec<u8>>> {
        match fs::read(Self::path(plugin_dir)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn paths_for(&self, kind: ComponentKind) -> &ComponentPaths {
        match kind {
            ComponentKind::Commands => &self.commands,
            ComponentKind::Agents => &self.agents,
            ComponentKind::Hooks => &self.hooks,
            ComponentKind::Skills => &self.skills,
        }
    }

    /// Every declared artifact path, in kind order then declaration order
    pub fn declared_paths(&self) -> Vec<DeclaredPath> {
        ComponentKind::ALL
            .iter()
            .flat_map(|kind| {
                self.paths_for(*kind)
                    .to_vec()
                    .into_iter()
                    .map(move |raw| DeclaredPath {
                        kind: *kind,
                        relative: normalize_path(&raw),
                        raw,
                    })
            })
            .collect()
    }

    /// Kinds with at least one declared path, sorted
    pub fn declared_kinds(&self) -> Vec<ComponentKind> {
        ComponentKind::ALL
            .iter()
            .copied()
            .filter(|kind| !self.paths_for(*kind).is_empty())
            .collect()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Normalize path by removing leading "./" and trailing "/"
pub fn normalize_path(path: &str) -> PathBuf {
    let p = path.trim_start_matches("./").trim_end_matches('/');
    PathBuf::from(p)
}
