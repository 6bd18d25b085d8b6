use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

pub const CONFIG_FILE: &str = "marketplace.toml";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# plugin-gate configuration file
# Location: <marketplace root>/marketplace.toml

[marketplace]
# Marketplace identifier written to the registry document
name = "community-plugins"
owner = "Marketplace Maintainers"
# owner_email = "maintainers@example.com"
description = "Community Claude Code plugins"
# Directory holding one subdirectory per plugin
plugins_dir = "plugins"
# Generated registry document
registry = ".claude-plugin/marketplace.json"

[scoring]
# Minimum score for a plugin to be accepted for submission
admission_bar = 40
# Score a plugin needs to be considered publish-ready by automated checks
confidence_bar = 80
# README length (lines) that earns full documentation credit
min_readme_lines = 20

[scaffold]
author = "Marketplace Contributors"
homepage_base = "https://github.com/example/marketplace/tree/main/plugins"
license = "MIT"
"#;

/// Pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub scaffold: ScaffoldConfig,
}

/// Marketplace identity and layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(default = "default_marketplace_name")]
    pub name: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: PathBuf,
    #[serde(default = "default_registry")]
    pub registry: PathBuf,
}

fn default_marketplace_name() -> String {
    "community-plugins".to_string()
}

fn default_owner() -> String {
    "Marketplace Maintainers".to_string()
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_registry() -> PathBuf {
    PathBuf::from(".claude-plugin").join("marketplace.json")
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            name: default_marketplace_name(),
            owner: default_owner(),
            owner_email: None,
            description: None,
            plugins_dir: default_plugins_dir(),
            registry: default_registry(),
        }
    }
}

/// Score thresholds. The two bars are independent values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_admission_bar")]
    pub admission_bar: u32,
    #[serde(default = "default_confidence_bar")]
    pub confidence_bar: u32,
    #[serde(default = "default_min_readme_lines")]
    pub min_readme_lines: usize,
}

fn default_admission_bar() -> u32 {
    40
}

fn default_confidence_bar() -> u32 {
    80
}

fn default_min_readme_lines() -> usize {
    20
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            admission_bar: default_admission_bar(),
            confidence_bar: default_confidence_bar(),
            min_readme_lines: default_min_readme_lines(),
        }
    }
}

/// Which score threshold applies to a caller's context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBar {
    Admission,
    Confidence,
}

impl ScoreBar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admission => "admission",
            Self::Confidence => "confidence",
        }
    }
}

impl ScoringConfig {
    pub fn threshold(&self, bar: ScoreBar) -> u32 {
        match bar {
            ScoreBar::Admission => self.admission_bar,
            ScoreBar::Confidence => self.confidence_bar,
        }
    }
}

/// Defaults for newly scaffolded plugins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldConfig {
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_homepage_base")]
    pub homepage_base: String,
    #[serde(default = "default_license")]
    pub license: String,
}

fn default_author() -> String {
    "Marketplace Contributors".to_string()
}

fn default_homepage_base() -> String {
    "https://github.com/example/marketplace/tree/main/plugins".to_string()
}

fn default_license() -> String {
    "MIT".to_string()
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            author: default_author(),
            homepage_base: default_homepage_base(),
            license: default_license(),
        }
    }
}

impl Config {
    /// Load config from the marketplace root, falling back to defaults
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content).map_err(|e| GateError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Save config to the marketplace root
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(CONFIG_FILE);
        fs::create_dir_all(root)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(root: &Path) -> Result<PathBuf> {
        let path = root.join(CONFIG_FILE);
        fs::create_dir_all(root)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    pub fn plugins_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.marketplace.plugins_dir)
    }

    pub fn registry_path(&self, root: &Path) -> PathBuf {
        root.join(&self.marketplace.registry)
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let m = &mut self.marketplace;
        match key {
            "marketplace.name" => m.name = value.to_string(),
            "marketplace.owner" => m.owner = value.to_string(),
            "marketplace.owner_email" => m.owner_email = optional(value),
            "marketplace.description" => m.description = optional(value),
            "marketplace.plugins_dir" => m.plugins_dir = PathBuf::from(value),
            "marketplace.registry" => m.registry = PathBuf::from(value),
            "scoring.admission_bar" => self.scoring.admission_bar = parse_bar(key, value)?,
            "scoring.confidence_bar" => self.scoring.confidence_bar = parse_bar(key, value)?,
            "scoring.min_readme_lines" => {
                self.scoring.min_readme_lines = value.parse().map_err(|_| GateError::Usage {
                    message: format!("{} expects a line count, got '{}'", key, value),
                })?
            }
            "scaffold.author" => self.scaffold.author = value.to_string(),
            "scaffold.homepage_base" => self.scaffold.homepage_base = value.to_string(),
            "scaffold.license" => self.scaffold.license = value.to_string(),
            _ => {
                return Err(GateError::Usage {
                    message: format!("unknown config key: {}", key),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        let m = &self.marketplace;
        vec![
            ("marketplace.name".to_string(), m.name.clone()),
            ("marketplace.owner".to_string(), m.owner.clone()),
            (
                "marketplace.owner_email".to_string(),
                m.owner_email.clone().unwrap_or_default(),
            ),
            (
                "marketplace.description".to_string(),
                m.description.clone().unwrap_or_default(),
            ),
            (
                "marketplace.plugins_dir".to_string(),
                m.plugins_dir.display().to_string(),
            ),
            (
                "marketplace.registry".to_string(),
                m.registry.display().to_string(),
            ),
            (
                "scoring.admission_bar".to_string(),
                self.scoring.admission_bar.to_string(),
            ),
            (
                "scoring.confidence_bar".to_string(),
                self.scoring.confidence_bar.to_string(),
            ),
            (
                "scoring.min_readme_lines".to_string(),
                self.scoring.min_readme_lines.to_string(),
            ),
            ("scaffold.author".to_string(), self.scaffold.author.clone()),
            (
                "scaffold.homepage_base".to_string(),
                self.scaffold.homepage_base.clone(),
            ),
            ("scaffold.license".to_string(), self.scaffold.license.clone()),
        ]
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_bar(key: &str, value: &str) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(bar) if bar <= 100 => Ok(bar),
        _ => Err(GateError::Usage {
            message: format!("{} expects a score between 0 and 100, got '{}'", key, value),
        }),
    }
}
