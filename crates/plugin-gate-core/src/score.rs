//! Quality Scorer
//!
//! Five independent categories worth up to 20 points each. Scoring never
//! fails: anything that cannot be read or parsed earns the category minimum
//! for the affected check. Scores depend only on the plugin tree's contents.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{ScoreBar, ScoringConfig};
use crate::plugin::schema::check_manifest_slice;
use crate::plugin::{is_kebab_case, ComponentKind, PluginManifest};
use crate::validate::structure::{files_under, read_version_file, VERSION_FILE};
use crate::validate::{dir_name, StructureContext, STRUCTURAL_CHECKS};

pub const CATEGORY_MAX: u32 = 20;
pub const TOTAL_MAX: u32 = CATEGORY_MAX * 5;

const README: &str = "README.md";
const CHANGELOG: &str = "CHANGELOG.md";
const GUIDANCE_FILE: &str = "CLAUDE.md";
const DOCS_DIR: &str = "docs";
const MIN_DESCRIPTION_CHARS: usize = 30;

/// Conventional upper-case artifact names exempt from kebab-case
const CONVENTIONAL_NAMES: &[&str] = &["SKILL.md", "README.md"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreCategory {
    ManifestCompleteness,
    Documentation,
    StructuralIntegrity,
    NamingConventions,
    VersionHygiene,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 5] = [
        Self::ManifestCompleteness,
        Self::Documentation,
        Self::StructuralIntegrity,
        Self::NamingConventions,
        Self::VersionHygiene,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ManifestCompleteness => "Manifest completeness",
            Self::Documentation => "Documentation",
            Self::StructuralIntegrity => "Structural integrity",
            Self::NamingConventions => "Naming conventions",
            Self::VersionHygiene => "Version hygiene",
        }
    }
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score for one category with the checks that lost points
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub category: ScoreCategory,
    pub score: u32,
    pub max: u32,
    /// Checks that did not earn full credit
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub plugin: String,
    pub categories: Vec<CategoryScore>,
    pub total: u32,
}

impl ScoreReport {
    fn from_categories(plugin: String, categories: Vec<CategoryScore>) -> Self {
        let total = categories.iter().map(|c| c.score).sum();
        Self {
            plugin,
            categories,
            total,
        }
    }

    pub fn category(&self, category: ScoreCategory) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Whether the total reaches the chosen bar
    pub fn meets(&self, scoring: &ScoringConfig, bar: ScoreBar) -> bool {
        self.total >= scoring.threshold(bar)
    }
}

/// Accumulates points for one category, capped at `CATEGORY_MAX`
struct Tally {
    category: ScoreCategory,
    score: u32,
    notes: Vec<String>,
}

impl Tally {
    fn new(category: ScoreCategory) -> Self {
        Self {
            category,
            score: 0,
            notes: Vec::new(),
        }
    }

    fn award(&mut self, earned: bool, points: u32, note: &str) {
        if earned {
            self.score += points;
        } else {
            self.notes.push(format!("{} (-{})", note, points));
        }
    }

    fn partial(&mut self, points: u32, max: u32, note: &str) {
        self.score += points;
        if points < max {
            self.notes.push(format!("{} (-{})", note, max - points));
        }
    }

    fn finish(self) -> CategoryScore {
        CategoryScore {
            category: self.category,
            score: self.score.min(CATEGORY_MAX),
            max: CATEGORY_MAX,
            notes: self.notes,
        }
    }
}

/// What the scorer could learn about the manifest
struct ManifestView {
    /// Loosely-typed document, when the file is valid JSON
    document: Option<Value>,
    /// Typed manifest, when the document passed schema validation
    typed: Option<PluginManifest>,
}

impl ManifestView {
    fn load(plugin_dir: &Path) -> Self {
        let Ok(content) = fs::read(PluginManifest::path(plugin_dir)) else {
            return Self {
                document: None,
                typed: None,
            };
        };
        Self {
            document: serde_json::from_slice(&content).ok(),
            typed: check_manifest_slice(&content).ok(),
        }
    }

    fn str_field(&self, pointer: &str) -> Option<&str> {
        self.document
            .as_ref()
            .and_then(|d| d.pointer(pointer))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn has_items(&self, pointer: &str) -> bool {
        self.document
            .as_ref()
            .and_then(|d| d.pointer(pointer))
            .and_then(Value::as_array)
            .map(|a| !a.is_empty())
            .unwrap_or(false)
    }
}

pub struct Scorer {
    min_readme_lines: usize,
}

impl Scorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            min_readme_lines: config.min_readme_lines,
        }
    }

    /// Score a plugin directory. Never fails.
    pub fn score(&self, plugin_dir: &Path) -> ScoreReport {
        let view = ManifestView::load(plugin_dir);
        let categories = vec![
            manifest_completeness(&view),
            self.documentation(plugin_dir),
            structural_integrity(plugin_dir, &view),
            naming_conventions(plugin_dir, &view),
            version_hygiene(plugin_dir, &view),
        ];
        let report = ScoreReport::from_categories(dir_name(plugin_dir), categories);
        debug!(plugin = %report.plugin, total = report.total, "scored plugin");
        report
    }

    fn documentation(&self, plugin_dir: &Path) -> CategoryScore {
        let mut tally = Tally::new(ScoreCategory::Documentation);
        let readme = fs::read_to_string(plugin_dir.join(README)).ok();

        tally.award(readme.is_some(), 6, "README.md missing");

        let lines = readme.as_deref().map(|r| r.lines().count()).unwrap_or(0);
        let length_points = if lines >= self.min_readme_lines {
            6
        } else if lines * 2 >= self.min_readme_lines && lines > 0 {
            3
        } else {
            0
        };
        tally.partial(
            length_points,
            6,
            &format!(
                "README has {} lines, {} expected",
                lines, self.min_readme_lines
            ),
        );

        let has_usage = readme
            .as_deref()
            .map(|r| {
                r.lines().any(|line| {
                    let line = line.trim_start();
                    let lower = line.to_lowercase();
                    line.starts_with('#')
                        && (lower.contains("usage") || lower.contains("installation"))
                })
            })
            .unwrap_or(false);
        tally.award(has_usage, 4, "README lacks a Usage or Installation section");

        let guidance = fs::read_to_string(plugin_dir.join(GUIDANCE_FILE))
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
            || !files_under_dir(&plugin_dir.join(DOCS_DIR)).is_empty();
        tally.award(guidance, 4, "no CLAUDE.md or docs/ guidance");

        tally.finish()
    }
}

fn manifest_completeness(view: &ManifestView) -> CategoryScore {
    let mut tally = Tally::new(ScoreCategory::ManifestCompleteness);

    let description_len = view
        .str_field("/description")
        .map(|d| d.chars().count())
        .unwrap_or(0);
    let description_points = if description_len >= MIN_DESCRIPTION_CHARS {
        8
    } else if description_len > 0 {
        4
    } else {
        0
    };
    tally.partial(
        description_points,
        8,
        &format!("description shorter than {} characters", MIN_DESCRIPTION_CHARS),
    );

    tally.award(view.str_field("/author/name").is_some(), 4, "author name missing");
    tally.award(
        view.str_field("/homepage").is_some() || view.str_field("/repository").is_some(),
        4,
        "homepage or repository missing",
    );
    tally.award(view.has_items("/keywords"), 2, "keywords missing");
    tally.award(view.str_field("/license").is_some(), 2, "license missing");

    tally.finish()
}

fn structural_integrity(plugin_dir: &Path, view: &ManifestView) -> CategoryScore {
    let mut tally = Tally::new(ScoreCategory::StructuralIntegrity);
    let Some(manifest) = view.typed.as_ref() else {
        tally.notes.push("manifest failed schema validation (-20)".to_string());
        return tally.finish();
    };

    let ctx = StructureContext::new(plugin_dir, manifest);
    for check in STRUCTURAL_CHECKS.iter() {
        let outcome = (check.run)(&ctx);
        let note = match &outcome {
            Ok(()) => String::new(),
            Err(violation) => format!("{}: {}", check.name, violation),
        };
        tally.award(outcome.is_ok(), 4, &note);
    }
    tally.finish()
}

fn naming_conventions(plugin_dir: &Path, view: &ManifestView) -> CategoryScore {
    let mut tally = Tally::new(ScoreCategory::NamingConventions);
    let name = view.str_field("/name");

    tally.award(
        name.map(is_kebab_case).unwrap_or(false),
        6,
        "manifest name is not lowercase-hyphenated",
    );
    tally.award(
        name == Some(dir_name(plugin_dir).as_str()),
        6,
        "directory name differs from manifest name",
    );

    let artifacts = artifact_files(plugin_dir, view);
    let points = if artifacts.is_empty() {
        8
    } else {
        let compliant = artifacts.iter().filter(|f| artifact_name_ok(f)).count();
        (8 * compliant / artifacts.len()) as u32
    };
    tally.partial(points, 8, "artifact file names are not lowercase-hyphenated");

    tally.finish()
}

fn version_hygiene(plugin_dir: &Path, view: &ManifestView) -> CategoryScore {
    let mut tally = Tally::new(ScoreCategory::VersionHygiene);
    let version = view
        .str_field("/version")
        .filter(|v| semver::Version::parse(v).is_ok());

    tally.award(version.is_some(), 6, "version is not a semantic version");

    let changelog = fs::read_to_string(plugin_dir.join(CHANGELOG)).ok();
    tally.award(changelog.is_some(), 4, "CHANGELOG.md missing");

    let has_entry = match (changelog.as_deref(), version) {
        (Some(changelog), Some(version)) => changelog_has_entry(changelog, version),
        _ => false,
    };
    tally.award(has_entry, 6, "no changelog entry for the current version");

    let version_file_ok = match (read_version_file(plugin_dir), version) {
        (Some(file), Some(version)) => file == version,
        _ => false,
    };
    tally.award(
        version_file_ok,
        4,
        &format!("{} missing or inconsistent", VERSION_FILE),
    );

    tally.finish()
}

/// A markdown heading that mentions the version (`## [1.2.0]`, `## 1.2.0 - date`)
pub fn changelog_has_entry(changelog: &str, version: &str) -> bool {
    changelog.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with('#')
            && line
                .split(|c: char| c.is_whitespace() || c == '[' || c == ']')
                .any(|token| token == version || token.strip_prefix('v') == Some(version))
    })
}

/// Artifact file names (not paths) under declared or conventional directories
fn artifact_files(plugin_dir: &Path, view: &ManifestView) -> Vec<String> {
    let roots: Vec<std::path::PathBuf> = match view.typed.as_ref() {
        Some(manifest) if !manifest.declared_paths().is_empty() => manifest
            .declared_paths()
            .into_iter()
            .filter(|d| !d.escapes_root())
            .map(|d| plugin_dir.join(d.relative))
            .collect(),
        _ => ComponentKind::ALL
            .iter()
            .map(|k| plugin_dir.join(k.as_str()))
            .collect(),
    };

    let mut names: Vec<String> = roots
        .iter()
        .filter(|p| p.exists())
        .flat_map(|p| files_under(p))
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    names.sort();
    names
}

fn artifact_name_ok(file_name: &str) -> bool {
    if CONVENTIONAL_NAMES.contains(&file_name) {
        return true;
    }
    let stem = file_name.split('.').next().unwrap_or(file_name);
    is_kebab_case(stem)
}

fn files_under_dir(dir: &Path) -> Vec<std::path::PathBuf> {
    if dir.is_dir() {
        files_under(dir)
    } else {
        Vec::new()
    }
}
