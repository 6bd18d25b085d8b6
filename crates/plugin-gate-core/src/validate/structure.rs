//! Structural validation
//!
//! Filesystem invariants referenced by a schema-valid manifest. The checks run
//! in a fixed order and stop at the first failure; the scorer runs the same
//! checks independently for partial credit.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::plugin::{is_kebab_case, ComponentKind, PluginManifest};
use crate::validate::{dir_name, Violation, ViolationKind};

/// Standalone version file at the plugin root
pub const VERSION_FILE: &str = "VERSION";

const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash", "zsh", "py"];

/// Inputs shared by every structural check
pub struct StructureContext<'a> {
    pub plugin_dir: &'a Path,
    pub manifest: &'a PluginManifest,
}

impl<'a> StructureContext<'a> {
    pub fn new(plugin_dir: &'a Path, manifest: &'a PluginManifest) -> Self {
        Self {
            plugin_dir,
            manifest,
        }
    }
}

/// A named structural check
pub struct StructuralCheck {
    pub name: &'static str,
    pub run: fn(&StructureContext<'_>) -> Result<(), Violation>,
}

/// Structural checks in execution order
pub const STRUCTURAL_CHECKS: [StructuralCheck; 5] = [
    StructuralCheck {
        name: "declared-paths-exist",
        run: check_declared_paths,
    },
    StructuralCheck {
        name: "hook-scripts-executable",
        run: check_hook_permissions,
    },
    StructuralCheck {
        name: "naming",
        run: check_naming,
    },
    StructuralCheck {
        name: "version-file",
        run: check_version_file,
    },
    StructuralCheck {
        name: "artifact-dirs-non-empty",
        run: check_artifact_dirs,
    },
];

/// Run every structural check in order, stopping at the first violation
pub fn check_structure(ctx: &StructureContext<'_>) -> Result<(), Violation> {
    STRUCTURAL_CHECKS.iter().try_for_each(|check| {
        debug!(check = check.name, plugin = %ctx.manifest.name, "structural check");
        (check.run)(ctx)
    })
}

/// (1) every declared path exists inside the plugin root
pub fn check_declared_paths(ctx: &StructureContext<'_>) -> Result<(), Violation> {
    for declared in ctx.manifest.declared_paths() {
        if declared.escapes_root() {
            return Err(Violation::new(
                ViolationKind::DanglingPath,
                declared.raw.as_str(),
                format!("{} path escapes the plugin root", declared.kind),
            ));
        }
        if !ctx.plugin_dir.join(&declared.relative).exists() {
            return Err(Violation::new(
                ViolationKind::DanglingPath,
                declared.raw.as_str(),
                format!("declared {} path does not exist", declared.kind),
            ));
        }
    }
    Ok(())
}

/// (2) every declared hook script is executable
pub fn check_hook_permissions(ctx: &StructureContext<'_>) -> Result<(), Violation> {
    for script in hook_scripts(ctx.plugin_dir, ctx.manifest) {
        if !is_executable(&script) {
            let locator = script
                .strip_prefix(ctx.plugin_dir)
                .unwrap_or(&script)
                .display()
                .to_string();
            return Err(Violation::new(
                ViolationKind::Permission,
                locator,
                "hook script is not executable",
            ));
        }
    }
    Ok(())
}

/// (3) directory name and manifest name agree and follow kebab-case
pub fn check_naming(ctx: &StructureContext<'_>) -> Result<(), Violation> {
    let dir = dir_name(ctx.plugin_dir);
    if !is_kebab_case(&dir) {
        return Err(Violation::new(
            ViolationKind::Naming,
            dir.as_str(),
            "plugin directory name must be lowercase-hyphenated",
        ));
    }
    if dir != ctx.manifest.name {
        return Err(Violation::new(
            ViolationKind::Naming,
            "/name",
            format!(
                "manifest name '{}' does not match directory '{}'",
                ctx.manifest.name, dir
            ),
        ));
    }
    Ok(())
}

/// (4) a standalone VERSION file, when present, matches the manifest
pub fn check_version_file(ctx: &StructureContext<'_>) -> Result<(), Violation> {
    match read_version_file(ctx.plugin_dir) {
        Some(version) if version != ctx.manifest.version => Err(Violation::new(
            ViolationKind::VersionMismatch,
            VERSION_FILE,
            format!(
                "VERSION file says '{}' but manifest says '{}'",
                version, ctx.manifest.version
            ),
        )),
        _ => Ok(()),
    }
}

/// (5) no artifact directory exists without files in it
pub fn check_artifact_dirs(ctx: &StructureContext<'_>) -> Result<(), Violation> {
    for dir in artifact_dirs(ctx.plugin_dir, ctx.manifest) {
        if !contains_files(&dir) {
            let locator = dir
                .strip_prefix(ctx.plugin_dir)
                .unwrap_or(&dir)
                .display()
                .to_string();
            return Err(Violation::new(
                ViolationKind::EmptyDirectory,
                locator,
                "artifact directory is empty",
            ));
        }
    }
    Ok(())
}

/// Trimmed contents of the VERSION file, if any
pub fn read_version_file(plugin_dir: &Path) -> Option<String> {
    fs::read_to_string(plugin_dir.join(VERSION_FILE))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Hook scripts under the declared hook paths, sorted
pub fn hook_scripts(plugin_dir: &Path, manifest: &PluginManifest) -> Vec<PathBuf> {
    let mut scripts: Vec<PathBuf> = manifest
        .declared_paths()
        .into_iter()
        .filter(|d| d.kind == ComponentKind::Hooks && !d.escapes_root())
        .flat_map(|d| files_under(&plugin_dir.join(&d.relative)))
        .filter(|p| is_hook_script(p))
        .collect();
    scripts.sort();
    scripts.dedup();
    scripts
}

/// Script by extension or by shebang; JSON hook configuration is not a script
pub fn is_hook_script(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SCRIPT_EXTENSIONS.contains(&e))
        .unwrap_or(false);
    by_extension || has_shebang(path)
}

fn has_shebang(path: &Path) -> bool {
    let mut head = [0u8; 2];
    fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut head))
        .map(|_| &head == b"#!")
        .unwrap_or(false)
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(_path: &Path) -> bool {
    true
}

/// Conventional artifact directories plus declared directory paths, sorted
pub fn artifact_dirs(plugin_dir: &Path, manifest: &PluginManifest) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = ComponentKind::ALL
        .iter()
        .map(|kind| plugin_dir.join(kind.as_str()))
        .chain(
            manifest
                .declared_paths()
                .into_iter()
                .filter(|d| !d.escapes_root())
                .map(|d| plugin_dir.join(d.relative)),
        )
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs
}

/// Regular files under a path (the path itself when it is a file), sorted
pub fn files_under(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn contains_files(dir: &Path) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_type().is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::testing::*;
    use tempfile::TempDir;

    fn load(dir: &Path) -> PluginManifest {
        let content = fs::read_to_string(PluginManifest::path(dir)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    fn first_violation(dir: &Path) -> Option<Violation> {
        let manifest = load(dir);
        check_structure(&StructureContext::new(dir, &manifest)).err()
    }

    #[test]
    fn valid_tree_has_no_violation() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        assert_eq!(first_violation(&dir), None);
    }

    #[test]
    fn dangling_declared_path() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        fs::remove_dir_all(dir.join("commands")).unwrap();

        let violation = first_violation(&dir).unwrap();
        assert_eq!(violation.kind, ViolationKind::DanglingPath);
        assert_eq!(violation.locator, "./commands/");
    }

    #[test]
    fn escaping_declared_path_is_dangling() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        let mut manifest = load(&dir);
        manifest.agents = crate::plugin::ComponentPaths::Single("./../demo-plugin/commands".into());

        let violation = check_declared_paths(&StructureContext::new(&dir, &manifest)).unwrap_err();
        assert_eq!(violation.kind, ViolationKind::DanglingPath);
        assert!(violation.message.contains("escapes"));
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_hook_script() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        write(&dir.join("hooks/lint.py"), "print('lint')\n");

        let violation = first_violation(&dir).unwrap();
        assert_eq!(violation.kind, ViolationKind::Permission);
        assert_eq!(violation.locator, "hooks/lint.py");
    }

    #[test]
    fn shebang_marks_extensionless_script() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("run"), "#!/usr/bin/env bash\n");
        write(&temp.path().join("hooks.json"), "{}");
        assert!(is_hook_script(&temp.path().join("run")));
        assert!(!is_hook_script(&temp.path().join("hooks.json")));
    }

    #[test]
    fn name_mismatch() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        let renamed = temp.path().join("other-plugin");
        fs::rename(&dir, &renamed).unwrap();

        let violation = first_violation(&renamed).unwrap();
        assert_eq!(violation.kind, ViolationKind::Naming);
        assert_eq!(violation.locator, "/name");
    }

    #[test]
    fn non_kebab_directory_name() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        let renamed = temp.path().join("Demo_Plugin");
        fs::rename(&dir, &renamed).unwrap();

        let violation = first_violation(&renamed).unwrap();
        assert_eq!(violation.kind, ViolationKind::Naming);
        assert_eq!(violation.locator, "Demo_Plugin");
    }

    #[test]
    fn version_file_mismatch() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        write(&dir.join("VERSION"), "2.0.0\n");

        let violation = first_violation(&dir).unwrap();
        assert_eq!(violation.kind, ViolationKind::VersionMismatch);
    }

    #[test]
    fn matching_version_file_passes() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        write(&dir.join("VERSION"), "1.0.0\n");
        assert_eq!(first_violation(&dir), None);
    }

    #[test]
    fn empty_artifact_directory() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        fs::create_dir_all(dir.join("agents/nested")).unwrap();

        let violation = first_violation(&dir).unwrap();
        assert_eq!(violation.kind, ViolationKind::EmptyDirectory);
        assert_eq!(violation.locator, "agents");
    }

    #[test]
    fn checks_stop_at_first_failure() {
        let temp = TempDir::new().unwrap();
        let dir = valid_plugin(temp.path(), "demo-plugin");
        // Both check 4 and check 5 would fail; only check 4 is reported.
        write(&dir.join("VERSION"), "0.0.1");
        fs::create_dir_all(dir.join("skills")).unwrap();

        let violation = first_violation(&dir).unwrap();
        assert_eq!(violation.kind, ViolationKind::VersionMismatch);

        let manifest = load(&dir);
        let ctx = StructureContext::new(&dir, &manifest);
        let failing: Vec<&str> = STRUCTURAL_CHECKS
            .iter()
            .filter(|c| (c.run)(&ctx).is_err())
            .map(|c| c.name)
            .collect();
        assert_eq!(failing, vec!["version-file", "artifact-dirs-non-empty"]);
    }
}
