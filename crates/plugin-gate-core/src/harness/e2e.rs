//! End-to-end runner
//!
//! Scaffold a uniquely named plugin, validate it, score it against the
//! confidence bar, regenerate the registry and look for the new entry.
//! Whatever happens, the scaffolded tree is removed and the registry
//! document is put back byte-for-byte.
//!
//! Cleanup is owned by [`ScaffoldHandle`]. Normal paths call
//! [`ScaffoldHandle::release`]; unwinding goes through `Drop`. An interrupt
//! flag raised by a signal handler stops the run before its next step, and
//! the normal release path then runs. A process killed before either runs
//! leaves a journal under `.plugin-gate/` that the next run (or [`recover`])
//! replays.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{GateError, Result};
use crate::registry::{write_atomic, RegistryDocument, RegistryGenerator, RegistryLock};
use crate::scaffold::{ScaffoldRequest, Scaffolder};
use crate::score::Scorer;
use crate::validate::validate_plugin;

/// Working state directory, relative to the marketplace root
pub const STATE_DIR: &str = ".plugin-gate";
const JOURNAL_FILE: &str = "e2e-journal.json";
const SNAPSHOT_FILE: &str = "e2e-registry.snapshot";

/// Prefix of every scaffolded end-to-end plugin
pub const E2E_PREFIX: &str = "e2e-test-";

/// A fresh `e2e-test-<8 hex>` identifier
pub fn new_plugin_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", E2E_PREFIX, &hex[..8])
}

/// On-disk record of what a run must undo, paths relative to the root
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Journal {
    registry: PathBuf,
    registry_existed: bool,
    /// The run created the registry directory and must remove it again
    #[serde(default)]
    registry_dir_created: bool,
    #[serde(default)]
    plugin_dir: Option<PathBuf>,
}

/// Scaffolded plugin plus the pre-run registry snapshot
#[derive(Debug)]
pub struct ScaffoldHandle {
    root: PathBuf,
    journal: Journal,
    snapshot: Option<Vec<u8>>,
    released: bool,
}

impl ScaffoldHandle {
    /// Snapshot the registry document and persist the recovery journal.
    /// The caller holds `lock` for as long as the handle lives.
    pub fn acquire(root: &Path, registry: &Path, lock: &RegistryLock) -> Result<Self> {
        let registry_path = root.join(registry);
        let snapshot = match fs::read(&registry_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let handle = Self {
            root: root.to_path_buf(),
            journal: Journal {
                registry: registry.to_path_buf(),
                registry_existed: snapshot.is_some(),
                registry_dir_created: lock.created_dir(),
                plugin_dir: None,
            },
            snapshot,
            released: false,
        };
        if let Some(bytes) = &handle.snapshot {
            write_atomic(&handle.state_dir().join(SNAPSHOT_FILE), bytes)?;
        }
        handle.write_journal()?;
        Ok(handle)
    }

    /// Record the plugin directory the run owns
    pub fn track_plugin(&mut self, plugin_dir: &Path) -> Result<()> {
        let relative = plugin_dir.strip_prefix(&self.root).unwrap_or(plugin_dir);
        self.journal.plugin_dir = Some(relative.to_path_buf());
        self.write_journal()
    }

    pub fn plugin_dir(&self) -> Option<PathBuf> {
        self.journal.plugin_dir.as_ref().map(|p| self.root.join(p))
    }

    /// Undo the run. Returns cleanup errors instead of failing, so they can
    /// be reported next to whatever made the run end.
    pub fn release(mut self) -> Vec<String> {
        self.cleanup()
    }

    fn cleanup(&mut self) -> Vec<String> {
        self.released = true;
        let mut errors = Vec::new();

        if let Some(dir) = self.plugin_dir() {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => errors.push(format!("remove {}: {}", dir.display(), e)),
            }
        }

        let registry = self.root.join(&self.journal.registry);
        let restored = match &self.snapshot {
            Some(bytes) => write_atomic(&registry, bytes),
            None => match fs::remove_file(&registry) {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = restored {
            errors.push(format!("restore {}: {}", registry.display(), e));
        }

        // A failed cleanup keeps the journal so recovery can retry.
        if errors.is_empty() {
            let state = self.state_dir();
            let _ = fs::remove_file(state.join(SNAPSHOT_FILE));
            let _ = fs::remove_file(state.join(JOURNAL_FILE));
            let _ = fs::remove_dir(&state);
        } else {
            for error in &errors {
                warn!(%error, "e2e cleanup failed");
            }
        }
        errors
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    fn write_journal(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.journal)?;
        write_atomic(&self.state_dir().join(JOURNAL_FILE), &json)?;
        Ok(())
    }
}

impl Drop for ScaffoldHandle {
    fn drop(&mut self) {
        if !self.released {
            warn!("e2e run ended without release, cleaning up");
            self.cleanup();
        }
    }
}

/// Replay a journal left behind by an interrupted run. Requires the registry
/// lock so a live run's journal is never replayed underneath it.
///
/// Returns `None` when there was nothing to recover, otherwise the cleanup
/// errors (empty on success).
pub fn recover(root: &Path, lock: &mut RegistryLock) -> Result<Option<Vec<String>>> {
    let state = root.join(STATE_DIR);
    let journal_path = state.join(JOURNAL_FILE);
    let content = match fs::read(&journal_path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let journal: Journal =
        serde_json::from_slice(&content).map_err(|e| GateError::ConfigParse {
            path: journal_path.clone(),
            message: e.to_string(),
        })?;

    let snapshot = if journal.registry_existed {
        Some(fs::read(state.join(SNAPSHOT_FILE))?)
    } else {
        None
    };

    if journal.registry_dir_created {
        lock.remove_dir_on_release();
    }
    info!(
        plugin = ?journal.plugin_dir,
        registry = %journal.registry.display(),
        "recovering interrupted e2e run"
    );
    let handle = ScaffoldHandle {
        root: root.to_path_buf(),
        journal,
        snapshot,
        released: false,
    };
    Ok(Some(handle.release()))
}

/// The five scenario steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum E2eStep {
    Scaffold,
    Validate,
    Score,
    Generate,
    Verify,
}

impl E2eStep {
    pub const ALL: [E2eStep; 5] = [
        Self::Scaffold,
        Self::Validate,
        Self::Score,
        Self::Generate,
        Self::Verify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scaffold => "scaffold",
            Self::Validate => "validate",
            Self::Score => "score",
            Self::Generate => "generate",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for E2eStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub step: E2eStep,
    pub message: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} failed: {}", self.step, self.message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct E2eReport {
    pub plugin: String,
    pub completed: Vec<E2eStep>,
    pub failure: Option<StepFailure>,
    /// Cleanup errors; reported alongside the failure, never instead of it
    pub cleanup: Vec<String>,
    /// Leftover journal replayed before the run
    pub recovered: bool,
    /// Stopped early by the interrupt flag
    pub interrupted: bool,
}

impl E2eReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.cleanup.is_empty()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failure
            .iter()
            .map(|f| f.to_string())
            .chain(self.cleanup.iter().map(|c| format!("cleanup: {}", c)))
            .collect()
    }

    pub fn into_result(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(GateError::Harness {
                failures: self.failures(),
            })
        }
    }
}

pub struct E2eRunner<'a, S: Scaffolder> {
    root: PathBuf,
    config: &'a Config,
    scaffolder: S,
    interrupt: Arc<AtomicBool>,
}

impl<'a, S: Scaffolder> E2eRunner<'a, S> {
    pub fn new(root: impl Into<PathBuf>, config: &'a Config, scaffolder: S) -> Self {
        Self {
            root: root.into(),
            config,
            scaffolder,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop before the next step once `flag` is raised
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Run the scenario with a fresh plugin id
    pub fn run(&self) -> Result<E2eReport> {
        self.run_with_id(&new_plugin_id())
    }

    /// Run the scenario. `Err` means the run could not start (registry
    /// locked, snapshot unreadable); step failures land in the report.
    pub fn run_with_id(&self, plugin: &str) -> Result<E2eReport> {
        let registry_path = self.config.registry_path(&self.root);
        let mut lock = RegistryLock::acquire(&registry_path)?;

        let recovered = match recover(&self.root, &mut lock)? {
            Some(errors) if !errors.is_empty() => {
                return Err(GateError::Harness {
                    failures: errors
                        .into_iter()
                        .map(|e| format!("recovery: {}", e))
                        .collect(),
                })
            }
            Some(_) => true,
            None => false,
        };

        let mut handle =
            ScaffoldHandle::acquire(&self.root, &self.config.marketplace.registry, &lock)?;
        let mut completed = Vec::new();
        let failure = self.steps(&mut handle, plugin, &mut completed).err();
        let cleanup = handle.release();
        drop(lock);

        let interrupted = failure.is_some() && self.interrupted();
        let report = E2eReport {
            plugin: plugin.to_string(),
            completed,
            failure,
            cleanup,
            recovered,
            interrupted,
        };
        info!(
            plugin,
            passed = report.passed(),
            steps = report.completed.len(),
            "e2e run finished"
        );
        Ok(report)
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    fn proceed(&self, next: E2eStep) -> std::result::Result<(), StepFailure> {
        if self.interrupted() {
            warn!(step = %next, "e2e run interrupted, cleaning up");
            return Err(StepFailure {
                step: next,
                message: "interrupted before the step started".to_string(),
            });
        }
        Ok(())
    }

    fn steps(
        &self,
        handle: &mut ScaffoldHandle,
        plugin: &str,
        completed: &mut Vec<E2eStep>,
    ) -> std::result::Result<(), StepFailure> {
        let fail = |step: E2eStep| move |message: String| StepFailure { step, message };

        // 1. scaffold
        self.proceed(E2eStep::Scaffold)?;
        let planned = self.config.plugins_dir(&self.root).join(plugin);
        if planned.exists() {
            return Err(fail(E2eStep::Scaffold)(format!(
                "{} already exists",
                planned.display()
            )));
        }
        handle
            .track_plugin(&planned)
            .map_err(|e| fail(E2eStep::Scaffold)(e.to_string()))?;
        let dir = self
            .scaffolder
            .scaffold(&ScaffoldRequest::new(plugin))
            .map_err(|e| fail(E2eStep::Scaffold)(e.to_string()))?;
        if dir != planned {
            handle
                .track_plugin(&dir)
                .map_err(|e| fail(E2eStep::Scaffold)(e.to_string()))?;
        }
        completed.push(E2eStep::Scaffold);

        // 2. validate
        self.proceed(E2eStep::Validate)?;
        let result = validate_plugin(&dir).map_err(|e| fail(E2eStep::Validate)(e.to_string()))?;
        if let Err(e) = result.into_manifest() {
            return Err(fail(E2eStep::Validate)(e.to_string()));
        }
        completed.push(E2eStep::Validate);

        // 3. score
        self.proceed(E2eStep::Score)?;
        let report = Scorer::new(&self.config.scoring).score(&dir);
        let bar = self.config.scoring.confidence_bar;
        if report.total < bar {
            return Err(fail(E2eStep::Score)(format!(
                "scored {}/100, confidence bar is {}",
                report.total, bar
            )));
        }
        completed.push(E2eStep::Score);

        // 4. generate
        self.proceed(E2eStep::Generate)?;
        let generation = RegistryGenerator::new(&self.root, self.config)
            .generate()
            .map_err(|e| fail(E2eStep::Generate)(e.to_string()))?;
        completed.push(E2eStep::Generate);

        // 5. verify
        self.proceed(E2eStep::Verify)?;
        let document = RegistryDocument::load(&generation.path)
            .map_err(|e| fail(E2eStep::Verify)(e.to_string()))?;
        if !document.contains(plugin) {
            return Err(fail(E2eStep::Verify)(format!(
                "registry has no entry named {}",
                plugin
            )));
        }
        completed.push(E2eStep::Verify);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaffold::TemplateScaffolder;
    use crate::validate::testing::*;
    use tempfile::TempDir;

    /// Template output with a broken manifest
    struct BrokenScaffolder(TemplateScaffolder);

    impl Scaffolder for BrokenScaffolder {
        fn scaffold(&self, request: &ScaffoldRequest) -> Result<PathBuf> {
            let dir = self.0.scaffold(request)?;
            write(&dir.join(".claude-plugin/plugin.json"), r#"{"name": 1}"#);
            Ok(dir)
        }
    }

    /// Template output, with the interrupt flag raised mid-step
    struct InterruptingScaffolder(TemplateScaffolder, Arc<AtomicBool>);

    impl Scaffolder for InterruptingScaffolder {
        fn scaffold(&self, request: &ScaffoldRequest) -> Result<PathBuf> {
            let dir = self.0.scaffold(request)?;
            self.1.store(true, Ordering::SeqCst);
            Ok(dir)
        }
    }

    struct FailingScaffolder;

    impl Scaffolder for FailingScaffolder {
        fn scaffold(&self, _request: &ScaffoldRequest) -> Result<PathBuf> {
            Err(GateError::Scaffold {
                message: "template unavailable".to_string(),
            })
        }
    }

    fn marketplace() -> (TempDir, Config) {
        let temp = TempDir::new().unwrap();
        valid_plugin(&temp.path().join("plugins"), "existing-tools");
        (temp, Config::default())
    }

    fn template(temp: &TempDir, config: &Config) -> TemplateScaffolder {
        TemplateScaffolder::new(config.plugins_dir(temp.path()), config)
    }

    fn plugin_names(temp: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(temp.path().join("plugins"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn plugin_ids_are_prefixed_and_short() {
        let id = new_plugin_id();
        assert!(id.starts_with(E2E_PREFIX));
        assert_eq!(id.len(), E2E_PREFIX.len() + 8);
        assert_ne!(id, new_plugin_id());
    }

    #[test]
    fn successful_run_leaves_no_trace() {
        let (temp, config) = marketplace();
        RegistryGenerator::new(temp.path(), &config).generate().unwrap();
        let registry = config.registry_path(temp.path());
        let before = fs::read(&registry).unwrap();

        let report = E2eRunner::new(temp.path(), &config, template(&temp, &config))
            .run()
            .unwrap();

        assert!(report.passed(), "{:?}", report.failures());
        assert_eq!(report.completed, E2eStep::ALL.to_vec());
        assert!(report.plugin.starts_with(E2E_PREFIX));
        assert_eq!(plugin_names(&temp), vec!["existing-tools"]);
        assert_eq!(fs::read(&registry).unwrap(), before);
        assert!(!temp.path().join(STATE_DIR).exists());
    }

    #[test]
    fn absent_registry_stays_absent() {
        let (temp, config) = marketplace();
        let report = E2eRunner::new(temp.path(), &config, template(&temp, &config))
            .run()
            .unwrap();

        assert!(report.passed(), "{:?}", report.failures());
        let registry = config.registry_path(temp.path());
        assert!(!registry.exists());
        assert!(!registry.parent().unwrap().exists());
    }

    #[test]
    fn interrupt_stops_before_next_step_and_cleans_up() {
        let (temp, config) = marketplace();
        RegistryGenerator::new(temp.path(), &config).generate().unwrap();
        let registry = config.registry_path(temp.path());
        let before = fs::read(&registry).unwrap();

        let flag = Arc::new(AtomicBool::new(false));
        let scaffolder = InterruptingScaffolder(template(&temp, &config), Arc::clone(&flag));
        let report = E2eRunner::new(temp.path(), &config, scaffolder)
            .with_interrupt(flag)
            .run()
            .unwrap();

        assert!(report.interrupted);
        assert_eq!(report.completed, vec![E2eStep::Scaffold]);
        assert_eq!(report.failure.clone().unwrap().step, E2eStep::Validate);
        assert!(report.cleanup.is_empty());
        assert_eq!(plugin_names(&temp), vec!["existing-tools"]);
        assert_eq!(fs::read(&registry).unwrap(), before);
        assert!(!temp.path().join(STATE_DIR).exists());
        assert!(report.into_result().is_err());
    }

    #[test]
    fn failed_validation_still_cleans_up() {
        let (temp, config) = marketplace();
        let registry = config.registry_path(temp.path());
        write(&registry, "{ \"hand\": \"edited\" }\n");

        let runner = E2eRunner::new(
            temp.path(),
            &config,
            BrokenScaffolder(template(&temp, &config)),
        );
        let report = runner.run_with_id("e2e-test-0000abcd").unwrap();

        let failure = report.failure.clone().unwrap();
        assert_eq!(failure.step, E2eStep::Validate);
        assert_eq!(report.completed, vec![E2eStep::Scaffold]);
        assert!(report.cleanup.is_empty());
        assert_eq!(plugin_names(&temp), vec!["existing-tools"]);
        assert_eq!(fs::read_to_string(&registry).unwrap(), "{ \"hand\": \"edited\" }\n");

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("step validate failed"));
    }

    #[test]
    fn failed_scaffold_reports_first_step() {
        let (temp, config) = marketplace();
        let report = E2eRunner::new(temp.path(), &config, FailingScaffolder)
            .run()
            .unwrap();

        assert_eq!(report.failure.unwrap().step, E2eStep::Scaffold);
        assert!(report.completed.is_empty());
        assert_eq!(plugin_names(&temp), vec!["existing-tools"]);
    }

    #[test]
    fn unreachable_confidence_bar_fails_scoring() {
        let (temp, mut config) = marketplace();
        config.scoring.confidence_bar = 101;
        let report = E2eRunner::new(temp.path(), &config, template(&temp, &config))
            .run()
            .unwrap();

        assert_eq!(report.failure.unwrap().step, E2eStep::Score);
        assert_eq!(plugin_names(&temp), vec!["existing-tools"]);
    }

    #[test]
    fn existing_directory_is_never_claimed() {
        let (temp, config) = marketplace();
        let report = E2eRunner::new(temp.path(), &config, template(&temp, &config))
            .run_with_id("existing-tools")
            .unwrap();

        assert_eq!(report.failure.unwrap().step, E2eStep::Scaffold);
        assert_eq!(plugin_names(&temp), vec!["existing-tools"]);
    }

    #[test]
    fn dropped_handle_restores_state() {
        let (temp, config) = marketplace();
        let registry = config.registry_path(temp.path());
        write(&registry, "original\n");

        {
            let lock = RegistryLock::acquire(&registry).unwrap();
            let mut handle =
                ScaffoldHandle::acquire(temp.path(), &config.marketplace.registry, &lock).unwrap();
            let dir = valid_plugin(&temp.path().join("plugins"), "e2e-test-dropped");
            handle.track_plugin(&dir).unwrap();
            write(&registry, "clobbered\n");
        }

        assert_eq!(fs::read_to_string(&registry).unwrap(), "original\n");
        assert_eq!(plugin_names(&temp), vec!["existing-tools"]);
        assert!(!temp.path().join(STATE_DIR).exists());
    }

    #[test]
    fn leftover_journal_is_replayed() {
        let (temp, config) = marketplace();
        let registry = config.registry_path(temp.path());
        write(&registry, "original\n");

        let lock = RegistryLock::acquire(&registry).unwrap();
        let mut handle =
            ScaffoldHandle::acquire(temp.path(), &config.marketplace.registry, &lock).unwrap();
        let dir = valid_plugin(&temp.path().join("plugins"), "e2e-test-killed");
        handle.track_plugin(&dir).unwrap();
        write(&registry, "clobbered\n");
        // Simulates a process killed before any destructor ran; the kernel
        // releases its file lock.
        std::mem::forget(handle);
        drop(lock);

        assert!(temp.path().join(STATE_DIR).join(JOURNAL_FILE).exists());
        let mut lock = RegistryLock::acquire(&registry).unwrap();
        let errors = recover(temp.path(), &mut lock).unwrap().unwrap();
        assert!(errors.is_empty());
        assert_eq!(fs::read_to_string(&registry).unwrap(), "original\n");
        assert_eq!(plugin_names(&temp), vec!["existing-tools"]);
        assert!(recover(temp.path(), &mut lock).unwrap().is_none());
    }

    #[test]
    fn recovery_removes_registry_directory_the_run_created() {
        let (temp, config) = marketplace();
        let registry = config.registry_path(temp.path());
        let registry_dir = registry.parent().unwrap().to_path_buf();

        let lock = RegistryLock::acquire(&registry).unwrap();
        assert!(lock.created_dir());
        let handle =
            ScaffoldHandle::acquire(temp.path(), &config.marketplace.registry, &lock).unwrap();
        write(&registry, "generated\n");
        std::mem::forget(handle);
        drop(lock);
        // A killed process also leaves its lock file behind.
        write(&crate::registry::lock::lock_path(&registry), "");

        let mut lock = RegistryLock::acquire(&registry).unwrap();
        assert!(!lock.created_dir());
        let errors = recover(temp.path(), &mut lock).unwrap().unwrap();
        assert!(errors.is_empty());
        drop(lock);

        assert!(!registry.exists());
        assert!(!registry_dir.exists());
    }

    #[test]
    fn next_run_recovers_before_starting() {
        let (temp, config) = marketplace();
        let lock = RegistryLock::acquire(&config.registry_path(temp.path())).unwrap();
        let handle =
            ScaffoldHandle::acquire(temp.path(), &config.marketplace.registry, &lock).unwrap();
        std::mem::forget(handle);
        drop(lock);

        let report = E2eRunner::new(temp.path(), &config, template(&temp, &config))
            .run()
            .unwrap();
        assert!(report.recovered);
        assert!(report.passed(), "{:?}", report.failures());
    }

    #[test]
    fn held_lock_blocks_the_run() {
        let (temp, config) = marketplace();
        let _guard = RegistryLock::acquire(&config.registry_path(temp.path())).unwrap();

        let err = E2eRunner::new(temp.path(), &config, template(&temp, &config))
            .run()
            .unwrap_err();
        assert!(matches!(err, GateError::RegistryLocked { .. }));
    }

    #[test]
    fn held_lock_blocks_recovery() {
        let (temp, config) = marketplace();
        let registry = config.registry_path(temp.path());
        let mut live = RegistryLock::acquire(&registry).unwrap();
        let handle = ScaffoldHandle::acquire(temp.path(), &config.marketplace.registry, &live)
            .unwrap();

        // Recovery must take the same lock, which the live run still holds.
        let err = RegistryLock::acquire(&registry).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(temp.path().join(STATE_DIR).join(JOURNAL_FILE).exists());

        assert!(handle.release().is_empty());
        assert!(recover(temp.path(), &mut live).unwrap().is_none());
    }
}
