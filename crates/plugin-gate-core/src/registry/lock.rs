//! Advisory lock around registry generation.
//!
//! The generator itself never locks. Callers that may overlap (a scheduled run
//! and a push-triggered run, the e2e runner and a maintainer) wrap generation
//! in a [`RegistryLock`] keyed by the registry path.
//!
//! The lock file is unlinked while still locked, then unlocked. An acquirer
//! that wins the lock on a file that is no longer at the lock path lost a race
//! with that release and starts over on a fresh file.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{GateError, Result};

const MAX_ATTEMPTS: usize = 8;

/// RAII guard holding an exclusive lock on `<registry>.lock`.
/// Dropping it removes the lock file, then releases the lock.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
    path: PathBuf,
    /// Registry directory this lock created and removes again when empty
    created_dir: Option<PathBuf>,
}

impl RegistryLock {
    /// Acquire without blocking; contention yields `RegistryLocked`.
    pub fn acquire(registry_path: &Path) -> Result<Self> {
        let path = lock_path(registry_path);
        let locked = || GateError::RegistryLocked {
            path: registry_path.to_path_buf(),
        };

        let mut created_dir = None;
        for attempt in 1..=MAX_ATTEMPTS {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)?;
                    created_dir = Some(parent.to_path_buf());
                }
            }

            let file = match OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)
            {
                Ok(file) => file,
                // The directory went away under us with a released lock.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            if let Err(e) = file.try_lock_exclusive() {
                debug!(path = %path.display(), error = %e, "registry lock contended");
                return Err(locked());
            }

            if !still_linked(&file, &path) {
                debug!(path = %path.display(), attempt, "lock file replaced, retrying");
                continue;
            }

            debug!(path = %path.display(), "registry lock acquired");
            return Ok(Self {
                file,
                path,
                created_dir,
            });
        }

        Err(locked())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the registry directory on release even though another run
    /// created it. Used when replaying a journal from a run that did.
    pub fn remove_dir_on_release(&mut self) {
        if self.created_dir.is_none() {
            self.created_dir = self.path.parent().map(Path::to_path_buf);
        }
    }

    /// Whether acquiring this lock created the registry directory
    pub fn created_dir(&self) -> bool {
        self.created_dir.is_some()
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove registry lock file");
            }
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release registry lock");
        }
        if let Some(dir) = &self.created_dir {
            // Only succeeds when nothing else was written next to the lock.
            let _ = fs::remove_dir(dir);
        }
    }
}

/// Lock file location for a registry document
pub fn lock_path(registry_path: &Path) -> PathBuf {
    let mut name = registry_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    registry_path.with_file_name(name)
}

/// True when `path` still names the open `file`
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(open), Ok(linked)) => open.dev() == linked.dev() && open.ino() == linked.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> bool {
    path.exists()
}
