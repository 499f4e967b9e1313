// src/filesystem/workdir.rs

//! Scoped process working directory
//!
//! The working directory is process-wide state. Entering a scope takes a
//! process-wide reentrant lock, so nested scopes on one thread work while a
//! second thread blocks until the first thread's outermost scope is left.
//!
//! # Example
//!
//! ```ignore
//! use recipe_variants::filesystem::WorkdirGuard;
//!
//! {
//!     let _cwd = WorkdirGuard::enter(&build_folder)?;
//!     // relative paths now resolve under build_folder
//! }
//! // previous directory restored here, even on early return
//! ```

use crate::error::Result;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, const_reentrant_mutex};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

static WORKDIR_LOCK: ReentrantMutex<()> = const_reentrant_mutex(());

/// Restores the previous working directory when dropped
pub struct WorkdirGuard {
    previous: PathBuf,
    _lock: ReentrantMutexGuard<'static, ()>,
}

impl WorkdirGuard {
    /// Change into `path`, creating it if needed
    pub fn enter(path: &Path) -> Result<Self> {
        let lock = WORKDIR_LOCK.lock();
        let previous = env::current_dir()?;

        fs::create_dir_all(path)?;
        env::set_current_dir(path)?;
        debug!("Entered working directory {}", path.display());

        Ok(Self {
            previous,
            _lock: lock,
        })
    }

    /// Directory that will be restored on drop
    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        // Lock field is released after this runs
        if let Err(e) = env::set_current_dir(&self.previous) {
            warn!(
                "Failed to restore working directory {}: {}",
                self.previous.display(),
                e
            );
        } else {
            debug!("Restored working directory {}", self.previous.display());
        }
    }
}

/// Hold the working directory lock without changing directory
///
/// Lets callers observe the working directory while no other thread can
/// move it. Scopes entered on the same thread still work while held.
pub fn hold_workdir() -> ReentrantMutexGuard<'static, ()> {
    WORKDIR_LOCK.lock()
}

/// Run `f` with `path` as the working directory
pub fn in_workdir<T>(path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let _guard = WorkdirGuard::enter(path)?;
    f()
}
