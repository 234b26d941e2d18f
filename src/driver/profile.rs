//! Chrome profile directory management, adapted from the teacher's
//! `browser_profile` module: UUID-named temp directories plus stale
//! `SingletonLock` detection so the domain guard's PID registry (`guard`)
//! can reuse the same "is this process still alive" check.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BrokerError, Result};

/// RAII wrapper for a Chrome profile directory; removes it on drop unless
/// [`BrowserProfile::into_path`] is called to hand ownership elsewhere.
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl BrowserProfile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleanup_on_drop: true,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to clean up profile directory");
            }
        }
    }
}

pub fn create_unique_profile_with_prefix(prefix: &str) -> Result<BrowserProfile> {
    let path = std::env::temp_dir().join(format!("{prefix}_{}", Uuid::new_v4()));
    std::fs::create_dir(&path)
        .map_err(|e| BrokerError::Internal(format!("creating profile dir {}: {e}", path.display())))?;
    info!(path = %path.display(), "created browser profile directory");
    Ok(BrowserProfile::new(path))
}

/// Parse `SingletonLock`'s `{hostname}-{pid}` target and check liveness via
/// `kill(pid, 0)`. Returns `true` (safe to reuse/delete) when the lock is
/// absent or its owning process is gone.
#[cfg(unix)]
pub fn is_singleton_lock_stale(profile_dir: &Path) -> bool {
    let lock_path = profile_dir.join("SingletonLock");
    if !lock_path.exists() && !lock_path.is_symlink() {
        return true;
    }
    let Ok(target) = std::fs::read_link(&lock_path) else {
        return true;
    };
    let Some(pid_str) = target.to_string_lossy().rsplit('-').next().map(str::to_owned) else {
        return true;
    };
    let Ok(pid) = pid_str.parse::<i32>() else {
        return true;
    };
    // SAFETY: signal 0 performs no action beyond an existence/permission check.
    let alive = unsafe { libc::kill(pid, 0) == 0 };
    if !alive {
        debug!(pid, "singleton lock is stale");
    }
    !alive
}

#[cfg(not(unix))]
pub fn is_singleton_lock_stale(_profile_dir: &Path) -> bool {
    true
}

pub fn cleanup_stale_lock(profile_dir: &Path) -> Result<()> {
    if is_singleton_lock_stale(profile_dir) {
        let lock_path = profile_dir.join("SingletonLock");
        if lock_path.exists() || lock_path.is_symlink() {
            std::fs::remove_file(&lock_path)
                .map_err(|e| BrokerError::Internal(format!("removing stale lock: {e}")))?;
        }
    }
    Ok(())
}
