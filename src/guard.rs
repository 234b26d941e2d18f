//! Domain guard and process-wide PID registry (C12). The domain blocklist
//! gate runs before any storage/cookie mutation; the PID registry, grounded
//! in the teacher's `browser_profile::is_singleton_lock_stale`, tracks one
//! broker process per debug port under a temp directory and sweeps stale
//! entries (processes that no longer respond to `kill(pid, 0)`) on startup.

use std::collections::HashSet;
use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::driver::profile::is_singleton_lock_stale;
use crate::error::{BrokerError, Result};

pub struct DomainGuard {
    blocked: RwLock<HashSet<String>>,
}

impl DomainGuard {
    #[must_use]
    pub fn new(blocked: impl IntoIterator<Item = String>) -> Self {
        Self {
            blocked: RwLock::new(blocked.into_iter().collect()),
        }
    }

    pub async fn check(&self, domain: &str, operation: &str) -> Result<()> {
        if self.blocked.read().await.contains(domain) {
            return Err(BrokerError::DomainBlocked {
                domain: domain.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    pub async fn block(&self, domain: impl Into<String>) {
        self.blocked.write().await.insert(domain.into());
    }

    pub async fn unblock(&self, domain: &str) {
        self.blocked.write().await.remove(domain);
    }
}

impl Default for DomainGuard {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

/// Host portion of a page URL, the unit [`DomainGuard::check`] matches
/// against. Returns `None` for URLs with no host (e.g. `about:blank`),
/// which the guard treats as unconditionally allowed.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
}

/// Registry file at `<tmp>/browser-broker-pids/<debug_port>.pid`, one entry
/// per debug port this machine has ever run a broker against.
pub struct PidRegistry {
    dir: PathBuf,
}

impl PidRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: std::env::temp_dir().join("browser-broker-pids"),
        }
    }

    fn entry_path(&self, debug_port: u16) -> PathBuf {
        self.dir.join(format!("{debug_port}.pid"))
    }

    /// Register this process for `debug_port`, sweeping a stale entry first
    /// if one is present and its owning process is gone.
    pub fn claim(&self, debug_port: u16) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| BrokerError::Internal(format!("creating pid registry dir: {e}")))?;

        let path = self.entry_path(debug_port);
        if path.exists() {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                if let Ok(pid) = contents.trim().parse::<i32>() {
                    let alive = unsafe { libc::kill(pid, 0) == 0 };
                    if alive {
                        return Err(BrokerError::Internal(format!(
                            "debug port {debug_port} already claimed by pid {pid}"
                        )));
                    }
                    warn!(debug_port, stale_pid = pid, "sweeping stale pid registry entry");
                }
            }
        }

        std::fs::write(&path, std::process::id().to_string())
            .map_err(|e| BrokerError::Internal(format!("writing pid registry entry: {e}")))?;
        info!(debug_port, pid = std::process::id(), "claimed debug port");
        Ok(())
    }

    pub fn release(&self, debug_port: u16) {
        let path = self.entry_path(debug_port);
        let _ = std::fs::remove_file(path);
    }

    /// Sweep every entry in the registry at startup, removing any whose
    /// owning process is no longer alive (reuses the same stale-lock check
    /// the teacher applies to Chrome's `SingletonLock` files).
    pub fn sweep_stale(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return 0;
        };
        let mut swept = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(contents) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(pid) = contents.trim().parse::<i32>() else {
                continue;
            };
            let alive = unsafe { libc::kill(pid, 0) == 0 };
            if !alive {
                let _ = std::fs::remove_file(&path);
                swept += 1;
            }
        }
        swept
    }
}

impl Default for PidRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-exported so callers checking a profile directory's lock don't need to
/// reach into `driver::profile` directly.
pub fn profile_lock_is_stale(profile_dir: &std::path::Path) -> bool {
    is_singleton_lock_stale(profile_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_and_unblocks_a_domain() {
        let guard = DomainGuard::new(["evil.example".to_string()]);
        assert!(guard.check("evil.example", "set_cookie").await.is_err());
        assert!(guard.check("ok.example", "set_cookie").await.is_ok());
        guard.unblock("evil.example").await;
        assert!(guard.check("evil.example", "set_cookie").await.is_ok());
    }
}
