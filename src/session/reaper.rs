//! Orphan reaper and TTL-eviction sweep, run as cancellable tasks attached
//! to the registry's lifetime (Design Notes §9) — neither task outlives the
//! `SessionRegistry` that spawned it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::registry::SessionRegistry;

pub struct Reaper {
    cleanup_handle: JoinHandle<()>,
    orphan_handle: JoinHandle<()>,
}

impl Reaper {
    pub fn spawn(registry: Arc<SessionRegistry>, cleanup_interval: Duration, orphan_interval: Duration) -> Self {
        let cleanup_registry = Arc::clone(&registry);
        let cleanup_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            loop {
                ticker.tick().await;
                let evicted = cleanup_registry.cleanup_inactive().await;
                if !evicted.is_empty() {
                    info!(count = evicted.len(), "TTL sweep evicted inactive sessions");
                }
            }
        });

        let orphan_registry = registry;
        let orphan_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(orphan_interval);
            loop {
                ticker.tick().await;
                let count = orphan_registry.sweep_orphans().await;
                if count > 0 {
                    debug!(count, "orphan reaper released stale targets");
                }
            }
        });

        Self {
            cleanup_handle,
            orphan_handle,
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.cleanup_handle.abort();
        self.orphan_handle.abort();
    }
}
