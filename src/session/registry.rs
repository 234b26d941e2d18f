//! Session registry (C5) — the heart of the broker.
//!
//! Owns the Session → Worker → Target tree and the global
//! `target_id → (session_id, worker_id)` owner map that enforces the
//! ownership bijection invariant: every target belongs to exactly one
//! worker of exactly one session, checked on every `get_page`/
//! `execute_command` call before the driver is touched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::page::Page;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BrokerConfig;
use crate::driver::Driver;
use crate::error::{BrokerError, Result};
use crate::page_pool::PagePool;
use crate::queue::CommandQueue;
use crate::stats::RegistryStats;

use super::events::{EventBus, RegistryEvent};
use super::types::{OwnerPointer, Session, SessionId, Target, TargetId, Worker, WorkerId, DEFAULT_WORKER_ID};

/// A worker's targets, as reported by `SessionRegistry::session_info`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    pub target_ids: Vec<TargetId>,
}

/// Projection of a `Session` safe to serialize across the IPC boundary
/// (spec §4.9 `session/get`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub age_secs: u64,
    pub idle_secs: u64,
    pub workers: Vec<WorkerInfo>,
}

pub struct SessionRegistry {
    config: BrokerConfig,
    driver: Arc<Driver>,
    page_pool: Arc<PagePool>,
    sessions: DashMap<SessionId, Arc<RwLock<Session>>>,
    targets: DashMap<TargetId, Arc<RwLock<Target>>>,
    owners: DashMap<TargetId, OwnerPointer>,
    events: EventBus,
    queue: CommandQueue,
    created_at: Instant,
    last_cleanup: RwLock<Option<Instant>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(config: BrokerConfig, driver: Arc<Driver>, page_pool: Arc<PagePool>) -> Arc<Self> {
        Arc::new(Self {
            config,
            driver,
            page_pool,
            sessions: DashMap::new(),
            targets: DashMap::new(),
            owners: DashMap::new(),
            events: EventBus::new(),
            queue: CommandQueue::new(),
            created_at: Instant::now(),
            last_cleanup: RwLock::new(None),
        })
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Run `f` on the per-`"session:worker"` serial queue (C4), so two
    /// commands against the same worker never race the driver. Returns
    /// `None` if the queue was torn down (its session deleted) before `f`
    /// ran.
    pub async fn submit<F, T>(&self, session_id: &str, worker_id: Option<&str>, f: F) -> Option<T>
    where
        F: FnOnce() -> futures::future::BoxFuture<'static, T> + Send + 'static,
        T: Send + 'static,
    {
        self.queue.submit(session_id, worker_id, f).await
    }

    /// Create a fresh session. At exactly `max_sessions` live sessions this
    /// runs one TTL eviction sweep before giving up: if the sweep frees at
    /// least one slot the creation proceeds, otherwise it fails with
    /// `SessionLimitReached` (spec §8, boundary behaviors).
    pub async fn create_session(&self) -> Result<SessionId> {
        if self.sessions.len() >= self.config.max_sessions() && self.cleanup_inactive().await.is_empty() {
            return Err(BrokerError::SessionLimitReached {
                max: self.config.max_sessions(),
            });
        }
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Arc::new(RwLock::new(Session::new(id.clone()))));
        info!(session_id = %id, "session created");
        self.events.publish(RegistryEvent::SessionCreated { session_id: id.clone() });
        Ok(id)
    }

    pub async fn get_or_create_session(&self, session_id: &str) -> Result<SessionId> {
        validate_session_id(session_id)?;
        if self.sessions.contains_key(session_id) {
            return Ok(session_id.to_string());
        }
        if self.sessions.len() >= self.config.max_sessions() && self.cleanup_inactive().await.is_empty() {
            return Err(BrokerError::SessionLimitReached {
                max: self.config.max_sessions(),
            });
        }
        self.sessions.insert(
            session_id.to_string(),
            Arc::new(RwLock::new(Session::new(session_id.to_string()))),
        );
        self.events.publish(RegistryEvent::SessionCreated {
            session_id: session_id.to_string(),
        });
        Ok(session_id.to_string())
    }

    pub async fn touch(&self, session_id: &str) -> Result<()> {
        let session = self.session(session_id)?;
        session.write().await.touch();
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let (_, session) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| BrokerError::SessionNotFound(session_id.to_string()))?;

        let session = session.read().await;
        for worker in session.workers.values() {
            for target_id in &worker.targets {
                self.release_target(target_id).await;
            }
        }
        drop(session);
        self.queue.remove_session(session_id);

        self.events.publish(RegistryEvent::SessionDeleted {
            session_id: session_id.to_string(),
        });
        info!(session_id, "session deleted");
        Ok(())
    }

    pub async fn create_worker(&self, session_id: &str) -> Result<WorkerId> {
        let session_arc = self.session(session_id)?;
        let mut session = session_arc.write().await;
        if session.workers.len() >= self.config.max_workers_per_session() {
            return Err(BrokerError::WorkerLimitReached {
                session_id: session_id.to_string(),
                max: self.config.max_workers_per_session(),
            });
        }
        let worker_id = Uuid::new_v4().to_string();
        session
            .workers
            .insert(worker_id.clone(), Worker::new(worker_id.clone(), session_id.to_string()));
        self.events.publish(RegistryEvent::WorkerCreated {
            session_id: session_id.to_string(),
            worker_id: worker_id.clone(),
        });
        Ok(worker_id)
    }

    pub async fn delete_worker(&self, session_id: &str, worker_id: &str) -> Result<()> {
        if worker_id == DEFAULT_WORKER_ID {
            return Err(BrokerError::CannotDeleteDefaultWorker);
        }
        let session_arc = self.session(session_id)?;
        let mut session = session_arc.write().await;
        let worker = session
            .workers
            .remove(worker_id)
            .ok_or_else(|| BrokerError::TargetNotFound(worker_id.to_string()))?;
        drop(session);

        for target_id in &worker.targets {
            self.release_target(target_id).await;
        }

        self.events.publish(RegistryEvent::WorkerDeleted {
            session_id: session_id.to_string(),
            worker_id: worker_id.to_string(),
        });
        Ok(())
    }

    pub async fn create_target(self: &Arc<Self>, session_id: &str, worker_id: &str) -> Result<TargetId> {
        let session_arc = self.session(session_id)?;
        {
            let session = session_arc.read().await;
            if !session.workers.contains_key(worker_id) {
                return Err(BrokerError::TargetNotFound(worker_id.to_string()));
            }
        }

        // Snapshot every page target that exists before this call's own page
        // is opened, so the delayed reap below can tell "was already here"
        // apart from "Chrome spawned this as a side effect of opening ours"
        // (spec §4.1/§8 scenario 6).
        let pre_existing: HashSet<TargetId> = self
            .driver
            .list_page_targets()
            .await
            .map(|targets| targets.into_iter().map(|t| t.target_id).collect())
            .unwrap_or_default();

        let guard = self.page_pool.acquire().await?;
        let page = guard.into_page();
        let target_id = page.target_id().inner().to_string();

        let owner = OwnerPointer {
            session_id: session_id.to_string(),
            worker_id: worker_id.to_string(),
        };
        self.owners.insert(target_id.clone(), owner.clone());
        self.targets.insert(
            target_id.clone(),
            Arc::new(RwLock::new(Target {
                id: target_id.clone(),
                owner,
                page,
                created_at: Instant::now(),
            })),
        );

        let mut session = session_arc.write().await;
        if let Some(worker) = session.workers.get_mut(worker_id) {
            worker.targets.insert(target_id.clone());
        }
        session.touch();
        drop(session);

        self.events.publish(RegistryEvent::TargetCreated {
            session_id: session_id.to_string(),
            worker_id: worker_id.to_string(),
            target_id: target_id.clone(),
        });

        self.spawn_blank_target_reap(pre_existing);

        Ok(target_id)
    }

    /// ~500ms after a `create_target` call, close any blank page target that
    /// (a) wasn't present in the pre-call snapshot, and (b) never made it
    /// into the owner map — i.e. Chrome opened it as a side effect (e.g. a
    /// `about:blank` popup) rather than it being the page this call itself
    /// claimed (spec §4.1/§8 scenario 6).
    fn spawn_blank_target_reap(self: &Arc<Self>, pre_existing: HashSet<TargetId>) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let Ok(targets) = registry.driver.list_page_targets().await else {
                return;
            };
            for target in targets {
                if pre_existing.contains(&target.target_id) || registry.owners.contains_key(&target.target_id) {
                    continue;
                }
                if target.url != "about:blank" {
                    continue;
                }
                debug!(target_id = %target.target_id, "reaping untracked blank page target");
                if let Ok(pages) = registry.driver.pages().await {
                    if let Some(page) = pages.into_iter().find(|p| p.target_id().inner() == target.target_id) {
                        if let Err(e) = registry.driver.close_page(&page).await {
                            debug!(target_id = %target.target_id, error = %e, "closing untracked blank target");
                        }
                    }
                }
            }
        });
    }

    pub async fn close_target(&self, session_id: &str, worker_id: &str, target_id: &str) -> Result<()> {
        self.check_ownership(session_id, worker_id, target_id)?;

        let session_arc = self.session(session_id)?;
        {
            let mut session = session_arc.write().await;
            if let Some(worker) = session.workers.get_mut(worker_id) {
                worker.targets.remove(target_id);
            }
        }

        self.release_target(target_id).await;

        self.events.publish(RegistryEvent::TargetClosed {
            session_id: session_id.to_string(),
            worker_id: worker_id.to_string(),
            target_id: target_id.to_string(),
        });
        Ok(())
    }

    pub async fn get_page(&self, session_id: &str, worker_id: &str, target_id: &str) -> Result<Page> {
        self.check_ownership(session_id, worker_id, target_id)?;
        self.touch(session_id).await?;
        let target = self
            .targets
            .get(target_id)
            .ok_or_else(|| BrokerError::TargetNotFound(target_id.to_string()))?;
        let target = target.read().await;
        if target.page.is_closed().await.unwrap_or(true) {
            return Err(BrokerError::PageClosed(target_id.to_string()));
        }
        Ok(target.page.clone())
    }

    /// Verify the claimed (session, worker) owns `target_id`; this is the
    /// ownership bijection check every mutating operation runs first.
    pub fn check_ownership(&self, session_id: &str, worker_id: &str, target_id: &str) -> Result<()> {
        let owner = self
            .owners
            .get(target_id)
            .ok_or_else(|| BrokerError::TargetNotFound(target_id.to_string()))?;
        if owner.session_id != session_id || owner.worker_id != worker_id {
            return Err(BrokerError::OwnershipViolation {
                target_id: target_id.to_string(),
            });
        }
        Ok(())
    }

    /// TTL-eviction sweep (spec §4.1, §8 scenario 2): delete sessions whose
    /// `last_active` has exceeded `session_ttl`.
    pub async fn cleanup_inactive(&self) -> Vec<SessionId> {
        let ttl: Duration = self.config.session_ttl();
        let now = Instant::now();
        let mut evicted = Vec::new();

        let stale: Vec<SessionId> = {
            let mut ids = Vec::new();
            for entry in self.sessions.iter() {
                let session = entry.value().read().await;
                if now.duration_since(session.last_active) >= ttl {
                    ids.push(session.id.clone());
                }
            }
            ids
        };

        for session_id in stale {
            if self.delete_session(&session_id).await.is_ok() {
                self.events.publish(RegistryEvent::SessionEvicted {
                    session_id: session_id.clone(),
                });
                warn!(session_id, "session evicted after exceeding TTL");
                evicted.push(session_id);
            }
        }
        *self.last_cleanup.write().await = Some(now);
        evicted
    }

    pub async fn stats(&self) -> RegistryStats {
        let sessions = self.sessions.len();
        let targets = self.targets.len();
        let workers = self
            .sessions
            .iter()
            .filter_map(|entry| entry.value().try_read().ok().map(|s| s.workers.len()))
            .sum();
        let uptime_secs = self.created_at.elapsed().as_secs();
        let last_cleanup_secs_ago = self.last_cleanup.read().await.map(|t| t.elapsed().as_secs());
        RegistryStats {
            sessions,
            workers,
            targets,
            uptime_secs,
            last_cleanup_secs_ago,
            memory_bytes: process_memory_bytes(),
        }
    }

    /// Projection of a session's shape for `session/get` (spec §4.9).
    pub async fn session_info(&self, session_id: &str) -> Result<SessionInfo> {
        let session_arc = self.session(session_id)?;
        let session = session_arc.read().await;
        let now = Instant::now();
        Ok(SessionInfo {
            session_id: session.id.clone(),
            age_secs: now.duration_since(session.created_at).as_secs(),
            idle_secs: now.duration_since(session.last_active).as_secs(),
            workers: session
                .workers
                .values()
                .map(|w| WorkerInfo {
                    worker_id: w.id.clone(),
                    target_ids: w.targets.iter().cloned().collect(),
                })
                .collect(),
        })
    }

    /// All live session ids, for `session/list` (spec §4.9).
    #[must_use]
    pub fn list_session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Target ids owned by a worker, for `tabs/list` (spec §4.9).
    pub async fn list_tabs(&self, session_id: &str, worker_id: &str) -> Result<Vec<TargetId>> {
        let session_arc = self.session(session_id)?;
        let session = session_arc.read().await;
        let worker = session
            .workers
            .get(worker_id)
            .ok_or_else(|| BrokerError::TargetNotFound(worker_id.to_string()))?;
        Ok(worker.targets.iter().cloned().collect())
    }

    /// Raw CDP command passthrough for `cdp/execute` (spec §4.9), after the
    /// usual ownership check `get_page` already performs.
    pub async fn execute_cdp(
        &self,
        session_id: &str,
        worker_id: &str,
        target_id: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let page = self.get_page(session_id, worker_id, target_id).await?;
        self.driver.send_command(&page, method, params).await
    }

    fn session(&self, session_id: &str) -> Result<Arc<RwLock<Session>>> {
        self.sessions
            .get(session_id)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| BrokerError::SessionNotFound(session_id.to_string()))
    }

    /// Periodic owner-map consistency sweep: any entry whose session or
    /// worker no longer exists is released. Grounded in the ownership
    /// bijection invariant — an orphan is any break in that bijection left
    /// by a crash or disconnect that skipped normal cleanup. Distinct from
    /// [`Self::spawn_blank_target_reap`], which reaps Chrome-spawned blank
    /// pages that never entered the owner map at all (spec §4.1/§8
    /// scenario 6).
    pub async fn sweep_orphans(&self) -> usize {
        let mut orphaned = Vec::new();
        for entry in self.owners.iter() {
            let target_id = entry.key().clone();
            let owner = entry.value().clone();
            let alive = match self.sessions.get(&owner.session_id) {
                Some(session) => session.read().await.workers.contains_key(&owner.worker_id),
                None => false,
            };
            if !alive {
                orphaned.push(target_id);
            }
        }
        let count = orphaned.len();
        for target_id in orphaned {
            debug!(target_id, "releasing orphaned target");
            self.release_target(&target_id).await;
        }
        count
    }

    async fn release_target(&self, target_id: &str) {
        self.owners.remove(target_id);
        if let Some((_, target)) = self.targets.remove(target_id) {
            let target = target.read().await;
            if let Err(e) = self.driver.close_page(&target.page).await {
                debug!(target_id, error = %e, "closing released target page");
            }
        }
    }
}

/// Resident memory of this process, for `RegistryStats::memory_bytes`.
/// `None` if the current pid can't be resolved or sysinfo has no reading
/// for it yet.
fn process_memory_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = sysinfo::System::new();
    system.refresh_process(pid);
    system.process(pid).map(sysinfo::Process::memory)
}

/// Session ids are whitelisted `[A-Za-z0-9_-]+` (spec §4.11) so they are
/// always safe to use as a filename component for storage-state snapshots.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.is_empty()
        || !session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(BrokerError::InvalidSessionId(session_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_session_ids() {
        assert!(validate_session_id("abc-123_DEF").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("has space").is_err());
        assert!(validate_session_id("semi;colon").is_err());
    }
}
