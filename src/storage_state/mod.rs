//! Storage-state manager (C10): per-session cookie + per-origin
//! localStorage snapshot/restore to `<dir>/<session_id>.json`, session-id
//! whitelist validation before any I/O, a periodic watchdog, and a final
//! flush on session deletion (spec §4.11).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::page::Page;
use chromiumoxide_cdp::cdp::browser_protocol::network::{CookieParam, GetCookiesParams, SetCookiesParams};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{BrokerError, Result};
use crate::guard::{host_of, DomainGuard};
use crate::session::validate_session_id;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StorageStateSnapshot {
    pub cookies: Vec<SerializedCookie>,
    pub local_storage: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

pub struct StorageStateManager {
    dir: PathBuf,
    domain_guard: Arc<DomainGuard>,
    watchdog: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl StorageStateManager {
    #[must_use]
    pub fn new(dir: PathBuf, domain_guard: Arc<DomainGuard>) -> Self {
        Self {
            dir,
            domain_guard,
            watchdog: tokio::sync::Mutex::new(None),
        }
    }

    fn snapshot_path(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    pub async fn save(&self, session_id: &str, page: &Page) -> Result<()> {
        let path = self.snapshot_path(session_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BrokerError::Internal(format!("creating storage-state dir: {e}")))?;

        let cookies = page
            .execute(GetCookiesParams::default())
            .await
            .map_err(|e| BrokerError::ProtocolError(e.to_string()))?
            .result
            .cookies
            .into_iter()
            .map(|c| SerializedCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect();

        let local_storage = read_local_storage(page).await.unwrap_or_default();

        let snapshot = StorageStateSnapshot {
            cookies,
            local_storage,
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| BrokerError::Internal(format!("serializing snapshot: {e}")))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| BrokerError::Internal(format!("writing {}: {e}", path.display())))?;
        debug!(session_id, path = %path.display(), "storage state saved");
        Ok(())
    }

    pub async fn restore(&self, session_id: &str, page: &Page) -> Result<bool> {
        let path = self.snapshot_path(session_id)?;
        if !path.exists() {
            return Ok(false);
        }

        let url = page
            .url()
            .await
            .map_err(|e| BrokerError::ProtocolError(e.to_string()))?
            .unwrap_or_default();
        if let Some(domain) = host_of(&url) {
            self.domain_guard.check(&domain, "storage_state_restore").await?;
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| BrokerError::Internal(format!("reading {}: {e}", path.display())))?;
        let snapshot: StorageStateSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| BrokerError::Internal(format!("parsing {}: {e}", path.display())))?;

        if !snapshot.cookies.is_empty() {
            let params: Vec<CookieParam> = snapshot
                .cookies
                .into_iter()
                .map(|c| {
                    CookieParam::builder()
                        .name(c.name)
                        .value(c.value)
                        .domain(c.domain)
                        .path(c.path)
                        .secure(c.secure)
                        .http_only(c.http_only)
                        .build()
                        .expect("snapshot cookies always have name and value")
                })
                .collect();
            page.execute(SetCookiesParams::new(params))
                .await
                .map_err(|e| BrokerError::ProtocolError(e.to_string()))?;
        }

        write_local_storage(page, &snapshot.local_storage).await?;
        info!(session_id, "storage state restored");
        Ok(true)
    }

    pub fn start_watchdog<F>(&self, interval: Duration, flush: F)
    where
        F: Fn() -> futures::future::BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                flush().await;
            }
        });
        if let Ok(mut guard) = self.watchdog.try_lock() {
            *guard = Some(handle);
        }
    }

    pub fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        self.snapshot_path(session_id)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for StorageStateManager {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.watchdog.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

async fn read_local_storage(page: &Page) -> Result<HashMap<String, HashMap<String, String>>> {
    let script = "JSON.stringify(Object.fromEntries(Object.entries(window.localStorage)))";
    let value: String = page
        .evaluate(script)
        .await
        .map_err(|e| BrokerError::ProtocolError(e.to_string()))?
        .into_value()
        .map_err(|e| BrokerError::ProtocolError(e.to_string()))?;
    let entries: HashMap<String, String> = serde_json::from_str(&value)
        .map_err(|e| BrokerError::Internal(format!("parsing localStorage dump: {e}")))?;
    let origin: String = page
        .evaluate("window.location.origin")
        .await
        .map_err(|e| BrokerError::ProtocolError(e.to_string()))?
        .into_value()
        .unwrap_or_default();
    let mut map = HashMap::new();
    map.insert(origin, entries);
    Ok(map)
}

async fn write_local_storage(page: &Page, storage: &HashMap<String, HashMap<String, String>>) -> Result<()> {
    for (origin, entries) in storage {
        if let Err(e) = page.goto(origin).await {
            warn!(origin, error = %e, "failed to navigate to origin for localStorage restore");
            continue;
        }
        for (key, value) in entries {
            let script = format!(
                "window.localStorage.setItem({}, {})",
                serde_json::to_string(key).unwrap_or_default(),
                serde_json::to_string(value).unwrap_or_default(),
            );
            if let Err(e) = page.evaluate(script).await {
                warn!(origin, key, error = %e, "failed to restore localStorage entry");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_path_rejects_invalid_session_ids() {
        let manager = StorageStateManager::new(PathBuf::from("/tmp/does-not-matter"), Arc::new(DomainGuard::default()));
        assert!(manager.snapshot_path("../escape").is_err());
        assert!(manager.snapshot_path("valid-id_1").is_ok());
    }
}
