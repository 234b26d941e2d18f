//! Pre-warmed page pool (C2), generalized from the teacher's
//! `browser_pool::BrowserPool` down one level: instead of pooling whole
//! browser processes, this pools blank pages inside one already-connected
//! browser/worker context.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chromiumoxide::page::Page;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::driver::Driver;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct PagePoolStats {
    pub size: usize,
    pub acquired: u64,
    pub released: u64,
    pub discarded: u64,
}

struct PooledPage {
    page: Page,
    #[allow(dead_code)]
    last_used: Instant,
}

pub struct PagePool {
    driver: Arc<Driver>,
    capacity: usize,
    available: Mutex<VecDeque<PooledPage>>,
    acquired: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

impl PagePool {
    #[must_use]
    pub fn new(driver: Arc<Driver>, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            driver,
            capacity,
            available: Mutex::new(VecDeque::new()),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    pub async fn acquire(self: &Arc<Self>) -> Result<PooledPageGuard> {
        let mut available = self.available.lock().await;
        let page = if let Some(pooled) = available.pop_front() {
            pooled.page
        } else {
            drop(available);
            self.driver.new_page(None).await?
        };
        self.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(PooledPageGuard {
            pool: Arc::clone(self),
            page: Some(page),
        })
    }

    /// Reset a page to the blank sentinel and clear per-origin storage before
    /// returning it to the pool, so no cookies/localStorage leak across
    /// sessions that share the default browser context (Open Question #1,
    /// decided in SPEC_FULL.md §5).
    async fn release(&self, page: Page) {
        self.released.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = page.goto("about:blank").await {
            warn!(error = %e, "failed to reset pooled page before reuse, discarding");
            self.discarded.fetch_add(1, Ordering::Relaxed);
            let _ = page.close().await;
            return;
        }
        if let Err(e) = page
            .evaluate("window.localStorage.clear(); window.sessionStorage.clear();")
            .await
        {
            debug!(error = %e, "failed to clear storage on pooled page");
        }

        let mut available = self.available.lock().await;
        if available.len() >= self.capacity {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            drop(available);
            let _ = page.close().await;
            return;
        }
        available.push_back(PooledPage {
            page,
            last_used: Instant::now(),
        });
    }

    pub async fn stats(&self) -> PagePoolStats {
        PagePoolStats {
            size: self.available.lock().await.len(),
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// RAII guard returning its page to the pool on drop. Double-release (explicit
/// drop after the guard already released) is a no-op, not a panic — mirrors
/// the teacher's `PooledBrowserGuard`.
pub struct PooledPageGuard {
    pool: Arc<PagePool>,
    page: Option<Page>,
}

impl PooledPageGuard {
    #[must_use]
    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("page present while guard is held")
    }

    /// Take permanent ownership of the page instead of returning it to the
    /// pool on drop — used when a pooled page is handed off to the session
    /// registry as a long-lived target rather than reused transiently.
    #[must_use]
    pub fn into_page(mut self) -> Page {
        self.page.take().expect("page present while guard is held")
    }
}

impl Drop for PooledPageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let pool = Arc::clone(&self.pool);
            tokio::spawn(async move {
                pool.release(page).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_default_to_zero() {
        let stats = PagePoolStats::default();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.acquired, 0);
    }
}
