//! Debug-protocol driver facade (C1).
//!
//! Wraps a single `chromiumoxide` [`Browser`] attached to an already-running
//! Chrome instance via its debug port, the way the teacher's `browser_setup`
//! launches and wires up a browser's event handler task, except here we
//! attach rather than launch: the broker multiplexes many clients onto one
//! externally-managed browser process.

pub mod profile;

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserContext};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{BrokerError, Result};

/// A target (tab/page) discovered via `Target.getTargets`.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub target_id: String,
    pub url: String,
    pub title: String,
}

/// The attached debug-protocol connection.
///
/// Owns the single retained event-handler task; it is aborted when the
/// `Driver` is dropped so no handler ever outlives its browser connection.
pub struct Driver {
    browser: Browser,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl Driver {
    /// Attach to a running Chrome instance's debug port.
    pub async fn connect(debug_port: u16) -> Result<Arc<Self>> {
        let ws_url = discover_ws_url(debug_port).await?;
        info!(debug_port, "connecting to debug protocol endpoint");

        let (browser, mut handler) = Browser::connect(&ws_url)
            .await
            .map_err(|e| BrokerError::DriverDisconnected(e.to_string()))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!(error = %e, "debug protocol handler event error");
                }
            }
            debug!("debug protocol handler task exiting");
        });

        Ok(Arc::new(Self {
            browser,
            handler: Mutex::new(Some(handle)),
        }))
    }

    /// Open a new blank page, optionally inside an isolated browser context
    /// (used for per-worker or per-origin isolation by the page/browser pools).
    pub async fn new_page(&self, context: Option<&BrowserContext>) -> Result<Page> {
        let page = match context {
            Some(ctx) => ctx
                .new_page("about:blank")
                .await
                .map_err(|e| BrokerError::ProtocolError(e.to_string()))?,
            None => self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrokerError::ProtocolError(e.to_string()))?,
        };
        Ok(page)
    }

    /// Create a fresh isolated browser context (used by the browser pool for
    /// per-origin isolation).
    pub async fn create_browser_context(&self) -> Result<BrowserContext> {
        self.browser
            .create_browser_context()
            .await
            .map_err(|e| BrokerError::ProtocolError(e.to_string()))
    }

    pub async fn close_page(&self, page: &Page) -> Result<()> {
        page.close()
            .await
            .map_err(|e| BrokerError::ProtocolError(e.to_string()))?;
        Ok(())
    }

    /// Every currently open page target's live `Page` handle.
    pub async fn pages(&self) -> Result<Vec<Page>> {
        self.browser
            .pages()
            .await
            .map_err(|e| BrokerError::ProtocolError(e.to_string()))
    }

    pub async fn list_page_targets(&self) -> Result<Vec<TargetInfo>> {
        let pages = self.pages().await?;
        let mut targets = Vec::with_capacity(pages.len());
        for page in pages {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            targets.push(TargetInfo {
                target_id: page.target_id().inner().to_string(),
                url,
                title: String::new(),
            });
        }
        Ok(targets)
    }

    /// Raw CDP command passthrough, used by the `cdp/execute` tool boundary.
    pub async fn send_command(
        &self,
        page: &Page,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let cmd = chromiumoxide_types::MethodCall {
            method: method.to_string().into(),
            params: chromiumoxide_types::CallArgs::from_value(params)
                .map_err(|e| BrokerError::ProtocolError(e.to_string()))?,
            ..Default::default()
        };
        page.execute(cmd)
            .await
            .map(|resp| resp.result)
            .map_err(|e| BrokerError::ProtocolError(e.to_string()))
    }

    pub async fn is_connected(&self) -> bool {
        self.browser.version().await.is_ok()
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.handler.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

async fn discover_ws_url(debug_port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{debug_port}/json/version");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| BrokerError::DriverDisconnected(e.to_string()))?;

    let info: VersionInfo = client
        .get(&url)
        .send()
        .await
        .map_err(|e| BrokerError::DriverDisconnected(format!("probing {url}: {e}")))?
        .json()
        .await
        .map_err(|e| BrokerError::DriverDisconnected(format!("parsing {url} response: {e}")))?;

    Ok(info.web_socket_debugger_url)
}
