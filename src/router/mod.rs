//! Hybrid backend router (C6): decides, per tool call, whether to serve a
//! request from the "light" backend (a cheap pre-rendered page, e.g. a
//! lightweight rendering service) or escalate to the "heavy" backend (the
//! full debug-protocol-driven browser), keyed on whether the caller's own
//! light page handle is still open. Ordered decision rules and escalation
//! procedure exactly as spec.md §4.4–§4.5.

pub mod circuit_breaker;
pub mod cookie_sync;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chromiumoxide::page::Page;
use tracing::{debug, warn};

use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::guard::DomainGuard;
use crate::stats::RouterStats;

use circuit_breaker::CircuitBreaker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Light,
    Heavy,
}

/// Tools that only make sense against a rendered page (e.g. screenshot,
/// visual diff) always escalate to heavy, regardless of light-backend
/// health — rule 2 of spec.md §4.4.
const VISUAL_ONLY_TOOLS: &[&str] = &["screenshot", "visual_diff", "pdf"];

pub struct HybridRouter {
    circuit: CircuitBreaker,
    enabled: AtomicBool,
    domain_guard: Arc<DomainGuard>,
    circuit_trips: AtomicU64,
    fallbacks: AtomicU64,
}

pub struct RoutingDecision {
    pub backend: Backend,
    /// `true` if the caller should transparently fall back to heavy after a
    /// light-backend attempt fails (rule 6: "else heavy+fallback").
    pub fallback_to_heavy_on_failure: bool,
}

impl RoutingDecision {
    fn heavy(fallback_to_heavy_on_failure: bool) -> Self {
        Self {
            backend: Backend::Heavy,
            fallback_to_heavy_on_failure,
        }
    }
}

/// Result of [`HybridRouter::escalate`] (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct EscalationResult {
    pub success: bool,
    pub previous: Backend,
    pub new: Backend,
    pub cookies_synced: bool,
    pub url: String,
}

impl HybridRouter {
    #[must_use]
    pub fn new(config: &BrokerConfig, domain_guard: Arc<DomainGuard>) -> Self {
        Self {
            circuit: CircuitBreaker::new(
                config.circuit_breaker().max_failures(),
                config.circuit_breaker().cooldown(),
            ),
            enabled: AtomicBool::new(true),
            domain_guard,
            circuit_trips: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[must_use]
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            circuit_trips: self.circuit_trips.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Apply the ordered routing rules (spec.md §4.4):
    /// 1. router disabled → heavy
    /// 2. visual-only tool → heavy
    /// 3. circuit open for this tool → heavy (`circuit_trips` incremented)
    /// 4. no light page supplied → heavy, fallback flagged, failure recorded
    /// 5. light page open (`is_closed` false) → light, success recorded
    /// 6. light page closed → heavy, fallback flagged, failure recorded
    ///    (`fallbacks` incremented) — a closed light page records a failure
    ///    regardless of anything else about process health (SPEC_FULL §5
    ///    OQ#2).
    pub async fn route(&self, tool: &str, light_page: Option<&Page>) -> RoutingDecision {
        if !self.enabled.load(Ordering::Relaxed) {
            return RoutingDecision::heavy(false);
        }
        if VISUAL_ONLY_TOOLS.contains(&tool) {
            return RoutingDecision::heavy(false);
        }
        if self.circuit.is_open(tool) || !self.circuit.should_attempt(tool) {
            self.circuit_trips.fetch_add(1, Ordering::Relaxed);
            return RoutingDecision::heavy(false);
        }

        let light_open = match light_page {
            Some(page) => !page.is_closed().await.unwrap_or(true),
            None => false,
        };

        if light_open {
            self.circuit.record_success(tool);
            return RoutingDecision {
                backend: Backend::Light,
                fallback_to_heavy_on_failure: false,
            };
        }

        self.circuit.record_failure(tool);
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        RoutingDecision::heavy(true)
    }

    pub fn record_result(&self, tool: &str, succeeded: bool) {
        if succeeded {
            self.circuit.record_success(tool);
        } else {
            self.circuit.record_failure(tool);
        }
    }

    /// Escalation from light to heavy (spec.md §4.4):
    /// 1. read the light page's current URL,
    /// 2. reconcile cookies light → heavy,
    /// 3. best-effort navigate the heavy page there — a navigation failure
    ///    does not retroactively clear the synced-cookies bookkeeping
    ///    (Open Question #3, decided in SPEC_FULL.md §5).
    pub async fn escalate(&self, light_page: &Page, heavy_page: &Page) -> Result<EscalationResult> {
        let url = light_page
            .url()
            .await
            .map_err(|e| BrokerError::ProtocolError(e.to_string()))?
            .unwrap_or_default();

        let synced = cookie_sync::copy(light_page, heavy_page, None, &self.domain_guard)
            .await
            .unwrap_or(0);
        debug!(synced, url, "cookies synced before escalation navigation");

        let navigated = heavy_page.goto(&url).await.is_ok();
        if !navigated {
            warn!(url, "best-effort navigation after escalation failed");
        }

        Ok(EscalationResult {
            success: navigated,
            previous: Backend::Light,
            new: Backend::Heavy,
            cookies_synced: synced > 0,
            url,
        })
    }
}
