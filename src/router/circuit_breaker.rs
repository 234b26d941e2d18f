//! Two-state circuit breaker, a restricted `Closed ⇄ Open` projection of the
//! teacher's three-state `Closed/HalfOpen/Open` `CircuitBreaker`
//! (`crawl_engine::circuit_breaker`). The spec's hybrid router only ever
//! asks "is the circuit open for this tool call path", so the half-open
//! probation state and its separate success threshold are dropped; cooldown
//! expiry closes the circuit directly instead of routing through a
//! half-open trial (documented as an explicit restriction in DESIGN.md).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

#[derive(Debug, Clone)]
struct PathHealth {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    state: CircuitState,
}

impl PathHealth {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            opened_at: None,
            state: CircuitState::Closed,
        }
    }
}

pub struct CircuitBreaker {
    paths: DashMap<String, PathHealth>,
    max_failures: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(max_failures: u32, cooldown: Duration) -> Self {
        Self {
            paths: DashMap::new(),
            max_failures,
            cooldown,
        }
    }

    /// `true` if the circuit for `path` is closed (requests should proceed).
    pub fn should_attempt(&self, path: &str) -> bool {
        let mut health = self.paths.entry(path.to_string()).or_insert_with(PathHealth::new);
        match health.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let expired = health
                    .opened_at
                    .is_some_and(|opened| opened.elapsed() >= self.cooldown);
                if expired {
                    info!(path, "circuit breaker cooldown expired, closing");
                    health.state = CircuitState::Closed;
                    health.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, path: &str) {
        if let Some(mut health) = self.paths.get_mut(path) {
            health.consecutive_failures = 0;
            health.state = CircuitState::Closed;
        }
    }

    pub fn record_failure(&self, path: &str) {
        let mut health = self.paths.entry(path.to_string()).or_insert_with(PathHealth::new);
        health.consecutive_failures += 1;
        if health.consecutive_failures >= self.max_failures && health.state != CircuitState::Open {
            health.state = CircuitState::Open;
            health.opened_at = Some(Instant::now());
            warn!(path, failures = health.consecutive_failures, "circuit breaker open");
        }
    }

    #[must_use]
    pub fn is_open(&self, path: &str) -> bool {
        self.paths
            .get(path)
            .is_some_and(|h| h.state == CircuitState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(2, Duration::from_secs(60));
        assert!(cb.should_attempt("tool:foo"));
        cb.record_failure("tool:foo");
        assert!(cb.should_attempt("tool:foo"));
        cb.record_failure("tool:foo");
        assert!(!cb.should_attempt("tool:foo"));
        assert!(cb.is_open("tool:foo"));
    }

    #[test]
    fn closes_after_cooldown() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(20));
        cb.record_failure("tool:bar");
        assert!(!cb.should_attempt("tool:bar"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.should_attempt("tool:bar"));
        assert!(!cb.is_open("tool:bar"));
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));
        cb.record_failure("tool:baz");
        cb.record_failure("tool:baz");
        cb.record_success("tool:baz");
        cb.record_failure("tool:baz");
        assert!(cb.should_attempt("tool:baz"));
    }
}
