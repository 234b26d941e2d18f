//! End-to-end circuit breaker scenario (spec.md §8, scenario 3): with
//! `max_failures=3, cooldown=50ms`, three consecutive failures open the
//! circuit; it stays open until the cooldown elapses, then closes.

use std::sync::Arc;
use std::time::Duration;

use browser_broker::config::{BrokerConfigBuilder, CircuitBreakerConfig};
use browser_broker::guard::DomainGuard;
use browser_broker::router::circuit_breaker::CircuitBreaker;
use browser_broker::router::Backend;
use browser_broker::HybridRouter;

#[test]
fn opens_on_third_failure_and_closes_after_cooldown() {
    let breaker = CircuitBreaker::new(3, Duration::from_millis(50));
    let path = "navigate";

    assert!(breaker.should_attempt(path));
    breaker.record_failure(path);
    assert!(breaker.should_attempt(path));
    breaker.record_failure(path);
    assert!(breaker.should_attempt(path));
    breaker.record_failure(path);

    // Circuit is now open: a fourth attempt is refused regardless of how
    // healthy the light backend looks.
    assert!(breaker.is_open(path));
    assert!(!breaker.should_attempt(path));

    std::thread::sleep(Duration::from_millis(60));

    assert!(breaker.should_attempt(path));
    assert!(!breaker.is_open(path));
}

#[test]
fn independent_paths_trip_independently() {
    let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
    breaker.record_failure("navigate");
    assert!(breaker.is_open("navigate"));
    assert!(!breaker.is_open("screenshot"));
    assert!(breaker.should_attempt("screenshot"));
}

/// Drives `HybridRouter::route` itself (not the breaker directly) with no
/// light page ever supplied, so every call hits rule 6 ("else heavy +
/// fallback, record failure") until the third failure trips the circuit
/// open at rule 3 — verifying `route` records failures and increments its
/// own `circuit_trips` counter, not just that `CircuitBreaker` can open.
#[tokio::test]
async fn route_opens_its_own_circuit_through_repeated_no_light_page_calls() {
    let config = BrokerConfigBuilder::new()
        .circuit_breaker(CircuitBreakerConfig::new(3, Duration::from_millis(50)))
        .build()
        .expect("valid config");
    let router = HybridRouter::new(&config, Arc::new(DomainGuard::default()));

    for _ in 0..3 {
        let decision = router.route("navigate", None).await;
        assert_eq!(decision.backend, Backend::Heavy);
        assert!(decision.fallback_to_heavy_on_failure);
    }

    let decision = router.route("navigate", None).await;
    assert_eq!(decision.backend, Backend::Heavy);
    assert!(!decision.fallback_to_heavy_on_failure, "circuit-open heavy route carries no fallback flag");
    assert_eq!(router.stats().circuit_trips, 1);
    assert_eq!(router.stats().fallbacks, 3);
}
