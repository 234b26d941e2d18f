//! End-to-end router scenarios against a real attached browser (spec.md
//! §8, scenario 4: escalation). Ignored by default — see
//! `browser_scenarios.rs` for the shared rationale.

use std::sync::Arc;

use browser_broker::config::BrokerConfigBuilder;
use browser_broker::router::Backend;
use browser_broker::{DomainGuard, Driver, HybridRouter};

fn test_debug_port() -> u16 {
    std::env::var("BROWSER_BROKER_TEST_DEBUG_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(9222)
}

#[tokio::test]
#[ignore] // Requires a running Chrome with --remote-debugging-port
async fn escalation_syncs_cookies_and_navigates_the_heavy_page() {
    let driver = Driver::connect(test_debug_port()).await.expect("attach to test browser");
    let light = driver.new_page(None).await.unwrap();
    let heavy = driver.new_page(None).await.unwrap();

    light.goto("https://example.com").await.unwrap();

    let config = BrokerConfigBuilder::new().build().unwrap();
    let router = HybridRouter::new(&config, Arc::new(DomainGuard::default()));

    let result = router.escalate(&light, &heavy).await.unwrap();

    assert_eq!(result.previous, Backend::Light);
    assert_eq!(result.new, Backend::Heavy);
    assert_eq!(result.url, "https://example.com/");

    driver.close_page(&light).await.unwrap();
    driver.close_page(&heavy).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a running Chrome with --remote-debugging-port
async fn route_follows_the_light_pages_own_open_closed_state() {
    let driver = Driver::connect(test_debug_port()).await.expect("attach to test browser");
    let light = driver.new_page(None).await.unwrap();

    let config = BrokerConfigBuilder::new().build().unwrap();
    let router = HybridRouter::new(&config, Arc::new(DomainGuard::default()));

    let decision = router.route("navigate", Some(&light)).await;
    assert_eq!(decision.backend, Backend::Light);
    assert!(!decision.fallback_to_heavy_on_failure);

    driver.close_page(&light).await.unwrap();

    let decision = router.route("navigate", Some(&light)).await;
    assert_eq!(decision.backend, Backend::Heavy);
    assert!(decision.fallback_to_heavy_on_failure);
    assert_eq!(router.stats().fallbacks, 1);
}
