//! End-to-end scenarios against a real attached browser (spec.md §8,
//! scenarios 1, 2, 5, 6). Ignored by default since they need a Chrome
//! instance reachable at `BROWSER_BROKER_TEST_DEBUG_PORT` (default 9222)
//! with `--remote-debugging-port` enabled, matching the teacher's
//! `#[ignore] // Requires browser installation` convention.

use std::sync::Arc;
use std::time::Duration;

use browser_broker::config::BrokerConfigBuilder;
use browser_broker::{Driver, PagePool, SessionRegistry};

fn test_debug_port() -> u16 {
    std::env::var("BROWSER_BROKER_TEST_DEBUG_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(9222)
}

async fn test_registry() -> Arc<SessionRegistry> {
    let driver = Driver::connect(test_debug_port()).await.expect("attach to test browser");
    let page_pool = PagePool::new(Arc::clone(&driver), 10);
    let config = BrokerConfigBuilder::new().max_sessions(10).build().expect("valid config");
    SessionRegistry::new(config, driver, page_pool)
}

#[tokio::test]
#[ignore] // Requires a running Chrome with --remote-debugging-port
async fn parallel_isolation() {
    let registry = test_registry().await;

    let s1 = registry.create_session().await.unwrap();
    let s2 = registry.create_session().await.unwrap();
    let t1 = registry.create_target(&s1, "default").await.unwrap();
    let t2 = registry.create_target(&s2, "default").await.unwrap();

    assert!(registry.get_page(&s1, "default", &t2).await.is_err());
    assert!(registry.get_page(&s2, "default", &t2).await.is_ok());

    registry.delete_session(&s1).await.unwrap();
    assert!(registry.get_page(&s2, "default", &t2).await.is_ok());
    assert!(registry.get_page(&s1, "default", &t1).await.is_err());
}

#[tokio::test]
#[ignore] // Requires a running Chrome with --remote-debugging-port
async fn ttl_eviction() {
    let driver = Driver::connect(test_debug_port()).await.expect("attach to test browser");
    let page_pool = PagePool::new(Arc::clone(&driver), 10);
    let config = BrokerConfigBuilder::new()
        .max_sessions(10)
        .session_ttl(Duration::from_secs(1))
        .build()
        .expect("valid config");
    let registry = SessionRegistry::new(config, driver, page_pool);

    let s = registry.create_session().await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let evicted = registry.cleanup_inactive().await;
    assert_eq!(evicted, vec![s.clone()]);
    assert!(registry.touch(&s).await.is_err());
}

#[tokio::test]
#[ignore] // Requires a running Chrome with --remote-debugging-port
async fn worker_disconnect_releases_its_targets() {
    let registry = test_registry().await;

    let s1 = registry.get_or_create_session("worker-disconnect-s1").await.unwrap();
    let w = registry.create_worker(&s1).await.unwrap();
    let t_a = registry.create_target(&s1, &w).await.unwrap();
    let t_b = registry.create_target(&s1, &w).await.unwrap();

    // Simulates the IPC server's disconnect handler invoking cleanup for
    // the worker's owning session (spec §8 scenario 5).
    registry.delete_session(&s1).await.unwrap();

    assert!(registry.get_page(&s1, &w, &t_a).await.is_err());
    assert!(registry.get_page(&s1, &w, &t_b).await.is_err());
}

#[tokio::test]
#[ignore] // Requires a running Chrome with --remote-debugging-port
async fn stats_reports_uptime_and_live_counts() {
    let registry = test_registry().await;
    let s = registry.create_session().await.unwrap();
    let _t = registry.create_target(&s, "default").await.unwrap();

    let stats = registry.stats().await;
    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.targets, 1);
    assert!(stats.memory_bytes.is_some());

    registry.cleanup_inactive().await;
    let stats = registry.stats().await;
    assert!(stats.last_cleanup_secs_ago.is_some());
}

#[tokio::test]
#[ignore] // Requires a running Chrome with --remote-debugging-port
async fn create_target_reaps_untracked_blank_targets_left_behind_by_chrome() {
    // `create_target` snapshots existing page targets before asking the
    // driver for a new one; any `about:blank` target that shows up 500ms
    // later and was neither in that snapshot nor registered in the owner
    // map gets closed (spec §4.1/§8 scenario 6). We can't easily force
    // Chrome to spawn one here, so this checks the non-destructive half: a
    // normal `create_target` call doesn't touch the target it itself just
    // registered.
    let registry = test_registry().await;
    let s = registry.create_session().await.unwrap();
    let t = registry.create_target(&s, "default").await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(registry.get_page(&s, "default", &t).await.is_ok());
}

#[tokio::test]
#[ignore] // Requires a running Chrome with --remote-debugging-port
async fn sweep_orphans_is_a_no_op_after_clean_teardown() {
    // `sweep_orphans` only has work to do when a target's owner-map entry
    // outlives its session/worker (a crash that skipped normal teardown);
    // driving that path end-to-end needs a fault-injecting driver, which
    // the attach-only `Driver` has no seam for. This checks the cheaper
    // half of the invariant: a clean `delete_session` leaves nothing for
    // the reaper to find.
    let registry = test_registry().await;
    let s = registry.create_session().await.unwrap();
    let _t = registry.create_target(&s, "default").await.unwrap();

    registry.delete_session(&s).await.unwrap();
    assert_eq!(registry.sweep_orphans().await, 0);
}
