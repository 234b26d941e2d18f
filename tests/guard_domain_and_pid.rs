//! Domain guard and PID registry (spec.md §4.12, C12).

use browser_broker::{DomainGuard, PidRegistry};

#[tokio::test]
async fn domain_guard_blocks_and_unblocks() {
    let guard = DomainGuard::default();
    assert!(guard.check("evil.example", "navigate").await.is_ok());

    guard.block("evil.example").await;
    let err = guard.check("evil.example", "navigate").await.unwrap_err();
    assert!(err.to_string().contains("evil.example"));

    guard.unblock("evil.example").await;
    assert!(guard.check("evil.example", "navigate").await.is_ok());
}

#[test]
fn pid_registry_claims_and_releases_a_port() {
    let registry = PidRegistry::new();
    let port = 48_271; // unlikely to collide with a real debug port in CI

    registry.release(port); // clean slate in case a prior run left a stale file
    registry.claim(port).expect("first claim succeeds");
    registry.release(port);

    // After release, the port can be claimed again immediately.
    registry.claim(port).expect("re-claim after release succeeds");
    registry.release(port);
}
