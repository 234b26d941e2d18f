//! Storage-state session-id whitelist (spec.md §4.11): session ids must be
//! `[A-Za-z0-9_-]+` before they're ever joined into a filesystem path, so a
//! malicious session id can't escape the storage-state directory.

use browser_broker::{DomainGuard, StorageStateManager};
use std::path::PathBuf;
use std::sync::Arc;

#[test]
fn rejects_path_traversal_attempts() {
    let manager = StorageStateManager::new(
        PathBuf::from("/tmp/browser-broker-storage-state-test"),
        Arc::new(DomainGuard::default()),
    );
    for bad in ["../escape", "a/b", "..", "has space", ""] {
        assert!(manager.path_for(bad).is_err(), "expected {bad:?} to be rejected");
    }
}

#[test]
fn accepts_whitelisted_session_ids_and_scopes_them_to_dir() {
    let dir = PathBuf::from("/tmp/browser-broker-storage-state-test");
    let manager = StorageStateManager::new(dir.clone(), Arc::new(DomainGuard::default()));
    let path = manager.path_for("abc-123_DEF").expect("valid session id");
    assert_eq!(path, dir.join("abc-123_DEF.json"));
}
