//! Boundary behaviors for the reference-ID manager (spec.md §8):
//! `resolve_to_node_id` returns undefined (here: `Err`) for `"0"`, `"-1"`,
//! `"3.5"`, `""`, `"node_"`, and any integer past `i32::MAX`; a bare decimal
//! and a `node_N` token resolve to a raw node id without registration; a
//! `ref_N` token round-trips within its `(session, target)` partition until
//! that partition is cleared.

use browser_broker::RefManager;

const S: &str = "s1";
const T: &str = "t1";

#[test]
fn rejects_every_spec_boundary_token() {
    let refs = RefManager::new();
    for bad in ["0", "-1", "3.5", "", "node_", "ref_2147483648"] {
        assert!(refs.resolve_to_node_id(S, T, bad).is_err(), "expected {bad:?} to be rejected");
    }
}

#[test]
fn accepts_max_i32_boundary() {
    let refs = RefManager::new();
    // Not a token this manager minted, but a syntactically valid one at the
    // i32::MAX boundary — resolution fails for "unknown reference", not for
    // being out of range.
    let err = refs.resolve_to_node_id(S, T, "ref_2147483647").unwrap_err();
    assert!(err.to_string().contains("unknown reference"));
}

#[test]
fn bare_decimal_and_node_prefixed_tokens_resolve_without_registration() {
    let refs = RefManager::new();
    assert_eq!(refs.resolve_to_node_id(S, T, "42").unwrap(), "42");
    assert_eq!(refs.resolve_to_node_id(S, T, "2147483647").unwrap(), "2147483647");
    assert_eq!(refs.resolve_to_node_id(S, T, "node_5").unwrap(), "5");
}

#[test]
fn registered_token_resolves_until_its_target_is_cleared() {
    let refs = RefManager::new();
    let token = refs.register(S, T, "dom-node-42");
    assert_eq!(refs.resolve_to_node_id(S, T, &token).unwrap(), "dom-node-42");

    refs.clear_target(S, T);
    assert!(refs.resolve_to_node_id(S, T, &token).is_err());
}
