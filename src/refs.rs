//! Reference-ID manager (C11): generates `ref_N` tokens for CDP node/remote
//! object ids handed back to tool callers, and resolves tokens back per the
//! three rules of spec.md §4.10:
//!   1. `ref_N` — looks up a previously registered id within the calling
//!      `(session_id, target_id)` partition.
//!   2. a bare decimal integer in `(0, 2³¹−1]` — resolves to itself as a raw
//!      node id, no registration required.
//!   3. `node_N` — resolves to `N` as a raw node id, same range.
//! All three share the exact §8 boundary cases: `"0"`, `"-1"`, `"3.5"`,
//! `""`, a bare `"node_"`/`"ref_"` prefix, and integers above `i32::MAX` are
//! all rejected.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::{BrokerError, Result};
use crate::session::{SessionId, TargetId};

const REF_PREFIX: &str = "ref_";
const NODE_PREFIX: &str = "node_";

/// The registered `ref_N → node id` table for one `(session_id, target_id)`
/// partition, with its own counter so token numbering doesn't leak across
/// targets or sessions.
struct TargetRefs {
    next: AtomicU64,
    table: DashMap<u64, String>,
}

impl TargetRefs {
    fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            table: DashMap::new(),
        }
    }
}

/// Keyed `(session_id, target_id)` per spec §3's `RefEntry` model — clearing
/// a target (or a whole session) also resets that partition's counter, since
/// dropping the `TargetRefs` entry and re-inserting a fresh one on next
/// `register` starts the counter back at 1.
pub struct RefManager {
    partitions: DashMap<(SessionId, TargetId), TargetRefs>,
}

impl RefManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            partitions: DashMap::new(),
        }
    }

    /// Mint a new `ref_N` token for `node_id` (an opaque CDP node or remote
    /// object id) scoped to `(session_id, target_id)`.
    pub fn register(&self, session_id: &str, target_id: &str, node_id: impl Into<String>) -> String {
        let key = (session_id.to_string(), target_id.to_string());
        let partition = self.partitions.entry(key).or_insert_with(TargetRefs::new);
        let n = partition.next.fetch_add(1, Ordering::Relaxed);
        partition.table.insert(n, node_id.into());
        format!("{REF_PREFIX}{n}")
    }

    /// Resolve `token` to a raw node id, applying rules 1–3 of spec §4.10 in
    /// order. Rules 2 and 3 never touch `partitions` — they're pure syntax.
    pub fn resolve_to_node_id(&self, session_id: &str, target_id: &str, token: &str) -> Result<String> {
        if let Some(digits) = token.strip_prefix(REF_PREFIX) {
            let n = parse_bounded_decimal(token, digits)?;
            let key = (session_id.to_string(), target_id.to_string());
            return self
                .partitions
                .get(&key)
                .and_then(|p| p.table.get(&n).map(|v| v.clone()))
                .ok_or_else(|| BrokerError::ProtocolError(format!("unknown reference {token:?}")));
        }
        if let Some(digits) = token.strip_prefix(NODE_PREFIX) {
            let n = parse_bounded_decimal(token, digits)?;
            return Ok(n.to_string());
        }
        let n = parse_bounded_decimal(token, token)?;
        Ok(n.to_string())
    }

    /// Drop a target's whole ref partition (and, implicitly, its counter).
    pub fn clear_target(&self, session_id: &str, target_id: &str) {
        self.partitions.remove(&(session_id.to_string(), target_id.to_string()));
    }

    /// Drop every partition belonging to a session, e.g. on session deletion.
    pub fn clear_session(&self, session_id: &str) {
        self.partitions.retain(|(sid, _), _| sid != session_id);
    }
}

impl Default for RefManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared boundary validation for all three resolution rules: `digits` must
/// be non-empty, all-ASCII-digit, and parse to a value in `1..=i32::MAX`.
/// `whole` is only used for error messages, so callers can report the
/// original token rather than the stripped suffix.
fn parse_bounded_decimal(whole: &str, digits: &str) -> Result<u64> {
    if digits.is_empty() {
        return Err(BrokerError::ProtocolError(format!("empty reference index in {whole:?}")));
    }
    // Reject non-digit content up front so "3.5" and "-1" fail here rather
    // than at `parse`, which would otherwise accept a leading '+'.
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BrokerError::ProtocolError(format!("not a valid reference index: {whole:?}")));
    }
    let n: u64 = digits
        .parse()
        .map_err(|_| BrokerError::ProtocolError(format!("reference index overflow: {whole:?}")))?;
    if n == 0 || n > i32::MAX as u64 {
        return Err(BrokerError::ProtocolError(format!("reference index out of range: {whole:?}")));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_registered_token_within_its_partition() {
        let refs = RefManager::new();
        let token = refs.register("s1", "t1", "node-123");
        assert_eq!(refs.resolve_to_node_id("s1", "t1", &token).unwrap(), "node-123");
    }

    #[test]
    fn a_token_registered_for_one_target_is_unknown_in_another() {
        let refs = RefManager::new();
        let token = refs.register("s1", "t1", "node-123");
        assert!(refs.resolve_to_node_id("s1", "t2", &token).is_err());
        assert!(refs.resolve_to_node_id("s2", "t1", &token).is_err());
    }

    #[test]
    fn bare_decimal_resolves_to_itself() {
        let refs = RefManager::new();
        assert_eq!(refs.resolve_to_node_id("s1", "t1", "42").unwrap(), "42");
    }

    #[test]
    fn node_prefixed_token_resolves_to_its_suffix() {
        let refs = RefManager::new();
        assert_eq!(refs.resolve_to_node_id("s1", "t1", "node_5").unwrap(), "5");
    }

    #[test]
    fn rejects_zero() {
        let refs = RefManager::new();
        assert!(refs.resolve_to_node_id("s1", "t1", "ref_0").is_err());
        assert!(refs.resolve_to_node_id("s1", "t1", "0").is_err());
        assert!(refs.resolve_to_node_id("s1", "t1", "node_0").is_err());
    }

    #[test]
    fn rejects_negative() {
        let refs = RefManager::new();
        assert!(refs.resolve_to_node_id("s1", "t1", "-1").is_err());
    }

    #[test]
    fn rejects_fractional() {
        let refs = RefManager::new();
        assert!(refs.resolve_to_node_id("s1", "t1", "3.5").is_err());
    }

    #[test]
    fn rejects_empty_and_bare_prefixes() {
        let refs = RefManager::new();
        assert!(refs.resolve_to_node_id("s1", "t1", "").is_err());
        assert!(refs.resolve_to_node_id("s1", "t1", "ref_").is_err());
        assert!(refs.resolve_to_node_id("s1", "t1", "node_").is_err());
    }

    #[test]
    fn rejects_overflow_past_i32_max() {
        let refs = RefManager::new();
        assert!(refs.resolve_to_node_id("s1", "t1", "ref_2147483648").is_err());
        assert!(refs.resolve_to_node_id("s1", "t1", "2147483648").is_err());
        assert!(refs.resolve_to_node_id("s1", "t1", "node_2147483648").is_err());
    }

    #[test]
    fn clearing_a_target_resets_its_counter_and_forgets_its_tokens() {
        let refs = RefManager::new();
        let token = refs.register("s1", "t1", "node-a");
        assert_eq!(token, "ref_1");

        refs.clear_target("s1", "t1");
        assert!(refs.resolve_to_node_id("s1", "t1", &token).is_err());

        let reused = refs.register("s1", "t1", "node-b");
        assert_eq!(reused, "ref_1");
    }

    #[test]
    fn clearing_a_session_drops_every_target_under_it() {
        let refs = RefManager::new();
        let t1 = refs.register("s1", "t1", "node-a");
        let t2 = refs.register("s1", "t2", "node-b");
        let other = refs.register("s2", "t1", "node-c");

        refs.clear_session("s1");

        assert!(refs.resolve_to_node_id("s1", "t1", &t1).is_err());
        assert!(refs.resolve_to_node_id("s1", "t2", &t2).is_err());
        assert_eq!(refs.resolve_to_node_id("s2", "t1", &other).unwrap(), "node-c");
    }
}
