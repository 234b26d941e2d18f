//! Shared snapshot types returned by `SessionRegistry::stats` and
//! `HybridRouter::stats`.

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RegistryStats {
    pub sessions: usize,
    pub workers: usize,
    pub targets: usize,
    /// Seconds since this registry was created.
    pub uptime_secs: u64,
    /// Seconds since the last TTL-eviction sweep ran, or `None` if the
    /// reaper hasn't run one yet.
    pub last_cleanup_secs_ago: Option<u64>,
    /// Process resident memory in bytes, via `sysinfo`; `None` if the
    /// current PID can't be resolved or its process info can't be read.
    pub memory_bytes: Option<u64>,
}

/// Rule-3/rule-6 counters for the hybrid router (spec §4.4/§8 scenario 3).
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RouterStats {
    /// Incremented every time a route decision is refused outright because
    /// the circuit for that tool path is already open (rule 3).
    pub circuit_trips: u64,
    /// Incremented every time routing falls back to heavy because the light
    /// page was missing or closed (rule 6).
    pub fallbacks: u64,
}
