//! Core configuration types for the broker.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level broker configuration (spec §6, "Environment & configuration").
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub(crate) debug_port: u16,
    pub(crate) light_backend_port: u16,

    pub(crate) session_ttl: Duration,
    pub(crate) cleanup_interval: Duration,
    pub(crate) auto_cleanup: bool,

    pub(crate) max_sessions: usize,
    pub(crate) max_workers_per_session: usize,

    pub(crate) use_connection_pool: bool,
    pub(crate) use_default_browser_context: bool,
    pub(crate) use_browser_pool: bool,

    pub(crate) storage_state: StorageStateConfig,
    pub(crate) circuit_breaker: CircuitBreakerConfig,

    pub(crate) cookie_sync_interval: Duration,

    pub(crate) ipc_request_timeout: Duration,
    pub(crate) ipc_connect_timeout: Duration,
    pub(crate) reconnect_attempts: u32,
    pub(crate) reconnect_delay: Duration,

    pub(crate) ipc_socket_path: PathBuf,
}

/// Per-session storage-state persistence (cookies + localStorage).
#[derive(Debug, Clone)]
pub struct StorageStateConfig {
    pub(crate) enabled: bool,
    pub(crate) dir: PathBuf,
    pub(crate) watchdog_interval: Duration,
}

/// Hybrid router circuit breaker thresholds.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub(crate) max_failures: u32,
    pub(crate) cooldown: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            debug_port: 9222,
            light_backend_port: 9223,
            session_ttl: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(60),
            auto_cleanup: true,
            max_sessions: 100,
            max_workers_per_session: 50,
            use_connection_pool: true,
            use_default_browser_context: true,
            use_browser_pool: false,
            storage_state: StorageStateConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cookie_sync_interval: Duration::from_secs(5),
            ipc_request_timeout: Duration::from_secs(30),
            ipc_connect_timeout: Duration::from_secs(5),
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(500),
            ipc_socket_path: default_socket_path(),
        }
    }
}

impl Default for StorageStateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("browser-broker")
                .join("storage-state"),
            watchdog_interval: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub fn new(max_failures: u32, cooldown: Duration) -> Self {
        Self {
            max_failures,
            cooldown,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            cooldown: Duration::from_millis(30_000),
        }
    }
}

fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join("browser-broker.sock")
}
