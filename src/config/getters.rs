//! Accessor methods for [`BrokerConfig`] and its nested configs.

use std::path::Path;
use std::time::Duration;

use super::types::{BrokerConfig, CircuitBreakerConfig, StorageStateConfig};

impl BrokerConfig {
    #[must_use]
    pub fn debug_port(&self) -> u16 {
        self.debug_port
    }

    #[must_use]
    pub fn light_backend_port(&self) -> u16 {
        self.light_backend_port
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    #[must_use]
    pub fn auto_cleanup(&self) -> bool {
        self.auto_cleanup
    }

    #[must_use]
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    #[must_use]
    pub fn max_workers_per_session(&self) -> usize {
        self.max_workers_per_session
    }

    #[must_use]
    pub fn use_connection_pool(&self) -> bool {
        self.use_connection_pool
    }

    #[must_use]
    pub fn use_default_browser_context(&self) -> bool {
        self.use_default_browser_context
    }

    #[must_use]
    pub fn use_browser_pool(&self) -> bool {
        self.use_browser_pool
    }

    #[must_use]
    pub fn storage_state(&self) -> &StorageStateConfig {
        &self.storage_state
    }

    #[must_use]
    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        self.circuit_breaker
    }

    #[must_use]
    pub fn cookie_sync_interval(&self) -> Duration {
        self.cookie_sync_interval
    }

    #[must_use]
    pub fn ipc_request_timeout(&self) -> Duration {
        self.ipc_request_timeout
    }

    #[must_use]
    pub fn ipc_connect_timeout(&self) -> Duration {
        self.ipc_connect_timeout
    }

    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    #[must_use]
    pub fn ipc_socket_path(&self) -> &Path {
        &self.ipc_socket_path
    }
}

impl StorageStateConfig {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn watchdog_interval(&self) -> Duration {
        self.watchdog_interval
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
