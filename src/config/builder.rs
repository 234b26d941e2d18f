//! Builder for [`BrokerConfig`] with environment-variable overrides and
//! validation, mirroring the teacher's `CrawlConfigBuilder` shape without
//! the typestate machinery (every field here already has a sane default,
//! so there is no "must call before build" requirement to enforce).

use std::path::PathBuf;
use std::time::Duration;

use super::types::{BrokerConfig, CircuitBreakerConfig, StorageStateConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnvValue { var: &'static str, value: String },
}

/// Builder for [`BrokerConfig`].
///
/// `BrokerConfigBuilder::from_env().build()` seeds every field from its
/// environment variable if present, falling back to the struct default.
#[derive(Debug, Clone, Default)]
pub struct BrokerConfigBuilder {
    config: BrokerConfig,
}

impl BrokerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BrokerConfig::default(),
        }
    }

    /// Seed from environment variables, leaving unset ones at their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut b = Self::new();

        if let Some(v) = env_u16("BROKER_DEBUG_PORT")? {
            b.config.debug_port = v;
        }
        if let Some(v) = env_u16("BROKER_LIGHT_BACKEND_PORT")? {
            b.config.light_backend_port = v;
        }
        if let Some(v) = env_secs("BROKER_SESSION_TTL_SECS")? {
            b.config.session_ttl = v;
        }
        if let Some(v) = env_secs("BROKER_CLEANUP_INTERVAL_SECS")? {
            b.config.cleanup_interval = v;
        }
        if let Some(v) = env_bool("BROKER_AUTO_CLEANUP")? {
            b.config.auto_cleanup = v;
        }
        if let Some(v) = env_usize("BROKER_MAX_SESSIONS")? {
            b.config.max_sessions = v;
        }
        if let Some(v) = env_usize("BROKER_MAX_WORKERS_PER_SESSION")? {
            b.config.max_workers_per_session = v;
        }
        if let Some(v) = env_bool("BROKER_USE_CONNECTION_POOL")? {
            b.config.use_connection_pool = v;
        }
        if let Some(v) = env_bool("BROKER_USE_DEFAULT_BROWSER_CONTEXT")? {
            b.config.use_default_browser_context = v;
        }
        if let Some(v) = env_bool("BROKER_USE_BROWSER_POOL")? {
            b.config.use_browser_pool = v;
        }
        if let Some(v) = env_bool("BROKER_STORAGE_STATE_ENABLED")? {
            b.config.storage_state.enabled = v;
        }
        if let Ok(v) = std::env::var("BROKER_STORAGE_STATE_DIR") {
            b.config.storage_state.dir = PathBuf::from(v);
        }
        if let Some(v) = env_millis("BROKER_STORAGE_STATE_WATCHDOG_MS")? {
            b.config.storage_state.watchdog_interval = v;
        }
        if let Some(v) = env_u32("BROKER_CIRCUIT_MAX_FAILURES")? {
            b.config.circuit_breaker.max_failures = v;
        }
        if let Some(v) = env_millis("BROKER_CIRCUIT_COOLDOWN_MS")? {
            b.config.circuit_breaker.cooldown = v;
        }
        if let Some(v) = env_secs("BROKER_COOKIE_SYNC_INTERVAL_SECS")? {
            b.config.cookie_sync_interval = v;
        }
        if let Some(v) = env_secs("BROKER_IPC_REQUEST_TIMEOUT_SECS")? {
            b.config.ipc_request_timeout = v;
        }
        if let Some(v) = env_secs("BROKER_IPC_CONNECT_TIMEOUT_SECS")? {
            b.config.ipc_connect_timeout = v;
        }
        if let Some(v) = env_u32("BROKER_RECONNECT_ATTEMPTS")? {
            b.config.reconnect_attempts = v;
        }
        if let Some(v) = env_millis("BROKER_RECONNECT_DELAY_MS")? {
            b.config.reconnect_delay = v;
        }
        if let Ok(v) = std::env::var("BROKER_IPC_SOCKET_PATH") {
            b.config.ipc_socket_path = PathBuf::from(v);
        }

        Ok(b)
    }

    #[must_use]
    pub fn debug_port(mut self, port: u16) -> Self {
        self.config.debug_port = port;
        self
    }

    #[must_use]
    pub fn light_backend_port(mut self, port: u16) -> Self {
        self.config.light_backend_port = port;
        self
    }

    #[must_use]
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.max_sessions = max;
        self
    }

    #[must_use]
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn storage_state(mut self, cfg: StorageStateConfig) -> Self {
        self.config.storage_state = cfg;
        self
    }

    #[must_use]
    pub fn circuit_breaker(mut self, cfg: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = cfg;
        self
    }

    #[must_use]
    pub fn ipc_socket_path(mut self, path: PathBuf) -> Self {
        self.config.ipc_socket_path = path;
        self
    }

    #[must_use]
    pub fn storage_state_enabled(mut self, enabled: bool) -> Self {
        self.config.storage_state.enabled = enabled;
        self
    }

    pub fn build(self) -> Result<BrokerConfig, ConfigError> {
        if self.config.max_sessions == 0 {
            return Err(ConfigError::MustBePositive {
                field: "max_sessions",
            });
        }
        if self.config.max_workers_per_session == 0 {
            return Err(ConfigError::MustBePositive {
                field: "max_workers_per_session",
            });
        }
        if self.config.circuit_breaker.max_failures == 0 {
            return Err(ConfigError::MustBePositive {
                field: "circuit_breaker.max_failures",
            });
        }
        Ok(self.config)
    }
}

fn env_u16(var: &'static str) -> Result<Option<u16>, ConfigError> {
    env_parse(var)
}

fn env_u32(var: &'static str) -> Result<Option<u32>, ConfigError> {
    env_parse(var)
}

fn env_usize(var: &'static str) -> Result<Option<usize>, ConfigError> {
    env_parse(var)
}

fn env_parse<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvValue { var, value }),
        Err(_) => Ok(None),
    }
}

fn env_bool(var: &'static str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => match value.as_str() {
            "1" | "true" | "TRUE" | "yes" => Ok(Some(true)),
            "0" | "false" | "FALSE" | "no" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnvValue { var, value }),
        },
        Err(_) => Ok(None),
    }
}

fn env_secs(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_parse::<u64>(var)?.map(Duration::from_secs))
}

fn env_millis(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_parse::<u64>(var)?.map(Duration::from_millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_cleanly() {
        let config = BrokerConfigBuilder::new().build().expect("defaults are valid");
        assert_eq!(config.debug_port(), 9222);
        assert_eq!(config.max_sessions(), 100);
    }

    #[test]
    fn rejects_zero_max_sessions() {
        let err = BrokerConfigBuilder::new()
            .max_sessions(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MustBePositive { field: "max_sessions" }));
    }

    #[test]
    fn fluent_overrides_apply() {
        let config = BrokerConfigBuilder::new()
            .debug_port(9333)
            .max_sessions(5)
            .build()
            .expect("valid config");
        assert_eq!(config.debug_port(), 9333);
        assert_eq!(config.max_sessions(), 5);
    }
}
