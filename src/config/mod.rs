//! Configuration for the broker: ports, timeouts, pool sizes, and the
//! optional storage-state / circuit-breaker / cookie-sync knobs.
//!
//! Split the way the teacher's crawl config is split: [`types`] holds the
//! struct, [`builder`] provides a validating builder seeded from
//! environment variables, [`getters`] provides the accessor methods.

pub mod builder;
pub mod getters;
pub mod types;

pub use builder::{BrokerConfigBuilder, ConfigError};
pub use types::{BrokerConfig, CircuitBreakerConfig, StorageStateConfig};
