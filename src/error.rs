//! Stable error taxonomy for the broker core.
//!
//! Every fallible registry/router/IPC operation returns a [`BrokerError`]
//! variant rather than a string. The dispatcher (`dispatcher`) maps each
//! variant directly to the numeric wire code from the IPC protocol instead
//! of pattern-matching on message substrings.

use thiserror::Error;

/// Tagged error variants shared by the session registry, hybrid router,
/// IPC fabric, and storage-state manager.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("target {target_id} is owned by a different session or worker")]
    OwnershipViolation { target_id: String },

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("target {0} not found")]
    TargetNotFound(String),

    #[error("worker limit reached for session {session_id} (max {max})")]
    WorkerLimitReached { session_id: String, max: usize },

    #[error("session limit reached (max {max})")]
    SessionLimitReached { max: usize },

    #[error("the default worker of a session cannot be deleted")]
    CannotDeleteDefaultWorker,

    #[error("debug-protocol driver disconnected: {0}")]
    DriverDisconnected(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("not connected to broker")]
    NotConnected,

    #[error("invalid session id {0:?}")]
    InvalidSessionId(String),

    #[error("domain {domain} is blocked for {operation}")]
    DomainBlocked { domain: String, operation: String },

    /// The hybrid router's circuit is open for a tool. Never surfaced across
    /// the IPC boundary: the router catches this internally and routes to
    /// the heavy backend instead.
    #[error("circuit open")]
    CircuitOpen,

    #[error("page for target {0} is closed")]
    PageClosed(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Numeric wire codes, stable across broker versions (spec §6).
pub mod code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const SESSION_NOT_FOUND: i64 = -40001;
    pub const TARGET_NOT_FOUND: i64 = -40002;
    pub const OWNERSHIP_VIOLATION: i64 = -40003;
    pub const NOT_CONNECTED: i64 = -40004;
    pub const TIMEOUT: i64 = -40005;
}

impl BrokerError {
    /// Map a tagged error variant directly to its stable wire code.
    ///
    /// Variants with no dedicated code in the wire contract fall back to the
    /// closest JSON-RPC standard code rather than a fabricated domain code,
    /// so callers that only understand the ten codes in spec §6 still get a
    /// sensible bucket (see DESIGN.md for the full rationale).
    #[must_use]
    pub fn wire_code(&self) -> i64 {
        match self {
            Self::OwnershipViolation { .. } => code::OWNERSHIP_VIOLATION,
            Self::SessionNotFound(_) => code::SESSION_NOT_FOUND,
            Self::TargetNotFound(_) | Self::PageClosed(_) => code::TARGET_NOT_FOUND,
            Self::NotConnected => code::NOT_CONNECTED,
            Self::Timeout(_) => code::TIMEOUT,
            Self::ProtocolError(msg) if msg.starts_with("unknown method") => {
                code::METHOD_NOT_FOUND
            }
            Self::ProtocolError(_)
            | Self::CannotDeleteDefaultWorker
            | Self::InvalidSessionId(_) => code::INVALID_PARAMS,
            Self::WorkerLimitReached { .. }
            | Self::SessionLimitReached { .. }
            | Self::DomainBlocked { .. }
            | Self::DriverDisconnected(_)
            | Self::CircuitOpen
            | Self::Internal(_) => code::INTERNAL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
