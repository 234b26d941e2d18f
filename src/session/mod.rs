//! Session/Worker/Target registry (C5) and its supporting event bus and
//! background reaper.

pub mod events;
pub mod reaper;
pub mod registry;
pub mod types;

pub use events::{EventBus, RegistryEvent};
pub use reaper::Reaper;
pub use registry::{validate_session_id, SessionRegistry};
pub use types::{OwnerPointer, Session, SessionId, Target, TargetId, Worker, WorkerId, DEFAULT_WORKER_ID};
