//! Data model entities: Session, Worker, Target, OwnerPointer (spec §3).

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chromiumoxide::page::Page;

pub type SessionId = String;
pub type WorkerId = String;
pub type TargetId = String;

pub const DEFAULT_WORKER_ID: &str = "default";

/// A tenant's top-level unit of isolation. Owns one or more workers.
pub struct Session {
    pub id: SessionId,
    pub created_at: Instant,
    pub last_active: Instant,
    pub workers: HashMap<WorkerId, Worker>,
    pub default_worker_id: WorkerId,
}

impl Session {
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        let now = Instant::now();
        let mut workers = HashMap::new();
        workers.insert(DEFAULT_WORKER_ID.to_string(), Worker::new(DEFAULT_WORKER_ID.to_string(), id.clone()));
        Self {
            id,
            created_at: now,
            last_active: now,
            workers,
            default_worker_id: DEFAULT_WORKER_ID.to_string(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

/// One execution lane within a session; owns zero or more targets (tabs).
pub struct Worker {
    pub id: WorkerId,
    pub session_id: SessionId,
    pub targets: HashSet<TargetId>,
}

impl Worker {
    #[must_use]
    pub fn new(id: WorkerId, session_id: SessionId) -> Self {
        Self {
            id,
            session_id,
            targets: HashSet::new(),
        }
    }
}

/// A single tab, owned by exactly one (session, worker) pair.
pub struct Target {
    pub id: TargetId,
    pub owner: OwnerPointer,
    pub page: Page,
    pub created_at: Instant,
}

/// Points back from a target to its owning session+worker; the global
/// owner map (`registry::SessionRegistry::owners`) is the authoritative
/// bijection enforcing one owner per target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerPointer {
    pub session_id: SessionId,
    pub worker_id: WorkerId,
}
