//! Registry event fan-out (Design Notes §9: replaces a singleton event
//! emitter with a typed broadcast channel so subscribers — the storage-state
//! watchdog, the orphan reaper — never need a trait object or global state).

use super::types::{SessionId, TargetId, WorkerId};

#[derive(Debug, Clone)]
pub enum RegistryEvent {
    SessionCreated { session_id: SessionId },
    SessionDeleted { session_id: SessionId },
    SessionEvicted { session_id: SessionId },
    WorkerCreated { session_id: SessionId, worker_id: WorkerId },
    WorkerDeleted { session_id: SessionId, worker_id: WorkerId },
    TargetCreated { session_id: SessionId, worker_id: WorkerId, target_id: TargetId },
    TargetClosed { session_id: SessionId, worker_id: WorkerId, target_id: TargetId },
}

/// Thin wrapper over a broadcast sender; subscribers receive events
/// synchronously relative to the registry mutation that produced them
/// (the send happens before the mutating call returns).
#[derive(Clone)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<RegistryEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(1024);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Subscribers must not block; a lagged/slow
    /// subscriber only drops old events for itself (broadcast semantics),
    /// never blocks the publisher.
    pub fn publish(&self, event: RegistryEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
