//! IPC client, worker side (C8): one outbound connection, a
//! correlation-id-keyed pending-request map, and a reconnect-with-backoff
//! loop. On terminal disconnect every still-pending request is rejected with
//! `BrokerError::NotConnected` instead of hanging forever (spec §4.8).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::error::{BrokerError, Result};

use super::codec::{encode, LineDecoder};
use super::wire::{Outcome, Request, Response};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

pub struct IpcClient {
    socket_path: PathBuf,
    next_id: AtomicU64,
    pending: PendingMap,
    connected: Arc<std::sync::atomic::AtomicBool>,
    outbox: Mutex<Option<tokio::sync::mpsc::UnboundedSender<Vec<u8>>>>,
    request_timeout: Duration,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
}

impl IpcClient {
    #[must_use]
    pub fn new(
        socket_path: PathBuf,
        request_timeout: Duration,
        reconnect_attempts: u32,
        reconnect_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            socket_path,
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            outbox: Mutex::new(None),
            request_timeout,
            reconnect_attempts,
            reconnect_delay,
        })
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Connect and spawn the background connection-loop task, which
    /// reconnects with backoff on transient failures and stops after
    /// `reconnect_attempts` consecutive failures.
    #[cfg(unix)]
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.connection_loop().await;
        });
    }

    #[cfg(unix)]
    async fn connection_loop(self: Arc<Self>) {
        let mut attempt = 0u32;
        loop {
            match UnixStream::connect(&self.socket_path).await {
                Ok(stream) => {
                    attempt = 0;
                    self.connected.store(true, Ordering::Relaxed);
                    info!(path = %self.socket_path.display(), "ipc client connected");
                    self.run_connection(stream).await;
                    self.connected.store(false, Ordering::Relaxed);
                    self.reject_all_pending().await;
                }
                Err(e) => {
                    attempt += 1;
                    warn!(attempt, error = %e, "ipc client connect failed");
                    if attempt >= self.reconnect_attempts {
                        warn!("ipc client giving up after max reconnect attempts");
                        self.reject_all_pending().await;
                        return;
                    }
                }
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    #[cfg(unix)]
    async fn run_connection(self: &Arc<Self>, mut stream: UnixStream) {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
        *self.outbox.lock().await = Some(tx);

        let mut decoder = LineDecoder::new();
        let mut buf = [0u8; 8192];

        loop {
            tokio::select! {
                outgoing = rx.recv() => {
                    match outgoing {
                        Some(bytes) => {
                            if stream.write_all(&bytes).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                read = stream.read(&mut buf) => {
                    match read {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let responses: Vec<Response> = match decoder.feed(&buf[..n]) {
                                Ok(r) => r,
                                Err(e) => {
                                    warn!(error = %e, "malformed response frame, dropping connection");
                                    break;
                                }
                            };
                            for response in responses {
                                self.deliver(response).await;
                            }
                        }
                    }
                }
            }
        }
        *self.outbox.lock().await = None;
        debug!("ipc client connection loop exiting");
    }

    async fn deliver(&self, response: Response) {
        if let Some(tx) = self.pending.lock().await.remove(&response.id) {
            let _ = tx.send(response);
        }
    }

    async fn reject_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Response::err(0, crate::error::code::NOT_CONNECTED, "not connected"));
        }
    }

    pub async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            id,
            method: method.to_string(),
            params,
        };
        let bytes = encode(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        {
            let outbox = self.outbox.lock().await;
            match outbox.as_ref() {
                Some(sender) => {
                    if sender.send(bytes).is_err() {
                        self.pending.lock().await.remove(&id);
                        return Err(BrokerError::NotConnected);
                    }
                }
                None => {
                    self.pending.lock().await.remove(&id);
                    return Err(BrokerError::NotConnected);
                }
            }
        }

        let response = tokio::time::timeout(self.request_timeout, rx)
            .await
            .map_err(|_| BrokerError::Timeout(self.request_timeout))?
            .map_err(|_| BrokerError::NotConnected)?;

        match response.outcome {
            Outcome::Ok { result } => Ok(result),
            Outcome::Err { error } => Err(BrokerError::ProtocolError(error.message)),
        }
    }
}
