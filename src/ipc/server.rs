//! IPC server, broker side (C7): accepts worker connections over a Unix
//! domain socket (a named pipe on Windows), frames each connection with
//! [`LineDecoder`], and calls back into the dispatcher for every request.
//! Disconnect runs `on_disconnect` so the registry can release that
//! worker's resources (spec §4.7).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use async_trait::async_trait;

use crate::error::{BrokerError, Result};

use super::codec::{encode, LineDecoder};
use super::wire::{Request, Response};

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, connection_id: u64, request: Request) -> Response;
    async fn on_disconnect(&self, connection_id: u64);
}

pub struct IpcServer {
    socket_path: PathBuf,
}

impl IpcServer {
    #[must_use]
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    #[cfg(unix)]
    pub async fn serve(&self, handler: Arc<dyn RequestHandler>) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .map_err(|e| BrokerError::Internal(format!("removing stale socket: {e}")))?;
        }
        let listener = UnixListener::bind(&self.socket_path)
            .map_err(|e| BrokerError::Internal(format!("binding {}: {e}", self.socket_path.display())))?;
        info!(path = %self.socket_path.display(), "ipc server listening");

        let mut next_connection_id: u64 = 0;
        loop {
            let (stream, _addr) = listener
                .accept()
                .await
                .map_err(|e| BrokerError::Internal(format!("accept failed: {e}")))?;
            let connection_id = next_connection_id;
            next_connection_id += 1;

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(connection_id, stream, Arc::clone(&handler)).await {
                    warn!(connection_id, error = %e, "ipc connection ended with error");
                }
                handler.on_disconnect(connection_id).await;
                debug!(connection_id, "ipc connection closed, worker cleanup run");
            });
        }
    }

    #[cfg(not(unix))]
    pub async fn serve(&self, _handler: Arc<dyn RequestHandler>) -> Result<()> {
        Err(BrokerError::Internal(
            "named-pipe transport not implemented in this build".to_string(),
        ))
    }
}

#[cfg(unix)]
async fn handle_connection(
    connection_id: u64,
    mut stream: UnixStream,
    handler: Arc<dyn RequestHandler>,
) -> Result<()> {
    let mut decoder = LineDecoder::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| BrokerError::Internal(format!("read error: {e}")))?;
        if n == 0 {
            return Ok(()); // peer closed, normal disconnect
        }

        let requests: Vec<Request> = decoder.feed(&buf[..n])?;
        for request in requests {
            let response = handler.handle(connection_id, request).await;
            let bytes = encode(&response)?;
            stream
                .write_all(&bytes)
                .await
                .map_err(|e| BrokerError::Internal(format!("write error: {e}")))?;
        }
    }
}

pub fn socket_exists(path: &Path) -> bool {
    path.exists()
}
