//! Request dispatcher (C9): the method table mapping IPC method names onto
//! session-registry/router operations, and the direct
//! tagged-error-variant → numeric wire code mapping that replaces the
//! substring-matching approach (Design Notes §9; see `error::BrokerError::wire_code`).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::BrokerError;
use crate::ipc::{Request, Response};
use crate::ipc::server::RequestHandler;
use crate::refs::RefManager;
use crate::session::SessionRegistry;

/// The seam the (external, out-of-scope) tool catalog plugs into.
/// `Dispatcher` itself only understands the handful of registry-management
/// methods in spec.md §6; any other method name is forwarded to `invoke`.
#[async_trait]
pub trait ToolInvocation: Send + Sync {
    async fn invoke(&self, method: &str, params: Value) -> Result<Value, BrokerError>;
}

pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    refs: Arc<RefManager>,
    tools: Option<Arc<dyn ToolInvocation>>,
    /// Sessions created or touched by each live IPC connection, so
    /// `on_disconnect` can tear them down immediately instead of waiting on
    /// the TTL/orphan sweeps (spec.md §8, scenario 5).
    connections: DashMap<u64, HashSet<String>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, refs: Arc<RefManager>, tools: Option<Arc<dyn ToolInvocation>>) -> Self {
        Self {
            registry,
            refs,
            tools,
            connections: DashMap::new(),
        }
    }

    fn track_session(&self, connection_id: u64, session_id: &str) {
        self.connections
            .entry(connection_id)
            .or_default()
            .insert(session_id.to_string());
    }

    async fn dispatch(&self, connection_id: u64, method: &str, params: Value) -> Result<Value, BrokerError> {
        match method {
            "session.create" => {
                let id = self.registry.create_session().await?;
                self.track_session(connection_id, &id);
                Ok(json!({ "session_id": id }))
            }
            "session.touch" => {
                let session_id = string_param(&params, "session_id")?;
                self.registry.touch(&session_id).await?;
                Ok(json!({}))
            }
            "session.delete" => {
                let session_id = string_param(&params, "session_id")?;
                self.registry.delete_session(&session_id).await?;
                self.refs.clear_session(&session_id);
                Ok(json!({}))
            }
            "session.get" => {
                let session_id = string_param(&params, "session_id")?;
                Ok(serde_json::to_value(self.registry.session_info(&session_id).await?)
                    .map_err(|e| BrokerError::Internal(e.to_string()))?)
            }
            "session.list" => Ok(json!({ "session_ids": self.registry.list_session_ids() })),
            "worker.create" => {
                let session_id = string_param(&params, "session_id")?;
                let worker_id = self.registry.create_worker(&session_id).await?;
                self.track_session(connection_id, &session_id);
                Ok(json!({ "worker_id": worker_id }))
            }
            "worker.delete" => {
                let session_id = string_param(&params, "session_id")?;
                let worker_id = string_param(&params, "worker_id")?;
                self.registry.delete_worker(&session_id, &worker_id).await?;
                Ok(json!({}))
            }
            "worker.heartbeat" => {
                let session_id = string_param(&params, "session_id")?;
                self.registry.touch(&session_id).await?;
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                Ok(json!({ "timestamp": now }))
            }
            "target.create" => {
                let session_id = string_param(&params, "session_id")?;
                let worker_id = string_param(&params, "worker_id")?;
                let target_id = self.registry.create_target(&session_id, &worker_id).await?;
                Ok(json!({ "target_id": target_id }))
            }
            "target.close" => {
                let session_id = string_param(&params, "session_id")?;
                let worker_id = string_param(&params, "worker_id")?;
                let target_id = string_param(&params, "target_id")?;
                self.registry.close_target(&session_id, &worker_id, &target_id).await?;
                self.refs.clear_target(&session_id, &target_id);
                Ok(json!({}))
            }
            "tabs.list" => {
                let session_id = string_param(&params, "session_id")?;
                let worker_id = string_param(&params, "worker_id")?;
                Ok(json!({ "target_ids": self.registry.list_tabs(&session_id, &worker_id).await? }))
            }
            "cdp.execute" => {
                let session_id = string_param(&params, "session_id")?;
                let worker_id = string_param(&params, "worker_id")?;
                let target_id = string_param(&params, "target_id")?;
                let cdp_method = string_param(&params, "method")?;
                let cdp_params = params.get("params").cloned().unwrap_or(json!({}));
                self.registry
                    .execute_cdp(&session_id, &worker_id, &target_id, &cdp_method, cdp_params)
                    .await
            }
            "refs.set" => {
                let session_id = string_param(&params, "session_id")?;
                let target_id = string_param(&params, "target_id")?;
                let node_id = string_param(&params, "node_id")?;
                let token = self.refs.register(&session_id, &target_id, node_id);
                Ok(json!({ "ref": token }))
            }
            "refs.get" => {
                let session_id = string_param(&params, "session_id")?;
                let target_id = string_param(&params, "target_id")?;
                let token = string_param(&params, "ref")?;
                let node_id = self.refs.resolve_to_node_id(&session_id, &target_id, &token)?;
                Ok(json!({ "node_id": node_id }))
            }
            "refs.clear" => {
                let session_id = string_param(&params, "session_id")?;
                let target_id = string_param(&params, "target_id")?;
                self.refs.clear_target(&session_id, &target_id);
                Ok(json!({}))
            }
            "registry.stats" => Ok(serde_json::to_value(self.registry.stats().await)
                .map_err(|e| BrokerError::Internal(e.to_string()))?),
            other => match &self.tools {
                Some(tools) => self.invoke_tool(tools, other, params).await,
                None => Err(BrokerError::ProtocolError(format!("unknown method {other:?}"))),
            },
        }
    }

    /// Tool calls that carry a `session_id` (and optionally `worker_id`) run
    /// through the per-worker serial queue so two commands against the same
    /// tab never race the driver; calls with no session context (rare, e.g.
    /// a stateless probe tool) run inline.
    async fn invoke_tool(
        &self,
        tools: &Arc<dyn ToolInvocation>,
        method: &str,
        params: Value,
    ) -> Result<Value, BrokerError> {
        let session_id = params.get("session_id").and_then(Value::as_str).map(str::to_string);
        let Some(session_id) = session_id else {
            return tools.invoke(method, params).await;
        };
        let worker_id = params.get("worker_id").and_then(Value::as_str).map(str::to_string);

        let tools = Arc::clone(tools);
        let method = method.to_string();
        self.registry
            .submit(&session_id, worker_id.as_deref(), move || {
                Box::pin(async move { tools.invoke(&method, params).await })
            })
            .await
            .unwrap_or_else(|| Err(BrokerError::ProtocolError("command queue shut down mid-call".to_string())))
    }
}

#[async_trait]
impl RequestHandler for Dispatcher {
    async fn handle(&self, connection_id: u64, request: Request) -> Response {
        match self.dispatch(connection_id, &request.method, request.params).await {
            Ok(result) => Response::ok(request.id, result),
            Err(e) => {
                warn!(method = %request.method, error = %e, "request failed");
                Response::err(request.id, e.wire_code(), e.to_string())
            }
        }
    }

    /// A dropped socket orphans every session this connection owned unless
    /// we tear them down here, rather than waiting on the TTL/orphan sweeps —
    /// `session.list` must stop showing them immediately (spec.md §8,
    /// scenario 5).
    async fn on_disconnect(&self, connection_id: u64) {
        let Some((_, session_ids)) = self.connections.remove(&connection_id) else {
            return;
        };
        for session_id in session_ids {
            if let Err(e) = self.registry.delete_session(&session_id).await {
                warn!(session_id, error = %e, "cleaning up session on disconnect");
            }
            self.refs.clear_session(&session_id);
        }
    }
}

fn string_param(params: &Value, key: &str) -> Result<String, BrokerError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BrokerError::ProtocolError(format!("missing or invalid param {key:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_param_extracts_valid_values() {
        let params = json!({ "session_id": "abc" });
        assert_eq!(string_param(&params, "session_id").unwrap(), "abc");
    }

    #[test]
    fn string_param_rejects_missing_keys() {
        let params = json!({});
        assert!(string_param(&params, "session_id").is_err());
    }
}
