//! RPC Dispatcher request pipeline (spec §4.10): parse → method-exists →
//! auth → rate-limit → permission → handler dispatch.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;

use super::registry;
use super::types::{JsonRpcRequest, JsonRpcResponse};
use crate::auth::{Role, Session};
use crate::error::{rpc_codes, AppError};
use crate::state::AppState;

/// Per-connection authentication state. One instance per WebSocket.
pub struct ConnectionContext {
    pub client_id: String,
    session: RwLock<Option<Session>>,
}

impl ConnectionContext {
    pub fn new(client_id: String) -> Self {
        Self {
            client_id,
            session: RwLock::new(None),
        }
    }

    pub fn authenticate(&self, session: Session) {
        *self.session.write() = Some(session);
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn role(&self) -> Role {
        self.session.read().as_ref().map(|s| s.role).unwrap_or(Role::Viewer)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }
}

pub struct Dispatcher {
    state: Arc<AppState>,
}

impl Dispatcher {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Runs one raw inbound frame through the full gate. Returns `None` only
    /// when the frame had no recoverable `id` and could not even be parsed
    /// as an object (nothing sensible to reply with).
    pub async fn handle(&self, ctx: &ConnectionContext, raw: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => return Some(JsonRpcResponse::failure(None, rpc_codes::PARSE_ERROR, "parse error")),
        };
        let id = value.get("id").cloned();

        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id,
                    rpc_codes::INVALID_REQUEST,
                    format!("invalid request: {e}"),
                ))
            }
        };

        if !registry::is_known_method(&request.method) {
            return Some(JsonRpcResponse::failure(
                request.id,
                rpc_codes::METHOD_NOT_FOUND,
                format!("method not found: {}", request.method),
            ));
        }

        if registry::requires_authentication(&request.method) && !ctx.is_authenticated() {
            return Some(JsonRpcResponse::failure(
                request.id,
                rpc_codes::AUTH_REQUIRED,
                "authentication required",
            ));
        }

        if !self.state.rate_limiter.record_request(&ctx.client_id) {
            return Some(JsonRpcResponse::failure(
                request.id,
                rpc_codes::RATE_LIMITED,
                "rate limit exceeded",
            ));
        }

        if !self.state.permissions.has_permission(ctx.role(), &request.method) {
            return Some(JsonRpcResponse::failure(
                request.id,
                rpc_codes::FORBIDDEN,
                format!("insufficient permissions for {}", request.method),
            ));
        }

        // A handler panic must become a -32603 reply, not an unwind into the
        // WebSocket read loop that would take the whole connection down.
        let dispatch = super::handlers::dispatch(&self.state, ctx, &request.method, request.params.unwrap_or(Value::Null));
        let result = match AssertUnwindSafe(dispatch).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                tracing::error!(?panic, method = %request.method, "rpc handler panicked");
                Err(AppError::Internal("internal error".to_string()))
            }
        };
        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(AppError::BadRequest(msg)) => {
                JsonRpcResponse::failure(request.id, rpc_codes::INVALID_PARAMS, msg)
            }
            Err(e) => JsonRpcResponse::failure(request.id, e.rpc_code(), e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_context_defaults_to_viewer_role() {
        let ctx = ConnectionContext::new("client-a".to_string());
        assert_eq!(ctx.role(), Role::Viewer);
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn handler_panic_is_caught_and_mapped_to_internal_error() {
        let panicking = async { panic!("handler exploded") };
        let result: std::result::Result<crate::error::Result<Value>, _> =
            AssertUnwindSafe(panicking).catch_unwind().await;
        let mapped = match result {
            Ok(r) => r,
            Err(_) => Err(AppError::Internal("internal error".to_string())),
        };
        assert_eq!(mapped.unwrap_err().rpc_code(), rpc_codes::INTERNAL_ERROR);
    }
}
