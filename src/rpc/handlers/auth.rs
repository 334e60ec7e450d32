//! The single unauthenticated-but-gated method: `authenticate`.

use serde_json::{json, Value};

use crate::auth::{permission, Role};
use crate::error::{AppError, Result};
use crate::rpc::dispatcher::ConnectionContext;
use crate::state::AppState;

fn methods_for(role: Role) -> Vec<&'static str> {
    let mut methods: Vec<&'static str> = permission::VIEWER_METHODS.to_vec();
    if role.rank() >= Role::Operator.rank() {
        methods.extend_from_slice(permission::OPERATOR_METHODS);
    }
    if role.rank() >= Role::Admin.rank() {
        methods.extend_from_slice(permission::ADMIN_METHODS);
    }
    methods
}

pub async fn authenticate(state: &AppState, ctx: &ConnectionContext, params: Value) -> Result<Value> {
    let token = params
        .get("auth_token")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("missing required parameter 'auth_token'".to_string()))?;

    let now = chrono::Utc::now().timestamp();
    let claims = state.token_codec.verify(token, now)?;
    let session = state.sessions.create_session(&claims.user_id, claims.role)?;
    ctx.authenticate(session.clone());

    Ok(json!({
        "authenticated": true,
        "role": session.role,
        "session_id": session.id,
        "permissions": methods_for(session.role),
        "expires_at": session.expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_permissions_exclude_operator_and_admin_methods() {
        let methods = methods_for(Role::Viewer);
        assert!(methods.contains(&"ping"));
        assert!(!methods.contains(&"start_recording"));
        assert!(!methods.contains(&"get_metrics"));
    }

    #[test]
    fn admin_permissions_include_every_tier() {
        let methods = methods_for(Role::Admin);
        assert!(methods.contains(&"ping"));
        assert!(methods.contains(&"start_recording"));
        assert!(methods.contains(&"get_metrics"));
    }
}
