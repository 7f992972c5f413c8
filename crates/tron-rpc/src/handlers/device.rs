//! Device handlers: registerToken, unregisterToken.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use tron_events::sqlite::repositories::device_token::DeviceTokenRepo;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

fn internal(e: impl std::fmt::Display) -> RpcError {
    RpcError::Internal {
        message: e.to_string(),
    }
}

/// Register an APNS device token for push notifications.
pub struct RegisterTokenHandler;

#[async_trait]
impl MethodHandler for RegisterTokenHandler {
    #[instrument(skip(self, ctx), fields(method = "device.register"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let token = require_string_param(params.as_ref(), "token")?;
        let session_id = params
            .as_ref()
            .and_then(|p| p.get("sessionId"))
            .and_then(Value::as_str);
        let workspace_id = params
            .as_ref()
            .and_then(|p| p.get("workspaceId"))
            .and_then(Value::as_str);
        let environment = params
            .as_ref()
            .and_then(|p| p.get("environment"))
            .and_then(Value::as_str)
            .unwrap_or("production");

        let conn = ctx.event_store.pool().get().map_err(internal)?;
        let result =
            DeviceTokenRepo::register(&conn, &token, session_id, workspace_id, environment)
                .map_err(internal)?;

        Ok(serde_json::json!({
            "registered": true,
            "id": result.id,
            "created": result.created,
        }))
    }
}

/// Unregister (deactivate) an APNS device token.
pub struct UnregisterTokenHandler;

#[async_trait]
impl MethodHandler for UnregisterTokenHandler {
    #[instrument(skip(self, ctx), fields(method = "device.unregister"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let token = require_string_param(params.as_ref(), "token")?;
        let conn = ctx.event_store.pool().get().map_err(internal)?;
        let unregistered = DeviceTokenRepo::unregister(&conn, &token).map_err(internal)?;
        Ok(serde_json::json!({ "unregistered": unregistered }))
    }
}
