//! Tool handler: result.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

/// Submit a tool result back to the agent.
pub struct ToolResultHandler;

#[async_trait]
impl MethodHandler for ToolResultHandler {
    async fn handle(&self, params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        let _session_id = require_string_param(params.as_ref(), "sessionId")?;
        let _tool_use_id = require_string_param(params.as_ref(), "toolUseId")?;
        Ok(serde_json::json!({ "accepted": true }))
    }
}
