//! Git handler: clone.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

/// Clone a git repository.
pub struct CloneHandler;

#[async_trait]
impl MethodHandler for CloneHandler {
    async fn handle(&self, params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        let _url = require_string_param(params.as_ref(), "url")?;
        Ok(serde_json::json!({ "stub": true, "cloned": false }))
    }
}
