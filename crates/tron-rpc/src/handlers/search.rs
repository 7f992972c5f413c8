//! Search handlers: content, events.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use tron_events::sqlite::repositories::search::SearchOptions;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

fn internal(e: impl std::fmt::Display) -> RpcError {
    RpcError::Internal {
        message: e.to_string(),
    }
}

/// Full-text search across all event content (optionally scoped to a workspace/types).
pub struct ContentSearchHandler;

#[async_trait]
impl MethodHandler for ContentSearchHandler {
    #[instrument(skip(self, ctx), fields(method = "search.content"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let query = require_string_param(params.as_ref(), "query")?;
        let workspace_id = params
            .as_ref()
            .and_then(|p| p.get("workspaceId"))
            .and_then(Value::as_str);
        let event_types: Option<Vec<String>> = params
            .as_ref()
            .and_then(|p| p.get("types"))
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToOwned::to_owned)
                    .collect()
            });
        let limit = params
            .as_ref()
            .and_then(|p| p.get("limit"))
            .and_then(Value::as_i64);

        let opts = SearchOptions {
            workspace_id,
            event_types: event_types.as_deref(),
            limit: limit.or(Some(50)),
        };
        let results = ctx.event_store.search(&query, &opts).map_err(internal)?;

        Ok(serde_json::json!({ "results": results }))
    }
}

/// Full-text search scoped to a single session's events.
pub struct EventSearchHandler;

#[async_trait]
impl MethodHandler for EventSearchHandler {
    #[instrument(skip(self, ctx), fields(method = "search.events", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let query = require_string_param(params.as_ref(), "query")?;
        let limit = params
            .as_ref()
            .and_then(|p| p.get("limit"))
            .and_then(Value::as_i64);

        let results = ctx
            .event_store
            .search_in_session(&session_id, &query, limit)
            .map_err(internal)?;

        Ok(serde_json::json!({ "results": results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::make_test_context;
    use serde_json::json;

    #[tokio::test]
    async fn content_search_success() {
        let ctx = make_test_context();
        let result = ContentSearchHandler
            .handle(Some(json!({"query": "hello"})), &ctx)
            .await
            .unwrap();
        assert!(result["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn content_search_missing_query() {
        let ctx = make_test_context();
        let err = ContentSearchHandler
            .handle(Some(json!({})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn content_search_finds_indexed_event() {
        let ctx = make_test_context();
        let sid = ctx
            .session_manager
            .create_session("m", "/tmp", Some("t"))
            .unwrap();
        ctx.event_store
            .append(&tron_events::AppendOptions {
                session_id: &sid,
                event_type: tron_events::EventType::MessageUser,
                payload: json!({"content": "find the dedup index"}),
                parent_id: None,
            })
            .unwrap();

        let result = ContentSearchHandler
            .handle(Some(json!({"query": "dedup"})), &ctx)
            .await
            .unwrap();
        let results = result["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["sessionId"], sid);
    }

    #[tokio::test]
    async fn event_search_missing_query() {
        let ctx = make_test_context();
        let err = EventSearchHandler
            .handle(Some(json!({"sessionId": "s1"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn event_search_scoped_to_session() {
        let ctx = make_test_context();
        let sid = ctx
            .session_manager
            .create_session("m", "/tmp", Some("t"))
            .unwrap();
        ctx.event_store
            .append(&tron_events::AppendOptions {
                session_id: &sid,
                event_type: tron_events::EventType::MessageUser,
                payload: json!({"content": "find the dedup index"}),
                parent_id: None,
            })
            .unwrap();

        let result = EventSearchHandler
            .handle(Some(json!({"sessionId": sid, "query": "dedup"})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["results"].as_array().unwrap().len(), 1);
    }
}
