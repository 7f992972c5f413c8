//! Context handlers: getSnapshot, getDetailedSnapshot, shouldCompact,
//! previewCompaction, confirmCompaction, canAcceptTurn, clear, compact.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use tron_context::context_manager::ContextManager;
use tron_context::summarizer::KeywordSummarizer;
use tron_context::types::{CompactionConfig, ContextManagerConfig};
use tron_core::events::{BaseEvent, TronEvent};
use tron_events::AppendOptions;
use tron_tools::registry::ToolRegistry;

use crate::context::RpcContext;
use crate::errors::{self, RpcError};
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

/// Build a `ContextManager` reflecting the current reconstructed state of a session.
fn build_context_manager(ctx: &RpcContext, session_id: &str) -> Result<ContextManager, RpcError> {
    ctx.session_manager
        .get_session(session_id)
        .map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })?
        .ok_or_else(|| RpcError::NotFound {
            code: errors::SESSION_NOT_FOUND.into(),
            message: format!("Session '{session_id}' not found"),
        })?;

    let active = ctx
        .session_manager
        .resume_session(session_id)
        .map_err(|e| RpcError::NotFound {
            code: errors::SESSION_NOT_FOUND.into(),
            message: e.to_string(),
        })?;

    let registry = ctx
        .agent_deps
        .as_ref()
        .map_or_else(ToolRegistry::new, |deps| (deps.tool_factory)());

    let context_limit = tron_llm::tokens::pricing::get_context_limit(&active.state.model);

    let config = ContextManagerConfig {
        model: active.state.model.clone(),
        system_prompt: active.state.system_prompt.clone(),
        working_directory: active.state.working_directory.clone(),
        tools: registry.definitions(),
        rules_content: None,
        compaction: CompactionConfig {
            context_limit,
            ..CompactionConfig::default()
        },
    };

    let mut context_manager = ContextManager::new(config);
    context_manager.set_messages(active.state.messages.clone());
    if active.state.token_usage.input_tokens > 0 {
        context_manager.set_api_context_tokens(active.state.token_usage.input_tokens);
    }

    Ok(context_manager)
}

/// Get context snapshot for a session.
pub struct GetSnapshotHandler;

#[async_trait]
impl MethodHandler for GetSnapshotHandler {
    #[instrument(skip(self, ctx), fields(method = "context.getSnapshot", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let context_manager = build_context_manager(ctx, &session_id)?;
        let snapshot = context_manager.get_snapshot();
        serde_json::to_value(snapshot).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

/// Get detailed context snapshot.
pub struct GetDetailedSnapshotHandler;

#[async_trait]
impl MethodHandler for GetDetailedSnapshotHandler {
    #[instrument(skip(self, ctx), fields(method = "context.getDetailedSnapshot", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let context_manager = build_context_manager(ctx, &session_id)?;
        let snapshot = context_manager.get_detailed_snapshot();
        serde_json::to_value(snapshot).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

/// Check if compaction is recommended.
pub struct ShouldCompactHandler;

#[async_trait]
impl MethodHandler for ShouldCompactHandler {
    #[instrument(skip(self, ctx), fields(method = "context.shouldCompact", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let context_manager = build_context_manager(ctx, &session_id)?;
        Ok(serde_json::json!({ "shouldCompact": context_manager.should_compact() }))
    }
}

/// Preview what compaction would produce.
pub struct PreviewCompactionHandler;

#[async_trait]
impl MethodHandler for PreviewCompactionHandler {
    #[instrument(skip(self, ctx), fields(method = "context.previewCompaction", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let context_manager = build_context_manager(ctx, &session_id)?;

        let summarizer = KeywordSummarizer;
        let preview = context_manager
            .preview_compaction(&summarizer)
            .await
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?;

        serde_json::to_value(preview).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

/// Confirm and execute compaction, persisting the boundary and summary events.
pub struct ConfirmCompactionHandler;

#[async_trait]
impl MethodHandler for ConfirmCompactionHandler {
    #[instrument(skip(self, ctx), fields(method = "context.confirmCompaction", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let edited_summary = params
            .as_ref()
            .and_then(|p| p.get("editedSummary"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        let mut context_manager = build_context_manager(ctx, &session_id)?;
        let tokens_before = context_manager.get_current_tokens();

        let event_ids: Vec<String> = ctx
            .event_store
            .get_state_at_head(&session_id)
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?
            .messages_with_event_ids
            .iter()
            .flat_map(|m| m.event_ids.iter().filter_map(Clone::clone))
            .collect();
        let range_from = event_ids.first().cloned().unwrap_or_default();
        let range_to = event_ids.last().cloned().unwrap_or_else(|| range_from.clone());

        let summarizer = KeywordSummarizer;
        let result = context_manager
            .execute_compaction(&summarizer, edited_summary.as_deref())
            .await
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?;

        #[allow(clippy::cast_possible_wrap)]
        let boundary_event = ctx
            .event_store
            .append(&AppendOptions {
                session_id: &session_id,
                event_type: tron_events::EventType::CompactBoundary,
                payload: serde_json::json!({
                    "range": { "from": range_from, "to": range_to },
                    "originalTokens": tokens_before as i64,
                    "compactedTokens": result.tokens_after as i64,
                }),
                parent_id: None,
            })
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?;

        ctx.event_store
            .append(&AppendOptions {
                session_id: &session_id,
                event_type: tron_events::EventType::CompactSummary,
                payload: serde_json::json!({
                    "summary": result.summary,
                    "boundaryEventId": boundary_event.id,
                }),
                parent_id: None,
            })
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?;

        let _ = ctx.orchestrator.broadcast().emit(TronEvent::CompactionComplete {
            base: BaseEvent::now(&session_id),
            success: result.success,
            tokens_before,
            tokens_after: result.tokens_after,
            compression_ratio: result.compression_ratio,
            reason: None,
            summary: Some(result.summary.clone()),
            estimated_context_tokens: Some(result.tokens_after),
        });

        Ok(serde_json::json!({
            "confirmed": true,
            "tokensBefore": tokens_before,
            "tokensAfter": result.tokens_after,
            "compressionRatio": result.compression_ratio,
        }))
    }
}

/// Check if the context can accept another turn.
pub struct CanAcceptTurnHandler;

#[async_trait]
impl MethodHandler for CanAcceptTurnHandler {
    #[instrument(skip(self, ctx), fields(method = "context.canAcceptTurn", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let estimated_response_tokens = params
            .as_ref()
            .and_then(|p| p.get("estimatedResponseTokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        let context_manager = build_context_manager(ctx, &session_id)?;
        let validation = context_manager.can_accept_turn(estimated_response_tokens);
        serde_json::to_value(validation).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

/// Clear context for a session.
pub struct ClearHandler;

#[async_trait]
impl MethodHandler for ClearHandler {
    #[instrument(skip(self, ctx), fields(method = "context.clear", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let context_manager = build_context_manager(ctx, &session_id)?;
        let tokens_before = context_manager.get_current_tokens();

        ctx.event_store
            .append(&AppendOptions {
                session_id: &session_id,
                event_type: tron_events::EventType::ContextCleared,
                payload: serde_json::json!({
                    "tokensBefore": tokens_before,
                    "tokensAfter": 0,
                }),
                parent_id: None,
            })
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?;

        #[allow(clippy::cast_possible_truncation)]
        let _ = ctx.orchestrator.broadcast().emit(TronEvent::ContextCleared {
            base: BaseEvent::now(&session_id),
            tokens_before: tokens_before as u32,
            tokens_after: 0,
        });

        Ok(serde_json::json!({ "cleared": true }))
    }
}

/// Trigger compaction for a session, regardless of whether the threshold is met.
pub struct CompactHandler;

#[async_trait]
impl MethodHandler for CompactHandler {
    #[instrument(skip(self, ctx), fields(method = "context.compact", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        // Same semantics as confirmCompaction without an edited summary.
        ConfirmCompactionHandler.handle(params, ctx).await.map(|mut v| {
            if let Some(obj) = v.as_object_mut() {
                let confirmed = obj.remove("confirmed").unwrap_or(Value::Bool(true));
                obj.insert("compacted".to_owned(), confirmed);
            }
            v
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::make_test_context;
    use serde_json::json;

    fn setup_session(ctx: &RpcContext) -> String {
        ctx.session_manager
            .create_session("claude-opus-4-6", "/tmp", Some("test"))
            .unwrap()
    }

    #[tokio::test]
    async fn get_snapshot() {
        let ctx = make_test_context();
        let sid = setup_session(&ctx);
        let result = GetSnapshotHandler
            .handle(Some(json!({"sessionId": sid})), &ctx)
            .await
            .unwrap();
        assert!(result["currentTokens"].is_u64());
        assert!(result["contextLimit"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn get_snapshot_missing_session() {
        let ctx = make_test_context();
        let err = GetSnapshotHandler
            .handle(Some(json!({"sessionId": "nope"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), errors::SESSION_NOT_FOUND);
    }

    #[tokio::test]
    async fn get_detailed_snapshot() {
        let ctx = make_test_context();
        let sid = setup_session(&ctx);
        let result = GetDetailedSnapshotHandler
            .handle(Some(json!({"sessionId": sid})), &ctx)
            .await
            .unwrap();
        assert!(result.is_object());
    }

    #[tokio::test]
    async fn should_compact_false_for_fresh_session() {
        let ctx = make_test_context();
        let sid = setup_session(&ctx);
        let result = ShouldCompactHandler
            .handle(Some(json!({"sessionId": sid})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["shouldCompact"], false);
    }

    #[tokio::test]
    async fn preview_compaction_empty_session() {
        let ctx = make_test_context();
        let sid = setup_session(&ctx);
        let result = PreviewCompactionHandler
            .handle(Some(json!({"sessionId": sid})), &ctx)
            .await
            .unwrap();
        assert!(result["tokensBefore"].is_u64());
    }

    #[tokio::test]
    async fn confirm_compaction_persists_events() {
        let ctx = make_test_context();
        let sid = setup_session(&ctx);
        let result = ConfirmCompactionHandler
            .handle(Some(json!({"sessionId": sid})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["confirmed"], true);

        let events = ctx
            .event_store
            .get_events_by_session(&sid, &tron_events::sqlite::repositories::event::ListEventsOptions::default())
            .unwrap();
        let compaction_events = events
            .iter()
            .filter(|e| e.event_type == "compact.boundary" || e.event_type == "compact.summary")
            .count();
        assert_eq!(compaction_events, 2);
    }

    #[tokio::test]
    async fn can_accept_turn_true_for_fresh_session() {
        let ctx = make_test_context();
        let sid = setup_session(&ctx);
        let result = CanAcceptTurnHandler
            .handle(Some(json!({"sessionId": sid, "estimatedResponseTokens": 100})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["canProceed"], true);
    }

    #[tokio::test]
    async fn clear_context_persists_event() {
        let ctx = make_test_context();
        let sid = setup_session(&ctx);
        let result = ClearHandler
            .handle(Some(json!({"sessionId": sid})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["cleared"], true);

        let events = ctx
            .event_store
            .get_events_by_session(&sid, &tron_events::sqlite::repositories::event::ListEventsOptions::default())
            .unwrap();
        let cleared_count = events.iter().filter(|e| e.event_type == "context.cleared").count();
        assert_eq!(cleared_count, 1);
    }

    #[tokio::test]
    async fn compact_context() {
        let ctx = make_test_context();
        let sid = setup_session(&ctx);
        let result = CompactHandler
            .handle(Some(json!({"sessionId": sid})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["compacted"], true);
    }

    #[tokio::test]
    async fn missing_session_id_is_invalid_params() {
        let ctx = make_test_context();
        let err = ShouldCompactHandler
            .handle(Some(json!({})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), errors::INVALID_PARAMS);
    }
}
