//! Events handlers: getHistory, getSince, subscribe, append.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use tron_events::AppendOptions;
use tron_events::sqlite::repositories::event::ListEventsOptions;

use crate::context::RpcContext;
use crate::errors::{self, RpcError};
use crate::handlers::{require_param, require_string_param};
use crate::registry::MethodHandler;

fn verify_session(ctx: &RpcContext, session_id: &str) -> Result<(), RpcError> {
    ctx.session_manager
        .get_session(session_id)
        .map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })?
        .ok_or_else(|| RpcError::NotFound {
            code: errors::SESSION_NOT_FOUND.into(),
            message: format!("Session '{session_id}' not found"),
        })?;
    Ok(())
}

/// Get full event history for a session.
pub struct GetHistoryHandler;

#[async_trait]
impl MethodHandler for GetHistoryHandler {
    #[instrument(skip(self, ctx), fields(method = "events.getHistory", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        verify_session(ctx, &session_id)?;

        let limit = params
            .as_ref()
            .and_then(|p| p.get("limit"))
            .and_then(Value::as_i64);
        let offset = params
            .as_ref()
            .and_then(|p| p.get("offset"))
            .and_then(Value::as_i64);

        let events = ctx
            .event_store
            .get_events_by_session(&session_id, &ListEventsOptions { limit, offset })
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?;

        Ok(serde_json::json!({
            "sessionId": session_id,
            "events": events,
        }))
    }
}

/// Get events inserted after a given sequence number.
pub struct GetSinceHandler;

#[async_trait]
impl MethodHandler for GetSinceHandler {
    #[instrument(skip(self, ctx), fields(method = "events.getSince", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let after_sequence = require_param(params.as_ref(), "sequence")?
            .as_i64()
            .ok_or_else(|| RpcError::InvalidParams {
                message: "Parameter 'sequence' must be an integer".into(),
            })?;
        verify_session(ctx, &session_id)?;

        let events = ctx
            .event_store
            .get_events_since(&session_id, after_sequence)
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?;

        Ok(serde_json::json!({ "events": events }))
    }
}

/// Subscribe to real-time events for a session.
///
/// Real-time push happens over the same WebSocket connection via the
/// broadcast bridge (every connected client receives `message.*`/`tool.*`/
/// `turn.*` boundary events for sessions it has joined) — this call only
/// confirms the session exists before the client starts listening.
pub struct SubscribeHandler;

#[async_trait]
impl MethodHandler for SubscribeHandler {
    #[instrument(skip(self, ctx), fields(method = "events.subscribe", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        verify_session(ctx, &session_id)?;
        Ok(serde_json::json!({ "subscribed": true }))
    }
}

/// Unsubscribe from real-time events for a session.
///
/// Symmetric with [`SubscribeHandler`]: there's no server-side subscription
/// registry to tear down, so this just acknowledges once the session is
/// confirmed to exist.
pub struct UnsubscribeHandler;

#[async_trait]
impl MethodHandler for UnsubscribeHandler {
    #[instrument(skip(self, ctx), fields(method = "events.unsubscribe", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        verify_session(ctx, &session_id)?;
        Ok(serde_json::json!({ "unsubscribed": true }))
    }
}

/// Append an event directly to a session's event log.
pub struct AppendHandler;

#[async_trait]
impl MethodHandler for AppendHandler {
    #[instrument(skip(self, ctx), fields(method = "events.append", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let event_type_str = require_string_param(params.as_ref(), "eventType")?;
        verify_session(ctx, &session_id)?;

        let event_type: tron_events::EventType =
            event_type_str
                .parse()
                .map_err(|_| RpcError::InvalidParams {
                    message: format!("Unknown event type '{event_type_str}'"),
                })?;

        let payload = params
            .as_ref()
            .and_then(|p| p.get("payload"))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        let parent_id = params
            .as_ref()
            .and_then(|p| p.get("parentId"))
            .and_then(Value::as_str);

        let event = ctx
            .event_store
            .append(&AppendOptions {
                session_id: &session_id,
                event_type,
                payload,
                parent_id,
            })
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?;

        serde_json::to_value(event).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}
