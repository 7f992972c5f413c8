//! Tree handlers: getVisualization, getBranches, getSubtree, getAncestors, compareBranches.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::{self, RpcError};
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

fn internal(e: impl std::fmt::Display) -> RpcError {
    RpcError::Internal {
        message: e.to_string(),
    }
}

/// Get the full event DAG for a session, for client-side tree rendering.
pub struct GetVisualizationHandler;

#[async_trait]
impl MethodHandler for GetVisualizationHandler {
    #[instrument(skip(self, ctx), fields(method = "tree.getVisualization", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let events = ctx
            .event_store
            .get_events_by_session(&session_id, &Default::default())
            .map_err(internal)?;
        let branches = ctx.event_store.get_branches(&session_id).map_err(internal)?;

        Ok(serde_json::json!({
            "sessionId": session_id,
            "events": events,
            "branches": branches,
        }))
    }
}

/// Get branches for a session.
pub struct GetBranchesHandler;

#[async_trait]
impl MethodHandler for GetBranchesHandler {
    #[instrument(skip(self, ctx), fields(method = "tree.getBranches", session_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let branches = ctx.event_store.get_branches(&session_id).map_err(internal)?;
        Ok(serde_json::json!({ "branches": branches }))
    }
}

/// Get a subtree (the event plus all descendants) rooted at a specific event.
pub struct GetSubtreeHandler;

#[async_trait]
impl MethodHandler for GetSubtreeHandler {
    #[instrument(skip(self, ctx), fields(event_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let event_id = require_string_param(params.as_ref(), "eventId")?;
        let root = ctx
            .event_store
            .get_event(&event_id)
            .map_err(internal)?
            .ok_or_else(|| RpcError::NotFound {
                code: errors::NOT_FOUND.into(),
                message: format!("Event '{event_id}' not found"),
            })?;
        let descendants = ctx.event_store.get_descendants(&event_id).map_err(internal)?;

        Ok(serde_json::json!({
            "root": root,
            "descendants": descendants,
        }))
    }
}

/// Get the ancestor chain (root to event, inclusive) for an event.
pub struct GetAncestorsHandler;

#[async_trait]
impl MethodHandler for GetAncestorsHandler {
    #[instrument(skip(self, ctx), fields(event_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let event_id = require_string_param(params.as_ref(), "eventId")?;
        let ancestors = ctx.event_store.get_ancestors(&event_id).map_err(internal)?;
        Ok(serde_json::json!({ "ancestors": ancestors }))
    }
}

/// Compare two branches of a session: their common ancestor and the events unique to each.
pub struct CompareBranchesHandler;

#[async_trait]
impl MethodHandler for CompareBranchesHandler {
    #[instrument(skip(self, ctx), fields(session_id, branch_a, branch_b))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let branch_a_id = require_string_param(params.as_ref(), "branchA")?;
        let branch_b_id = require_string_param(params.as_ref(), "branchB")?;

        let branches = ctx.event_store.get_branches(&session_id).map_err(internal)?;
        let branch_a = branches
            .iter()
            .find(|b| b.id == branch_a_id)
            .ok_or_else(|| RpcError::NotFound {
                code: errors::NOT_FOUND.into(),
                message: format!("Branch '{branch_a_id}' not found"),
            })?;
        let branch_b = branches
            .iter()
            .find(|b| b.id == branch_b_id)
            .ok_or_else(|| RpcError::NotFound {
                code: errors::NOT_FOUND.into(),
                message: format!("Branch '{branch_b_id}' not found"),
            })?;

        let ancestors_a = ctx
            .event_store
            .get_ancestors(&branch_a.head_event_id)
            .map_err(internal)?;
        let ancestors_b = ctx
            .event_store
            .get_ancestors(&branch_b.head_event_id)
            .map_err(internal)?;

        let ids_b: HashSet<&str> = ancestors_b.iter().map(|e| e.id.as_str()).collect();
        let ids_a: HashSet<&str> = ancestors_a.iter().map(|e| e.id.as_str()).collect();

        let common_ancestor = ancestors_a
            .iter()
            .rev()
            .find(|e| ids_b.contains(e.id.as_str()))
            .map(|e| e.id.clone());

        let unique_to_a: Vec<_> = ancestors_a
            .iter()
            .filter(|e| !ids_b.contains(e.id.as_str()))
            .cloned()
            .collect();
        let unique_to_b: Vec<_> = ancestors_b
            .iter()
            .filter(|e| !ids_a.contains(e.id.as_str()))
            .cloned()
            .collect();

        Ok(serde_json::json!({
            "commonAncestor": common_ancestor,
            "uniqueToA": unique_to_a,
            "uniqueToB": unique_to_b,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::make_test_context;
    use serde_json::json;

    #[tokio::test]
    async fn get_visualization_success() {
        let ctx = make_test_context();
        let sid = ctx
            .session_manager
            .create_session("m", "/tmp", Some("t"))
            .unwrap();
        let result = GetVisualizationHandler
            .handle(Some(json!({"sessionId": sid})), &ctx)
            .await
            .unwrap();
        assert!(result["events"].is_array());
        assert!(result["branches"].is_array());
    }

    #[tokio::test]
    async fn get_visualization_missing_param() {
        let ctx = make_test_context();
        let err = GetVisualizationHandler
            .handle(Some(json!({})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn get_branches_success() {
        let ctx = make_test_context();
        let sid = ctx
            .session_manager
            .create_session("m", "/tmp", Some("t"))
            .unwrap();
        let result = GetBranchesHandler
            .handle(Some(json!({"sessionId": sid})), &ctx)
            .await
            .unwrap();
        assert!(result["branches"].is_array());
    }

    #[tokio::test]
    async fn get_subtree_missing_param() {
        let ctx = make_test_context();
        let err = GetSubtreeHandler
            .handle(Some(json!({})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn get_subtree_not_found() {
        let ctx = make_test_context();
        let err = GetSubtreeHandler
            .handle(Some(json!({"eventId": "nope"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn get_ancestors_empty_for_unknown_event() {
        let ctx = make_test_context();
        let result = GetAncestorsHandler
            .handle(Some(json!({"eventId": "nope"})), &ctx)
            .await
            .unwrap();
        assert!(result["ancestors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn compare_branches_missing_param() {
        let ctx = make_test_context();
        let err = CompareBranchesHandler
            .handle(Some(json!({"sessionId": "s1", "branchA": "a"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn compare_branches_not_found() {
        let ctx = make_test_context();
        let sid = ctx
            .session_manager
            .create_session("m", "/tmp", Some("t"))
            .unwrap();
        let err = CompareBranchesHandler
            .handle(
                Some(json!({"sessionId": sid, "branchA": "a", "branchB": "b"})),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
