//! Skills handlers: list, get, refresh, remove.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use tron_events::AppendOptions;
use tron_skills::types::SkillSource;

use crate::context::RpcContext;
use crate::errors::{self, RpcError};
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

fn opt_source(params: Option<&Value>) -> Option<SkillSource> {
    params
        .and_then(|p| p.get("source"))
        .and_then(Value::as_str)
        .and_then(|s| match s {
            "global" => Some(SkillSource::Global),
            "project" => Some(SkillSource::Project),
            _ => None,
        })
}

/// List available skills, optionally filtered by source.
pub struct ListSkillsHandler;

#[async_trait]
impl MethodHandler for ListSkillsHandler {
    #[instrument(skip(self, ctx), fields(method = "skill.list"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let source = opt_source(params.as_ref());
        let skills = ctx.skill_registry.read().list(source);
        Ok(serde_json::json!({ "skills": skills }))
    }
}

/// Get a specific skill by name, with full content.
pub struct GetSkillHandler;

#[async_trait]
impl MethodHandler for GetSkillHandler {
    #[instrument(skip(self, ctx), fields(method = "skill.get", name))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let name = require_string_param(params.as_ref(), "name")?;
        let registry = ctx.skill_registry.read();
        let skill = registry.get(&name).ok_or_else(|| RpcError::NotFound {
            code: errors::NOT_FOUND.into(),
            message: format!("Skill '{name}' not found"),
        })?;
        serde_json::to_value(skill).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

/// Refresh skills from disk for the given working directory.
pub struct RefreshSkillsHandler;

#[async_trait]
impl MethodHandler for RefreshSkillsHandler {
    #[instrument(skip(self, ctx), fields(method = "skill.refresh"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let working_directory = require_string_param(params.as_ref(), "workingDirectory")?;
        ctx.skill_registry.write().refresh(&working_directory);
        let count = ctx.skill_registry.read().size();
        Ok(serde_json::json!({ "refreshed": true, "count": count }))
    }
}

/// Remove a skill from an active session, recording a `skill.removed` event.
pub struct RemoveSkillHandler;

#[async_trait]
impl MethodHandler for RemoveSkillHandler {
    #[instrument(skip(self, ctx), fields(method = "skill.remove", session_id, name))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let name = require_string_param(params.as_ref(), "name")?;

        ctx.session_manager
            .get_session(&session_id)
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?
            .ok_or_else(|| RpcError::NotFound {
                code: errors::SESSION_NOT_FOUND.into(),
                message: format!("Session '{session_id}' not found"),
            })?;

        ctx.event_store
            .append(&AppendOptions {
                session_id: &session_id,
                event_type: tron_events::EventType::SkillRemoved,
                payload: serde_json::json!({
                    "skillName": name,
                    "removedVia": "manual",
                }),
                parent_id: None,
            })
            .map_err(|e| RpcError::Internal {
                message: e.to_string(),
            })?;

        Ok(serde_json::json!({ "removed": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::make_test_context;
    use serde_json::json;
    use tron_skills::types::{SkillFrontmatter, SkillMetadata};

    fn make_skill(name: &str, source: SkillSource) -> SkillMetadata {
        SkillMetadata {
            name: name.to_string(),
            display_name: name.to_string(),
            description: format!("{name} skill"),
            content: format!("{name} content"),
            frontmatter: SkillFrontmatter::default(),
            source,
            path: String::new(),
            skill_md_path: String::new(),
            additional_files: Vec::new(),
            last_modified: 0,
        }
    }

    #[tokio::test]
    async fn list_skills_empty() {
        let ctx = make_test_context();
        let result = ListSkillsHandler.handle(None, &ctx).await.unwrap();
        assert!(result["skills"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_skills_returns_inserted() {
        let ctx = make_test_context();
        ctx.skill_registry
            .write()
            .insert(make_skill("alpha", SkillSource::Global));
        let result = ListSkillsHandler.handle(None, &ctx).await.unwrap();
        let skills = result["skills"].as_array().unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0]["name"], "alpha");
    }

    #[tokio::test]
    async fn list_skills_filters_by_source() {
        let ctx = make_test_context();
        ctx.skill_registry
            .write()
            .insert(make_skill("alpha", SkillSource::Global));
        ctx.skill_registry
            .write()
            .insert(make_skill("beta", SkillSource::Project));
        let result = ListSkillsHandler
            .handle(Some(json!({ "source": "project" })), &ctx)
            .await
            .unwrap();
        let skills = result["skills"].as_array().unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0]["name"], "beta");
    }

    #[tokio::test]
    async fn get_skill_requires_name() {
        let ctx = make_test_context();
        let err = GetSkillHandler
            .handle(Some(json!({})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn get_skill_not_found() {
        let ctx = make_test_context();
        let err = GetSkillHandler
            .handle(Some(json!({ "name": "nonexistent" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn get_skill_returns_full_content() {
        let ctx = make_test_context();
        ctx.skill_registry
            .write()
            .insert(make_skill("alpha", SkillSource::Global));
        let result = GetSkillHandler
            .handle(Some(json!({ "name": "alpha" })), &ctx)
            .await
            .unwrap();
        assert_eq!(result["content"], "alpha content");
    }

    #[tokio::test]
    async fn refresh_skills_requires_working_directory() {
        let ctx = make_test_context();
        let err = RefreshSkillsHandler
            .handle(None, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn refresh_skills_clears_stale_entries() {
        let ctx = make_test_context();
        ctx.skill_registry
            .write()
            .insert(make_skill("stale", SkillSource::Global));
        let dir = tempfile::tempdir().unwrap();
        let result = RefreshSkillsHandler
            .handle(
                Some(json!({ "workingDirectory": dir.path().to_str().unwrap() })),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result["refreshed"], true);
        assert!(!ctx.skill_registry.read().has("stale"));
    }

    #[tokio::test]
    async fn remove_skill_requires_name() {
        let ctx = make_test_context();
        let err = RemoveSkillHandler
            .handle(Some(json!({ "sessionId": "s1" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn remove_skill_requires_known_session() {
        let ctx = make_test_context();
        let err = RemoveSkillHandler
            .handle(
                Some(json!({ "sessionId": "nonexistent", "name": "alpha" })),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SESSION_NOT_FOUND");
    }
}
