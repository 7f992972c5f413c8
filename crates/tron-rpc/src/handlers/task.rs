//! Task, project, and area handlers (PARA model), backed by `tron-tasks`.

use async_trait::async_trait;
use serde_json::Value;
use tron_tasks::{
    AreaCreateParams, AreaFilter, AreaUpdateParams, ProjectCreateParams, ProjectFilter,
    ProjectUpdateParams, TaskCreateParams, TaskError, TaskFilter, TaskPriority, TaskRepository,
    TaskService, TaskSource, TaskStatus, TaskUpdateParams,
};

use crate::context::RpcContext;
use crate::errors::{self, RpcError};
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

/// Map a `TaskError` onto the RPC error surface.
fn task_err(err: TaskError) -> RpcError {
    match err {
        TaskError::TaskNotFound(_) | TaskError::ProjectNotFound(_) | TaskError::AreaNotFound(_) => {
            RpcError::NotFound {
                code: errors::NOT_FOUND.into(),
                message: err.to_string(),
            }
        }
        TaskError::Hierarchy(_) | TaskError::Validation(_) => RpcError::InvalidParams {
            message: err.to_string(),
        },
        TaskError::CircularDependency { .. } => RpcError::Custom {
            code: "CIRCULAR_DEPENDENCY".into(),
            message: err.to_string(),
            details: None,
        },
        TaskError::Sqlite(_) => RpcError::Internal {
            message: err.to_string(),
        },
    }
}

/// Borrow a pooled connection from the task database, or `NOT_AVAILABLE` if
/// no task database was configured for this server.
fn conn(ctx: &RpcContext) -> Result<tron_events::PooledConnection, RpcError> {
    let pool = ctx.task_pool.as_ref().ok_or_else(|| RpcError::NotAvailable {
        message: "Task management is not configured".into(),
    })?;
    pool.get().map_err(|e| RpcError::Internal {
        message: format!("Failed to acquire task database connection: {e}"),
    })
}

fn opt_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(String::from)
}

fn opt_i32(params: &Value, key: &str) -> Option<i32> {
    params.get(key).and_then(Value::as_i64).and_then(|v| i32::try_from(v).ok())
}

fn opt_u32(params: &Value, key: &str, default: u32) -> u32 {
    params
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

fn opt_tags(params: &Value, key: &str) -> Option<Vec<String>> {
    params.get(key).and_then(Value::as_array).map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    })
}

fn opt_status(params: &Value, key: &str) -> Option<TaskStatus> {
    opt_str(params, key).and_then(|s| serde_json::from_value(Value::String(s)).ok())
}

fn opt_priority(params: &Value, key: &str) -> Option<TaskPriority> {
    opt_str(params, key).and_then(|s| serde_json::from_value(Value::String(s)).ok())
}

fn opt_source(params: &Value, key: &str) -> Option<TaskSource> {
    opt_str(params, key).and_then(|s| serde_json::from_value(Value::String(s)).ok())
}

fn opt_project_status(params: &Value, key: &str) -> Option<tron_tasks::ProjectStatus> {
    opt_str(params, key).and_then(|s| serde_json::from_value(Value::String(s)).ok())
}

fn opt_area_status(params: &Value, key: &str) -> Option<tron_tasks::AreaStatus> {
    opt_str(params, key).and_then(|s| serde_json::from_value(Value::String(s)).ok())
}

// ── Tasks ───────────────────────────────────────────────────────────────

/// Create a new task.
pub struct CreateTaskHandler;

#[async_trait]
impl MethodHandler for CreateTaskHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let title = require_string_param(params.as_ref(), "title")?;
        let p = params.unwrap_or(Value::Null);
        let conn = conn(ctx)?;
        let create_params = TaskCreateParams {
            title,
            description: opt_str(&p, "description"),
            active_form: opt_str(&p, "activeForm"),
            status: opt_status(&p, "status"),
            priority: opt_priority(&p, "priority"),
            source: opt_source(&p, "source"),
            tags: opt_tags(&p, "tags"),
            due_date: opt_str(&p, "dueDate"),
            deferred_until: opt_str(&p, "deferredUntil"),
            estimated_minutes: opt_i32(&p, "estimatedMinutes"),
            workspace_id: opt_str(&p, "workspaceId"),
            project_id: opt_str(&p, "projectId"),
            parent_task_id: opt_str(&p, "parentTaskId"),
            area_id: opt_str(&p, "areaId"),
            created_by_session_id: opt_str(&p, "sessionId"),
            metadata: p.get("metadata").cloned(),
        };
        let task = TaskService::create_task(&conn, &create_params).map_err(task_err)?;
        serde_json::to_value(&task).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Get a task with subtasks, dependencies, and recent activity.
pub struct GetTaskHandler;

#[async_trait]
impl MethodHandler for GetTaskHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let task_id = require_string_param(params.as_ref(), "taskId")?;
        let conn = conn(ctx)?;
        let details = TaskService::get_task(&conn, &task_id).map_err(task_err)?;
        serde_json::to_value(&details).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Update a task.
pub struct UpdateTaskHandler;

#[async_trait]
impl MethodHandler for UpdateTaskHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let task_id = require_string_param(params.as_ref(), "taskId")?;
        let p = params.unwrap_or(Value::Null);
        let conn = conn(ctx)?;
        let updates = TaskUpdateParams {
            title: opt_str(&p, "title"),
            description: opt_str(&p, "description"),
            active_form: opt_str(&p, "activeForm"),
            status: opt_status(&p, "status"),
            priority: opt_priority(&p, "priority"),
            project_id: opt_str(&p, "projectId"),
            parent_task_id: opt_str(&p, "parentTaskId"),
            area_id: opt_str(&p, "areaId"),
            due_date: opt_str(&p, "dueDate"),
            deferred_until: opt_str(&p, "deferredUntil"),
            estimated_minutes: opt_i32(&p, "estimatedMinutes"),
            last_session_id: opt_str(&p, "sessionId"),
            metadata: p.get("metadata").cloned(),
            add_tags: opt_tags(&p, "addTags"),
            remove_tags: opt_tags(&p, "removeTags"),
            add_note: opt_str(&p, "note"),
        };
        let session_id = opt_str(&p, "sessionId");
        let task = TaskService::update_task(&conn, &task_id, &updates, session_id.as_deref())
            .map_err(task_err)?;
        serde_json::to_value(&task).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// List tasks with filters.
pub struct ListTasksHandler;

#[async_trait]
impl MethodHandler for ListTasksHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let p = params.unwrap_or(Value::Null);
        let conn = conn(ctx)?;
        let filter = TaskFilter {
            status: opt_status(&p, "status"),
            priority: opt_priority(&p, "priority"),
            project_id: opt_str(&p, "projectId"),
            workspace_id: opt_str(&p, "workspaceId"),
            area_id: opt_str(&p, "areaId"),
            parent_task_id: opt_str(&p, "parentTaskId"),
            due_before: opt_str(&p, "dueBefore"),
            tags: opt_tags(&p, "tags"),
            include_completed: p.get("includeCompleted").and_then(Value::as_bool).unwrap_or(false),
            include_deferred: p.get("includeDeferred").and_then(Value::as_bool).unwrap_or(false),
            include_backlog: p.get("includeBacklog").and_then(Value::as_bool).unwrap_or(false),
        };
        let limit = opt_u32(&p, "limit", 50);
        let offset = opt_u32(&p, "offset", 0);
        let result = TaskRepository::list_tasks(&conn, &filter, limit, offset).map_err(task_err)?;
        serde_json::to_value(&result).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Delete a task.
pub struct DeleteTaskHandler;

#[async_trait]
impl MethodHandler for DeleteTaskHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let task_id = require_string_param(params.as_ref(), "taskId")?;
        let session_id = params
            .as_ref()
            .and_then(|p| p.get("sessionId"))
            .and_then(Value::as_str)
            .map(String::from);
        let conn = conn(ctx)?;
        let deleted = TaskService::delete_task(&conn, &task_id, session_id.as_deref())
            .map_err(task_err)?;
        Ok(serde_json::json!({ "deleted": deleted, "taskId": task_id }))
    }
}

/// Full-text search over tasks.
pub struct SearchTasksHandler;

#[async_trait]
impl MethodHandler for SearchTasksHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let query = require_string_param(params.as_ref(), "query")?;
        let limit = params
            .as_ref()
            .map(|p| opt_u32(p, "limit", 20))
            .unwrap_or(20);
        let conn = conn(ctx)?;
        let tasks = TaskRepository::search_tasks(&conn, &query, limit).map_err(task_err)?;
        serde_json::to_value(&tasks).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Get the activity log for a task.
pub struct GetTaskActivityHandler;

#[async_trait]
impl MethodHandler for GetTaskActivityHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let task_id = require_string_param(params.as_ref(), "taskId")?;
        let limit = params
            .as_ref()
            .map(|p| opt_u32(p, "limit", 20))
            .unwrap_or(20);
        let conn = conn(ctx)?;
        let activity = TaskRepository::get_activity(&conn, &task_id, limit).map_err(task_err)?;
        serde_json::to_value(&activity).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

// ── Projects ────────────────────────────────────────────────────────────

/// Create a project.
pub struct CreateProjectHandler;

#[async_trait]
impl MethodHandler for CreateProjectHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let title = require_string_param(params.as_ref(), "title")?;
        let p = params.unwrap_or(Value::Null);
        let conn = conn(ctx)?;
        let create_params = ProjectCreateParams {
            title,
            description: opt_str(&p, "description"),
            status: opt_project_status(&p, "status"),
            area_id: opt_str(&p, "areaId"),
            workspace_id: opt_str(&p, "workspaceId"),
            tags: opt_tags(&p, "tags"),
            metadata: p.get("metadata").cloned(),
        };
        let project = TaskService::create_project(&conn, &create_params).map_err(task_err)?;
        serde_json::to_value(&project).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// List projects with aggregated progress counts.
pub struct ListProjectsHandler;

#[async_trait]
impl MethodHandler for ListProjectsHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let p = params.unwrap_or(Value::Null);
        let conn = conn(ctx)?;
        let filter = ProjectFilter {
            status: opt_project_status(&p, "status"),
            workspace_id: opt_str(&p, "workspaceId"),
            area_id: opt_str(&p, "areaId"),
        };
        let limit = opt_u32(&p, "limit", 50);
        let offset = opt_u32(&p, "offset", 0);
        let result = TaskRepository::list_projects(&conn, &filter, limit, offset).map_err(task_err)?;
        serde_json::to_value(&result).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Get a single project.
pub struct GetProjectHandler;

#[async_trait]
impl MethodHandler for GetProjectHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let project_id = require_string_param(params.as_ref(), "projectId")?;
        let conn = conn(ctx)?;
        let project = TaskRepository::get_project(&conn, &project_id)
            .map_err(task_err)?
            .ok_or_else(|| task_err(TaskError::project_not_found(&project_id)))?;
        serde_json::to_value(&project).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Update a project.
pub struct UpdateProjectHandler;

#[async_trait]
impl MethodHandler for UpdateProjectHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let project_id = require_string_param(params.as_ref(), "projectId")?;
        let p = params.unwrap_or(Value::Null);
        let conn = conn(ctx)?;
        let updates = ProjectUpdateParams {
            title: opt_str(&p, "title"),
            description: opt_str(&p, "description"),
            status: opt_project_status(&p, "status"),
            area_id: opt_str(&p, "areaId"),
            metadata: p.get("metadata").cloned(),
            add_tags: opt_tags(&p, "addTags"),
            remove_tags: opt_tags(&p, "removeTags"),
        };
        let project = TaskService::update_project(&conn, &project_id, &updates).map_err(task_err)?;
        serde_json::to_value(&project).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Delete a project.
pub struct DeleteProjectHandler;

#[async_trait]
impl MethodHandler for DeleteProjectHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let project_id = require_string_param(params.as_ref(), "projectId")?;
        let conn = conn(ctx)?;
        let deleted = TaskRepository::delete_project(&conn, &project_id).map_err(task_err)?;
        Ok(serde_json::json!({ "deleted": deleted, "projectId": project_id }))
    }
}

/// Get a project plus its tasks and progress, for detail views.
pub struct GetProjectDetailsHandler;

#[async_trait]
impl MethodHandler for GetProjectDetailsHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let project_id = require_string_param(params.as_ref(), "projectId")?;
        let conn = conn(ctx)?;
        let project = TaskRepository::get_project(&conn, &project_id)
            .map_err(task_err)?
            .ok_or_else(|| task_err(TaskError::project_not_found(&project_id)))?;
        let filter = TaskFilter {
            project_id: Some(project_id),
            include_completed: true,
            include_deferred: true,
            include_backlog: true,
            ..Default::default()
        };
        let tasks = TaskRepository::list_tasks(&conn, &filter, 500, 0).map_err(task_err)?;
        Ok(serde_json::json!({ "project": project, "tasks": tasks.tasks, "total": tasks.total }))
    }
}

// ── Areas ───────────────────────────────────────────────────────────────

/// Create an area.
pub struct CreateAreaHandler;

#[async_trait]
impl MethodHandler for CreateAreaHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let title = require_string_param(params.as_ref(), "title")?;
        let p = params.unwrap_or(Value::Null);
        let conn = conn(ctx)?;
        let create_params = AreaCreateParams {
            title,
            description: opt_str(&p, "description"),
            status: opt_area_status(&p, "status"),
            workspace_id: opt_str(&p, "workspaceId"),
            tags: opt_tags(&p, "tags"),
            sort_order: p.get("sortOrder").and_then(Value::as_f64),
            metadata: p.get("metadata").cloned(),
        };
        let area = TaskService::create_area(&conn, &create_params).map_err(task_err)?;
        serde_json::to_value(&area).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// List areas with aggregated counts.
pub struct ListAreasHandler;

#[async_trait]
impl MethodHandler for ListAreasHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let p = params.unwrap_or(Value::Null);
        let conn = conn(ctx)?;
        let filter = AreaFilter {
            status: opt_area_status(&p, "status"),
            workspace_id: opt_str(&p, "workspaceId"),
        };
        let limit = opt_u32(&p, "limit", 50);
        let offset = opt_u32(&p, "offset", 0);
        let result = TaskRepository::list_areas(&conn, &filter, limit, offset).map_err(task_err)?;
        serde_json::to_value(&result).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Get a single area.
pub struct GetAreaHandler;

#[async_trait]
impl MethodHandler for GetAreaHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let area_id = require_string_param(params.as_ref(), "areaId")?;
        let conn = conn(ctx)?;
        let area = TaskRepository::get_area(&conn, &area_id)
            .map_err(task_err)?
            .ok_or_else(|| task_err(TaskError::area_not_found(&area_id)))?;
        serde_json::to_value(&area).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Update an area.
pub struct UpdateAreaHandler;

#[async_trait]
impl MethodHandler for UpdateAreaHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let area_id = require_string_param(params.as_ref(), "areaId")?;
        let p = params.unwrap_or(Value::Null);
        let conn = conn(ctx)?;
        let updates = AreaUpdateParams {
            title: opt_str(&p, "title"),
            description: opt_str(&p, "description"),
            status: opt_area_status(&p, "status"),
            sort_order: p.get("sortOrder").and_then(Value::as_f64),
            metadata: p.get("metadata").cloned(),
            add_tags: opt_tags(&p, "addTags"),
            remove_tags: opt_tags(&p, "removeTags"),
        };
        let area = TaskRepository::update_area(&conn, &area_id, &updates)
            .map_err(task_err)?
            .ok_or_else(|| task_err(TaskError::area_not_found(&area_id)))?;
        serde_json::to_value(&area).map_err(|e| RpcError::Internal { message: e.to_string() })
    }
}

/// Delete an area.
pub struct DeleteAreaHandler;

#[async_trait]
impl MethodHandler for DeleteAreaHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let area_id = require_string_param(params.as_ref(), "areaId")?;
        let conn = conn(ctx)?;
        let deleted = TaskRepository::delete_area(&conn, &area_id).map_err(task_err)?;
        Ok(serde_json::json!({ "deleted": deleted, "areaId": area_id }))
    }
}

// Note: dependency management (`addDependency`/`removeDependency`) is
// exercised only via the `TaskManager` tool (see
// `tron-agent::providers::sqlite_task_manager`), not exposed directly over
// RPC — matching the method families actually registered in `mod.rs`.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::make_test_context_with_tasks;
    use serde_json::json;

    #[tokio::test]
    async fn create_task_without_pool_is_not_available() {
        let ctx = crate::handlers::test_helpers::make_test_context();
        let err = CreateTaskHandler
            .handle(Some(json!({"title": "my task"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), errors::NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn create_task_success() {
        let ctx = make_test_context_with_tasks();
        let result = CreateTaskHandler
            .handle(Some(json!({"title": "my task"})), &ctx)
            .await
            .unwrap();
        assert!(result["id"].is_string());
        assert_eq!(result["title"], "my task");
    }

    #[tokio::test]
    async fn create_task_missing_title() {
        let ctx = make_test_context_with_tasks();
        let err = CreateTaskHandler
            .handle(Some(json!({})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn get_and_update_task_roundtrip() {
        let ctx = make_test_context_with_tasks();
        let created = CreateTaskHandler
            .handle(Some(json!({"title": "a task"})), &ctx)
            .await
            .unwrap();
        let task_id = created["id"].as_str().unwrap().to_string();

        let fetched = GetTaskHandler
            .handle(Some(json!({"taskId": task_id})), &ctx)
            .await
            .unwrap();
        assert_eq!(fetched["title"], "a task");

        let updated = UpdateTaskHandler
            .handle(
                Some(json!({"taskId": task_id, "status": "in_progress"})),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(updated["status"], "in_progress");
        assert!(updated["startedAt"].is_string() || updated["started_at"].is_string());
    }

    #[tokio::test]
    async fn get_task_not_found() {
        let ctx = make_test_context_with_tasks();
        let err = GetTaskHandler
            .handle(Some(json!({"taskId": "task-missing"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), errors::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_tasks_excludes_completed_by_default() {
        let ctx = make_test_context_with_tasks();
        let created = CreateTaskHandler
            .handle(Some(json!({"title": "finish me"})), &ctx)
            .await
            .unwrap();
        let task_id = created["id"].as_str().unwrap().to_string();
        UpdateTaskHandler
            .handle(
                Some(json!({"taskId": task_id, "status": "completed"})),
                &ctx,
            )
            .await
            .unwrap();

        let listed = ListTasksHandler.handle(Some(json!({})), &ctx).await.unwrap();
        let tasks = listed["tasks"].as_array().unwrap();
        assert!(tasks.is_empty());

        let listed_all = ListTasksHandler
            .handle(Some(json!({"includeCompleted": true})), &ctx)
            .await
            .unwrap();
        assert_eq!(listed_all["tasks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_task_missing_id() {
        let ctx = make_test_context_with_tasks();
        let err = DeleteTaskHandler
            .handle(Some(json!({})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn delete_task_success() {
        let ctx = make_test_context_with_tasks();
        let created = CreateTaskHandler
            .handle(Some(json!({"title": "to delete"})), &ctx)
            .await
            .unwrap();
        let task_id = created["id"].as_str().unwrap().to_string();
        let result = DeleteTaskHandler
            .handle(Some(json!({"taskId": task_id})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["deleted"], true);
    }

    #[tokio::test]
    async fn search_tasks_finds_match() {
        let ctx = make_test_context_with_tasks();
        CreateTaskHandler
            .handle(Some(json!({"title": "find the dedup index"})), &ctx)
            .await
            .unwrap();
        let result = SearchTasksHandler
            .handle(Some(json!({"query": "dedup"})), &ctx)
            .await
            .unwrap();
        assert_eq!(result.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn project_crud_roundtrip() {
        let ctx = make_test_context_with_tasks();
        let created = CreateProjectHandler
            .handle(Some(json!({"title": "Q3 launch"})), &ctx)
            .await
            .unwrap();
        let project_id = created["id"].as_str().unwrap().to_string();

        let fetched = GetProjectHandler
            .handle(Some(json!({"projectId": project_id})), &ctx)
            .await
            .unwrap();
        assert_eq!(fetched["title"], "Q3 launch");

        let updated = UpdateProjectHandler
            .handle(
                Some(json!({"projectId": project_id, "status": "completed"})),
                &ctx,
            )
            .await
            .unwrap();
        assert!(updated["completedAt"].is_string() || updated["completed_at"].is_string());

        let listed = ListProjectsHandler.handle(Some(json!({})), &ctx).await.unwrap();
        assert_eq!(listed["total"], 1);

        let deleted = DeleteProjectHandler
            .handle(Some(json!({"projectId": project_id})), &ctx)
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], true);
    }

    #[tokio::test]
    async fn project_details_includes_tasks() {
        let ctx = make_test_context_with_tasks();
        let project = CreateProjectHandler
            .handle(Some(json!({"title": "Migration"})), &ctx)
            .await
            .unwrap();
        let project_id = project["id"].as_str().unwrap().to_string();
        CreateTaskHandler
            .handle(
                Some(json!({"title": "migrate table", "projectId": project_id})),
                &ctx,
            )
            .await
            .unwrap();

        let details = GetProjectDetailsHandler
            .handle(Some(json!({"projectId": project_id})), &ctx)
            .await
            .unwrap();
        assert_eq!(details["total"], 1);
    }

    #[tokio::test]
    async fn area_crud_roundtrip() {
        let ctx = make_test_context_with_tasks();
        let created = CreateAreaHandler
            .handle(Some(json!({"title": "Health"})), &ctx)
            .await
            .unwrap();
        let area_id = created["id"].as_str().unwrap().to_string();

        let fetched = GetAreaHandler
            .handle(Some(json!({"areaId": area_id})), &ctx)
            .await
            .unwrap();
        assert_eq!(fetched["title"], "Health");

        let updated = UpdateAreaHandler
            .handle(
                Some(json!({"areaId": area_id, "title": "Wellness"})),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(updated["title"], "Wellness");

        let listed = ListAreasHandler.handle(Some(json!({})), &ctx).await.unwrap();
        assert_eq!(listed["total"], 1);

        let deleted = DeleteAreaHandler
            .handle(Some(json!({"areaId": area_id})), &ctx)
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], true);
    }

    #[tokio::test]
    async fn area_update_missing_is_not_found() {
        let ctx = make_test_context_with_tasks();
        let err = UpdateAreaHandler
            .handle(
                Some(json!({"areaId": "area-missing", "title": "x"})),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), errors::NOT_FOUND);
    }
}
