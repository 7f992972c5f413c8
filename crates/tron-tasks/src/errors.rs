//! Error types for the task management subsystem.

use thiserror::Error;

/// Errors that can occur during task, project, or area operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Requested task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// Requested project was not found.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Requested area was not found.
    #[error("area not found: {0}")]
    AreaNotFound(String),

    /// Violates the 2-level task hierarchy (a subtask cannot have subtasks).
    #[error("{0}")]
    Hierarchy(String),

    /// Adding this dependency would create a cycle in the `blocks` graph.
    #[error("Circular dependency: {blocker_id} already depends on {blocked_id}")]
    CircularDependency {
        /// Task that would become the blocker.
        blocker_id: String,
        /// Task that would become blocked.
        blocked_id: String,
    },

    /// Input failed validation (e.g. empty required field).
    #[error("{0}")]
    Validation(String),
}

impl TaskError {
    /// Build a [`TaskError::TaskNotFound`] for the given id.
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound(id.into())
    }

    /// Build a [`TaskError::ProjectNotFound`] for the given id.
    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::ProjectNotFound(id.into())
    }

    /// Build a [`TaskError::AreaNotFound`] for the given id.
    pub fn area_not_found(id: impl Into<String>) -> Self {
        Self::AreaNotFound(id.into())
    }
}

/// Convenience type alias for task subsystem results.
pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_not_found_display() {
        let err = TaskError::task_not_found("task-1");
        assert!(err.to_string().contains("task-1"));
    }

    #[test]
    fn circular_dependency_display_contains_circular() {
        let err = TaskError::CircularDependency {
            blocker_id: "task-a".to_string(),
            blocked_id: "task-b".to_string(),
        };
        assert!(err.to_string().contains("Circular"));
    }

    #[test]
    fn sqlite_error_from_conversion() {
        let err: TaskError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, TaskError::Sqlite(_)));
    }
}
