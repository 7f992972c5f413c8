//! Task, project, and area CRUD with `SQLite` persistence.
//!
//! Thin re-export of the [`tron_tasks`] crate so turn-orchestration code can
//! reach the task subsystem as `tron_runtime::tasks::*` without every call
//! site depending on `tron-tasks` directly.

pub use tron_tasks::{
    build_task_context, context, errors, migrations, repository, service, types, TaskError,
    TaskRepository, TaskService,
};
pub use tron_tasks::types::*;
