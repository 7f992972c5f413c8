//! Types for tasks, projects, and areas (the PARA model).

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Parked, not yet actionable.
    Backlog,
    /// Actionable, not started.
    Pending,
    /// Actively being worked.
    InProgress,
    /// Finished.
    Completed,
    /// Abandoned.
    Cancelled,
}

impl TaskStatus {
    /// SQL-column representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether this status is a terminal (no-more-work) state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Urgency of a task, used to order work queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Can wait.
    Low,
    /// Default priority.
    Medium,
    /// Should be worked soon.
    High,
    /// Drop everything.
    Critical,
}

impl TaskPriority {
    /// SQL-column representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Who or what created a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    /// Created by the agent during a turn.
    Agent,
    /// Created directly by the user.
    User,
    /// Created by a skill invocation.
    Skill,
    /// Created by an internal system process.
    System,
}

impl TaskSource {
    /// SQL-column representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::User => "user",
            Self::Skill => "skill",
            Self::System => "system",
        }
    }
}

/// Lifecycle state of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Actively worked.
    Active,
    /// Temporarily on hold.
    Paused,
    /// Finished.
    Completed,
    /// Retired without completion.
    Archived,
}

impl ProjectStatus {
    /// SQL-column representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

/// Lifecycle state of an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaStatus {
    /// Currently maintained.
    Active,
    /// No longer maintained.
    Archived,
}

impl AreaStatus {
    /// SQL-column representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

/// Relationship between two tasks in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyRelationship {
    /// The blocker must complete before the blocked task can start.
    Blocks,
    /// Informational link with no ordering constraint.
    Related,
}

impl DependencyRelationship {
    /// SQL-column representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Related => "related",
        }
    }
}

/// Kind of mutation recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    /// Entity was created.
    Created,
    /// A field other than status changed.
    Updated,
    /// `status` changed.
    StatusChanged,
    /// A note was appended.
    NoteAdded,
    /// Time was logged against the task.
    TimeLogged,
    /// A dependency was added.
    DependencyAdded,
    /// A dependency was removed.
    DependencyRemoved,
    /// Task moved between project/area.
    Moved,
    /// Entity was deleted.
    Deleted,
}

impl ActivityAction {
    /// SQL-column representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::StatusChanged => "status_changed",
            Self::NoteAdded => "note_added",
            Self::TimeLogged => "time_logged",
            Self::DependencyAdded => "dependency_added",
            Self::DependencyRemoved => "dependency_removed",
            Self::Moved => "moved",
            Self::Deleted => "deleted",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of work, optionally scoped to a project and/or area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Primary key (`task-<uuidv7>`).
    pub id: String,
    /// Parent project, if any.
    pub project_id: Option<String>,
    /// Parent task, if this is a subtask (max one level deep).
    pub parent_task_id: Option<String>,
    /// Owning workspace.
    pub workspace_id: Option<String>,
    /// Owning area, if not routed through a project.
    pub area_id: Option<String>,
    /// Short imperative title.
    pub title: String,
    /// Longer free-form description.
    pub description: Option<String>,
    /// Present-continuous form shown while `InProgress` (e.g. "Fixing the bug").
    pub active_form: Option<String>,
    /// Freeform, timestamped notes appended over time.
    pub notes: Option<String>,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Urgency.
    pub priority: TaskPriority,
    /// Origin of the task.
    pub source: TaskSource,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// ISO-8601 date the task is due.
    pub due_date: Option<String>,
    /// ISO-8601 timestamp until which the task is deferred.
    pub deferred_until: Option<String>,
    /// When work started (auto-set on transition to `InProgress`).
    pub started_at: Option<String>,
    /// When work finished (auto-set on transition to a terminal status).
    pub completed_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
    /// Estimated effort in minutes.
    pub estimated_minutes: Option<i32>,
    /// Actual time logged in minutes.
    pub actual_minutes: i32,
    /// Session that created the task.
    pub created_by_session_id: Option<String>,
    /// Most recent session to touch the task.
    pub last_session_id: Option<String>,
    /// Timestamp of the most recent session touch.
    pub last_session_at: Option<String>,
    /// Manual ordering weight among siblings.
    pub sort_order: f64,
    /// Arbitrary caller-defined metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Parameters for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskCreateParams {
    /// Short imperative title.
    pub title: String,
    /// Longer free-form description.
    pub description: Option<String>,
    /// Present-continuous form shown while `InProgress`.
    pub active_form: Option<String>,
    /// Initial status; defaults to [`TaskStatus::Pending`].
    pub status: Option<TaskStatus>,
    /// Initial priority; defaults to [`TaskPriority::Medium`].
    pub priority: Option<TaskPriority>,
    /// Origin of the task; defaults to [`TaskSource::Agent`].
    pub source: Option<TaskSource>,
    /// Free-form labels.
    pub tags: Option<Vec<String>>,
    /// ISO-8601 date the task is due.
    pub due_date: Option<String>,
    /// ISO-8601 timestamp until which the task is deferred.
    pub deferred_until: Option<String>,
    /// Estimated effort in minutes.
    pub estimated_minutes: Option<i32>,
    /// Owning workspace.
    pub workspace_id: Option<String>,
    /// Parent project, if any.
    pub project_id: Option<String>,
    /// Parent task, if this is a subtask.
    pub parent_task_id: Option<String>,
    /// Owning area, if not routed through a project.
    pub area_id: Option<String>,
    /// Session creating the task.
    pub created_by_session_id: Option<String>,
    /// Arbitrary caller-defined metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Parameters for updating a task. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdateParams {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New present-continuous form.
    pub active_form: Option<String>,
    /// New status; triggers `started_at`/`completed_at` auto-transitions.
    pub status: Option<TaskStatus>,
    /// New priority.
    pub priority: Option<TaskPriority>,
    /// Move to a different project (empty string clears it).
    pub project_id: Option<String>,
    /// Reparent under a different task (empty string clears it).
    pub parent_task_id: Option<String>,
    /// Move to a different area (empty string clears it).
    pub area_id: Option<String>,
    /// New due date.
    pub due_date: Option<String>,
    /// New deferral timestamp.
    pub deferred_until: Option<String>,
    /// New effort estimate.
    pub estimated_minutes: Option<i32>,
    /// Session performing the update; also stamps `last_session_at`.
    pub last_session_id: Option<String>,
    /// Replace metadata wholesale.
    pub metadata: Option<serde_json::Value>,
    /// Tags to add (deduplicated).
    pub add_tags: Option<Vec<String>>,
    /// Tags to remove.
    pub remove_tags: Option<Vec<String>>,
    /// Note to append (timestamped).
    pub add_note: Option<String>,
}

/// Filter predicate for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Restrict to this status.
    pub status: Option<TaskStatus>,
    /// Restrict to this priority.
    pub priority: Option<TaskPriority>,
    /// Restrict to this project.
    pub project_id: Option<String>,
    /// Restrict to this workspace.
    pub workspace_id: Option<String>,
    /// Restrict to this area.
    pub area_id: Option<String>,
    /// Restrict to subtasks of this parent.
    pub parent_task_id: Option<String>,
    /// Only tasks due on or before this date.
    pub due_before: Option<String>,
    /// Only tasks carrying all of these tags.
    pub tags: Option<Vec<String>>,
    /// Include `completed`/`cancelled` tasks.
    pub include_completed: bool,
    /// Include tasks currently deferred into the future.
    pub include_deferred: bool,
    /// Include tasks parked in `backlog`.
    pub include_backlog: bool,
}

/// Page of tasks plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct TaskListResult {
    /// Matching tasks for this page.
    pub tasks: Vec<Task>,
    /// Total matches across all pages.
    pub total: u32,
}

/// A task enriched with its subtasks, dependencies, and recent activity.
#[derive(Debug, Clone, Serialize)]
pub struct TaskWithDetails {
    /// The task itself.
    #[serde(flatten)]
    pub task: Task,
    /// Direct subtasks.
    pub subtasks: Vec<Task>,
    /// Dependencies blocking this task.
    pub blocked_by: Vec<TaskDependency>,
    /// Dependencies this task blocks.
    pub blocks: Vec<TaskDependency>,
    /// Most recent activity entries, newest first.
    pub recent_activity: Vec<TaskActivity>,
}

/// A directed edge between two tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDependency {
    /// The task that must resolve first (for `Blocks`).
    pub blocker_task_id: String,
    /// The task waiting on the blocker.
    pub blocked_task_id: String,
    /// Nature of the edge.
    pub relationship: DependencyRelationship,
    /// When the edge was created.
    pub created_at: String,
}

/// A single audit-trail entry for a task mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskActivity {
    /// Autoincrement row id.
    pub id: i64,
    /// Task this entry belongs to.
    pub task_id: String,
    /// Session that performed the mutation, if any.
    pub session_id: Option<String>,
    /// Event that caused the mutation, if any.
    pub event_id: Option<String>,
    /// What kind of mutation happened.
    pub action: ActivityAction,
    /// Value before the mutation.
    pub old_value: Option<String>,
    /// Value after the mutation.
    pub new_value: Option<String>,
    /// Free-form detail string.
    pub detail: Option<String>,
    /// Minutes logged, for `TimeLogged` entries.
    pub minutes_logged: Option<i32>,
    /// When the mutation happened.
    pub timestamp: String,
}

/// Parameters for appending an activity entry.
#[derive(Debug, Clone)]
pub struct LogActivityParams {
    /// Task the entry belongs to.
    pub task_id: String,
    /// Session performing the mutation.
    pub session_id: Option<String>,
    /// Event that caused the mutation.
    pub event_id: Option<String>,
    /// Kind of mutation.
    pub action: ActivityAction,
    /// Value before the mutation.
    pub old_value: Option<String>,
    /// Value after the mutation.
    pub new_value: Option<String>,
    /// Free-form detail string.
    pub detail: Option<String>,
    /// Minutes logged, for `TimeLogged` entries.
    pub minutes_logged: Option<i32>,
}

/// Snapshot of active work for LLM context injection.
#[derive(Debug, Clone, Default)]
pub struct ActiveTaskSummary {
    /// Tasks currently `InProgress`, priority-ordered.
    pub in_progress: Vec<Task>,
    /// Count of `Pending` tasks.
    pub pending_count: u32,
    /// Count of non-terminal tasks past their due date.
    pub overdue_count: u32,
    /// Count of non-terminal tasks still deferred into the future.
    pub deferred_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────────────────────────

/// A bounded effort with a defined outcome, grouping related tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Primary key (`proj-<uuidv7>`).
    pub id: String,
    /// Owning workspace.
    pub workspace_id: Option<String>,
    /// Owning area, if any.
    pub area_id: Option<String>,
    /// Short title.
    pub title: String,
    /// Longer free-form description.
    pub description: Option<String>,
    /// Current lifecycle state.
    pub status: ProjectStatus,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
    /// When the project was marked completed.
    pub completed_at: Option<String>,
    /// Arbitrary caller-defined metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Parameters for creating a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectCreateParams {
    /// Short title.
    pub title: String,
    /// Longer free-form description.
    pub description: Option<String>,
    /// Initial status; defaults to [`ProjectStatus::Active`].
    pub status: Option<ProjectStatus>,
    /// Owning area.
    pub area_id: Option<String>,
    /// Owning workspace.
    pub workspace_id: Option<String>,
    /// Free-form labels.
    pub tags: Option<Vec<String>>,
    /// Arbitrary caller-defined metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Parameters for updating a project. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectUpdateParams {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New status; transitions to/from `Completed` stamp `completed_at`.
    pub status: Option<ProjectStatus>,
    /// Move to a different area.
    pub area_id: Option<String>,
    /// Replace metadata wholesale.
    pub metadata: Option<serde_json::Value>,
    /// Tags to add (deduplicated).
    pub add_tags: Option<Vec<String>>,
    /// Tags to remove.
    pub remove_tags: Option<Vec<String>>,
}

/// Filter predicate for listing projects.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Restrict to this status.
    pub status: Option<ProjectStatus>,
    /// Restrict to this workspace.
    pub workspace_id: Option<String>,
    /// Restrict to this area.
    pub area_id: Option<String>,
}

/// A project with aggregated task-completion counts.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectWithProgress {
    /// The project itself.
    #[serde(flatten)]
    pub project: Project,
    /// Total tasks under this project.
    pub task_count: u32,
    /// Tasks under this project in a terminal state.
    pub completed_task_count: u32,
}

/// Page of projects plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectListResult {
    /// Matching projects for this page.
    pub projects: Vec<ProjectWithProgress>,
    /// Total matches across all pages.
    pub total: u32,
}

/// Condensed progress line for LLM context injection.
#[derive(Debug, Clone)]
pub struct ProjectProgressEntry {
    /// Project title.
    pub title: String,
    /// Tasks in a terminal state.
    pub completed: u32,
    /// Total tasks.
    pub total: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Area
// ─────────────────────────────────────────────────────────────────────────────

/// A standing sphere of responsibility with no defined end, grouping projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// Primary key (`area-<uuidv7>`).
    pub id: String,
    /// Owning workspace.
    pub workspace_id: String,
    /// Short title.
    pub title: String,
    /// Longer free-form description.
    pub description: Option<String>,
    /// Current lifecycle state.
    pub status: AreaStatus,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Manual ordering weight among sibling areas.
    pub sort_order: f64,
    /// Creation timestamp.
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
    /// Arbitrary caller-defined metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Parameters for creating an area.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaCreateParams {
    /// Short title.
    pub title: String,
    /// Longer free-form description.
    pub description: Option<String>,
    /// Initial status; defaults to [`AreaStatus::Active`].
    pub status: Option<AreaStatus>,
    /// Owning workspace; defaults to `"default"`.
    pub workspace_id: Option<String>,
    /// Free-form labels.
    pub tags: Option<Vec<String>>,
    /// Manual ordering weight; defaults to `0.0`.
    pub sort_order: Option<f64>,
    /// Arbitrary caller-defined metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Parameters for updating an area. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaUpdateParams {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New status.
    pub status: Option<AreaStatus>,
    /// New ordering weight.
    pub sort_order: Option<f64>,
    /// Replace metadata wholesale.
    pub metadata: Option<serde_json::Value>,
    /// Tags to add (deduplicated).
    pub add_tags: Option<Vec<String>>,
    /// Tags to remove.
    pub remove_tags: Option<Vec<String>>,
}

/// Filter predicate for listing areas.
#[derive(Debug, Clone, Default)]
pub struct AreaFilter {
    /// Restrict to this status.
    pub status: Option<AreaStatus>,
    /// Restrict to this workspace.
    pub workspace_id: Option<String>,
}

/// An area with aggregated project/task counts.
#[derive(Debug, Clone, Serialize)]
pub struct AreaWithCounts {
    /// The area itself.
    #[serde(flatten)]
    pub area: Area,
    /// Total projects under this area.
    pub project_count: u32,
    /// Total tasks under this area (directly, not via projects).
    pub task_count: u32,
    /// Non-terminal tasks under this area.
    pub active_task_count: u32,
}

/// Page of areas plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct AreaListResult {
    /// Matching areas for this page.
    pub areas: Vec<AreaWithCounts>,
    /// Total matches across all pages.
    pub total: u32,
}
