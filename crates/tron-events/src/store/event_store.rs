//! High-level transactional `EventStore` API.
//!
//! Composes all repository operations into atomic, session-centric methods.
//! Every write method runs inside a single `SQLite` transaction — callers
//! never observe partial state.

use serde_json::Value;
use uuid::Uuid;

use crate::errors::{EventStoreError, Result};
use crate::sqlite::connection::{ConnectionPool, PooledConnection};
use crate::sqlite::repositories::blob::BlobRepo;
use crate::sqlite::repositories::branch::BranchRepo;
use crate::sqlite::repositories::event::{EventRepo, ListEventsOptions, TokenUsageSummary};
use crate::sqlite::repositories::search::{SearchOptions, SearchRepo};
use crate::sqlite::repositories::session::{
    CreateSessionOptions, IncrementCounters, ListSessionsOptions, SessionRepo,
};
use crate::sqlite::repositories::workspace::WorkspaceRepo;
use crate::sqlite::row_types::{BlobRow, EventRow, SessionRow, WorkspaceRow};
use crate::types::base::SessionEvent;
use crate::types::state::{SearchResult, SessionState};
use crate::types::EventType;

/// Result of creating a new session.
#[derive(Debug)]
pub struct CreateSessionResult {
    /// The created session.
    pub session: SessionRow,
    /// The root `session.start` event.
    pub root_event: EventRow,
}

/// Result of forking a session.
#[derive(Debug)]
pub struct ForkResult {
    /// The newly created (forked) session.
    pub session: SessionRow,
    /// The root `session.fork` event.
    pub fork_event: EventRow,
}

/// Options for appending an event.
pub struct AppendOptions<'a> {
    /// Session to append to.
    pub session_id: &'a str,
    /// Event type.
    pub event_type: EventType,
    /// Event payload (JSON).
    pub payload: Value,
    /// Explicit parent. If `None`, chains from session head.
    pub parent_id: Option<&'a str>,
}

/// Options for forking a session.
#[derive(Default)]
pub struct ForkOptions<'a> {
    /// Optional model override for the fork.
    pub model: Option<&'a str>,
    /// Optional title for the forked session.
    pub title: Option<&'a str>,
}

/// High-level `EventStore` wrapping a connection pool and all repositories.
///
/// All write methods are transactional — they run inside `SAVEPOINT`/`RELEASE`
/// blocks so callers never see partial state.
pub struct EventStore {
    pool: ConnectionPool,
}

impl EventStore {
    /// Create a new `EventStore` with the given connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a new session with a root `session.start` event.
    ///
    /// Atomic: workspace creation (get-or-create), session insertion, root event
    /// insertion, head/root pointer updates, and counter increments all happen
    /// in a single transaction.
    pub fn create_session(
        &self,
        model: &str,
        workspace_path: &str,
        title: Option<&str>,
    ) -> Result<CreateSessionResult> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        // 1. Get or create workspace
        let ws = WorkspaceRepo::get_or_create(&tx, workspace_path, None)?;

        // 2. Create session
        let session = SessionRepo::create(
            &tx,
            &CreateSessionOptions {
                workspace_id: &ws.id,
                model,
                working_directory: workspace_path,
                title,
                tags: None,
                parent_session_id: None,
                fork_from_event_id: None,
                spawning_session_id: None,
                spawn_type: None,
                spawn_task: None,
            },
        )?;

        // 3. Create root session.start event
        let event_id = format!("evt_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let payload = serde_json::json!({
            "workingDirectory": workspace_path,
            "model": model,
        });
        let event = SessionEvent {
            id: event_id,
            session_id: session.id.clone(),
            parent_id: None,
            workspace_id: ws.id.clone(),
            timestamp: now,
            event_type: EventType::SessionStart,
            sequence: 0,
            checksum: None,
            payload,
        };
        EventRepo::insert(&tx, &event)?;

        // 4. Update session root and head
        let _ = SessionRepo::update_root(&tx, &session.id, &event.id)?;
        let _ = SessionRepo::update_head(&tx, &session.id, &event.id)?;

        // 5. Increment event count
        let _ = SessionRepo::increment_counters(
            &tx,
            &session.id,
            &IncrementCounters {
                event_count: Some(1),
                ..Default::default()
            },
        )?;

        tx.commit()?;

        // Re-fetch session to get updated head/root/counters
        let updated_session = SessionRepo::get_by_id(&conn, &session.id)?
            .ok_or(EventStoreError::SessionNotFound(session.id))?;

        // Re-read the event row to get denormalized fields
        let root_event = EventRepo::get_by_id(&conn, &event.id)?
            .ok_or(EventStoreError::EventNotFound(event.id))?;

        Ok(CreateSessionResult {
            session: updated_session,
            root_event,
        })
    }

    /// Append an event to a session.
    ///
    /// Atomic: sequence generation, event insertion, head update, and counter
    /// increments all happen in a single transaction.
    pub fn append(&self, opts: &AppendOptions<'_>) -> Result<EventRow> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        // 1. Fetch session (must exist)
        let session = SessionRepo::get_by_id(&tx, opts.session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(opts.session_id.to_string()))?;

        // 2. Resolve parent
        let parent_id = match opts.parent_id {
            Some(pid) => Some(pid.to_string()),
            None => session.head_event_id.clone(),
        };

        // 3. Get next sequence
        let sequence = EventRepo::get_next_sequence(&tx, opts.session_id)?;

        // 4. Build event (depth is computed by EventRepo::insert)
        let event_id = format!("evt_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();

        let event = SessionEvent {
            id: event_id,
            session_id: opts.session_id.to_string(),
            parent_id,
            workspace_id: session.workspace_id.clone(),
            timestamp: now,
            event_type: opts.event_type,
            sequence,
            checksum: None,
            payload: opts.payload.clone(),
        };

        // 6. Insert (repo extracts denormalized fields from payload)
        EventRepo::insert(&tx, &event)?;

        // 7. Update session head
        let _ = SessionRepo::update_head(&tx, opts.session_id, &event.id)?;

        // 8. Build counter increments
        let mut counters = IncrementCounters {
            event_count: Some(1),
            ..Default::default()
        };

        // Message count
        if matches!(
            opts.event_type,
            EventType::MessageUser | EventType::MessageAssistant
        ) {
            counters.message_count = Some(1);
        }

        // Token usage from payload
        if let Some(tu) = opts.payload.get("tokenUsage") {
            counters.input_tokens = tu.get("inputTokens").and_then(Value::as_i64);
            counters.output_tokens = tu.get("outputTokens").and_then(Value::as_i64);
            counters.cache_read_tokens = tu.get("cacheReadInputTokens").and_then(Value::as_i64);
            counters.cache_creation_tokens =
                tu.get("cacheCreationInputTokens").and_then(Value::as_i64);
        }

        // Cost from payload
        if let Some(cost) = opts.payload.get("cost").and_then(Value::as_f64) {
            counters.cost = Some(cost);
        }

        let _ = SessionRepo::increment_counters(&tx, opts.session_id, &counters)?;

        tx.commit()?;

        // Re-read the event to get denormalized fields set by insert
        let inserted = EventRepo::get_by_id(&conn, &event.id)?
            .ok_or(EventStoreError::EventNotFound(event.id))?;
        Ok(inserted)
    }

    /// Fork a session from a specific event.
    ///
    /// Creates a new session whose root `session.fork` event has its `parent_id`
    /// pointing into the source session's event tree. Ancestor walks from the
    /// fork event traverse back through the shared history.
    pub fn fork(
        &self,
        from_event_id: &str,
        opts: &ForkOptions<'_>,
    ) -> Result<ForkResult> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        // 1. Fetch source event
        let source_event = EventRepo::get_by_id(&tx, from_event_id)?
            .ok_or_else(|| EventStoreError::EventNotFound(from_event_id.to_string()))?;

        // Forking is only allowed from a settled turn boundary — a tool.call
        // or tool.result means the turn that produced it hasn't closed yet,
        // and there's no well-defined conversational state to resume from.
        if matches!(
            source_event.event_type,
            EventType::ToolCall | EventType::ToolResult
        ) {
            return Err(EventStoreError::InvalidOperation(format!(
                "cannot fork from event {from_event_id}: {:?} is inside an unclosed turn, fork from the enclosing message.user or message.assistant instead",
                source_event.event_type
            )));
        }

        // 2. Fetch source session
        let source_session = SessionRepo::get_by_id(&tx, &source_event.session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(source_event.session_id.clone()))?;

        // 3. Create forked session
        let model = opts.model.unwrap_or(&source_session.latest_model);
        let session = SessionRepo::create(
            &tx,
            &CreateSessionOptions {
                workspace_id: &source_session.workspace_id,
                model,
                working_directory: &source_session.working_directory,
                title: opts.title,
                tags: None,
                parent_session_id: Some(&source_session.id),
                fork_from_event_id: Some(from_event_id),
                spawning_session_id: None,
                spawn_type: None,
                spawn_task: None,
            },
        )?;

        // 4. Create fork event (parentId points into source tree)
        let event_id = format!("evt_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let payload = serde_json::json!({
            "sourceSessionId": source_session.id,
            "sourceEventId": from_event_id,
        });

        let fork_event = SessionEvent {
            id: event_id,
            session_id: session.id.clone(),
            parent_id: Some(from_event_id.to_string()),
            workspace_id: source_session.workspace_id.clone(),
            timestamp: now,
            event_type: EventType::SessionFork,
            sequence: 0,
            checksum: None,
            payload,
        };
        EventRepo::insert(&tx, &fork_event)?;

        // 5. Set root and head
        let _ = SessionRepo::update_root(&tx, &session.id, &fork_event.id)?;
        let _ = SessionRepo::update_head(&tx, &session.id, &fork_event.id)?;

        // 6. Increment event count
        let _ = SessionRepo::increment_counters(
            &tx,
            &session.id,
            &IncrementCounters {
                event_count: Some(1),
                ..Default::default()
            },
        )?;

        tx.commit()?;

        let updated_session = SessionRepo::get_by_id(&conn, &session.id)?
            .ok_or(EventStoreError::SessionNotFound(session.id))?;

        let fork_event_row = EventRepo::get_by_id(&conn, &fork_event.id)?
            .ok_or(EventStoreError::EventNotFound(fork_event.id))?;

        Ok(ForkResult {
            session: updated_session,
            fork_event: fork_event_row,
        })
    }

    /// Delete a message by appending a `message.deleted` event.
    ///
    /// The target event must be a message event (`message.user`, `message.assistant`,
    /// or `tool.result`). The original event is never modified — deletion is recorded
    /// as a new event and applied during message reconstruction.
    pub fn delete_message(
        &self,
        session_id: &str,
        target_event_id: &str,
        reason: Option<&str>,
    ) -> Result<EventRow> {
        // Validate target exists and is a message type
        let conn = self.conn()?;
        let target = EventRepo::get_by_id(&conn, target_event_id)?
            .ok_or_else(|| EventStoreError::EventNotFound(target_event_id.to_string()))?;

        let target_type: EventType = target
            .event_type
            .parse()
            .map_err(|_| EventStoreError::InvalidOperation("Unknown event type".to_string()))?;

        if !matches!(
            target_type,
            EventType::MessageUser | EventType::MessageAssistant | EventType::ToolResult
        ) {
            return Err(EventStoreError::InvalidOperation(format!(
                "Cannot delete event of type '{}' — only message and tool result events can be deleted",
                target.event_type
            )));
        }

        // Append message.deleted event
        self.append(&AppendOptions {
            session_id,
            event_type: EventType::MessageDeleted,
            payload: serde_json::json!({
                "targetEventId": target_event_id,
                "targetType": target.event_type,
                "reason": reason.unwrap_or("user_request"),
            }),
            parent_id: None,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event retrieval
    // ─────────────────────────────────────────────────────────────────────

    /// Get a single event by ID.
    pub fn get_event(&self, event_id: &str) -> Result<Option<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_id(&conn, event_id)
    }

    /// Get all events for a session, ordered by sequence.
    pub fn get_events_by_session(
        &self,
        session_id: &str,
        opts: &ListEventsOptions,
    ) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_session(&conn, session_id, opts)
    }

    /// Get ancestor chain from root to the given event (inclusive).
    pub fn get_ancestors(&self, event_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_ancestors(&conn, event_id)
    }

    /// Get direct children of an event.
    pub fn get_children(&self, event_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_children(&conn, event_id)
    }

    /// Get all descendants of an event (recursive).
    pub fn get_descendants(&self, event_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_descendants(&conn, event_id)
    }

    /// Get events inserted after a specific sequence number.
    pub fn get_events_since(
        &self,
        session_id: &str,
        after_sequence: i64,
    ) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_since(&conn, session_id, after_sequence)
    }

    /// Get token usage summary for a session.
    pub fn get_token_usage_summary(&self, session_id: &str) -> Result<TokenUsageSummary> {
        let conn = self.conn()?;
        EventRepo::get_token_usage_summary(&conn, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session management
    // ─────────────────────────────────────────────────────────────────────

    /// Get session by ID.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::get_by_id(&conn, session_id)
    }

    /// List sessions with filtering.
    pub fn list_sessions(&self, opts: &ListSessionsOptions<'_>) -> Result<Vec<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::list(&conn, opts)
    }

    /// Mark a session as ended.
    pub fn end_session(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::mark_ended(&conn, session_id)
    }

    /// Reactivate an ended session.
    pub fn clear_session_ended(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::clear_ended(&conn, session_id)
    }

    /// Update the latest model for a session.
    pub fn update_latest_model(&self, session_id: &str, model: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::update_latest_model(&conn, session_id, model)
    }

    /// Update session title.
    pub fn update_session_title(&self, session_id: &str, title: Option<&str>) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::update_title(&conn, session_id, title)
    }

    /// Delete a session and all its events.
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        // Delete events first (foreign key constraint)
        let _ = EventRepo::delete_by_session(&tx, session_id)?;
        let _ = BranchRepo::delete_by_session(&tx, session_id)?;
        let deleted = SessionRepo::delete(&tx, session_id)?;

        tx.commit()?;
        Ok(deleted)
    }

    /// List subagent sessions for a parent.
    pub fn list_subagents(&self, spawning_session_id: &str) -> Result<Vec<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::list_subagents(&conn, spawning_session_id)
    }

    /// Update session spawn info (links child to parent session).
    pub fn update_spawn_info(
        &self,
        session_id: &str,
        spawning_session_id: &str,
        spawn_type: &str,
        spawn_task: &str,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sessions SET spawning_session_id = ?1, spawn_type = ?2, spawn_task = ?3 WHERE id = ?4",
            rusqlite::params![spawning_session_id, spawn_type, spawn_task, session_id],
        )?;
        Ok(changed > 0)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Workspace management
    // ─────────────────────────────────────────────────────────────────────

    /// Get workspace by path.
    pub fn get_workspace_by_path(&self, path: &str) -> Result<Option<WorkspaceRow>> {
        let conn = self.conn()?;
        WorkspaceRepo::get_by_path(&conn, path)
    }

    /// Get or create workspace by path.
    pub fn get_or_create_workspace(
        &self,
        path: &str,
        name: Option<&str>,
    ) -> Result<WorkspaceRow> {
        let conn = self.conn()?;
        WorkspaceRepo::get_or_create(&conn, path, name)
    }

    /// List all workspaces.
    pub fn list_workspaces(&self) -> Result<Vec<WorkspaceRow>> {
        let conn = self.conn()?;
        WorkspaceRepo::list(&conn)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Blob storage
    // ─────────────────────────────────────────────────────────────────────

    /// Store blob content (SHA-256 deduplicated).
    pub fn store_blob(&self, content: &[u8], mime_type: &str) -> Result<String> {
        let conn = self.conn()?;
        BlobRepo::store(&conn, content, mime_type)
    }

    /// Get blob content by ID.
    pub fn get_blob_content(&self, blob_id: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;
        BlobRepo::get_content(&conn, blob_id)
    }

    /// Get full blob metadata.
    pub fn get_blob(&self, blob_id: &str) -> Result<Option<BlobRow>> {
        let conn = self.conn()?;
        BlobRepo::get_by_id(&conn, blob_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────

    /// Full-text search across all events.
    pub fn search(&self, query: &str, opts: &SearchOptions<'_>) -> Result<Vec<SearchResult>> {
        let conn = self.conn()?;
        SearchRepo::search(&conn, query, opts)
    }

    /// Search within a specific session.
    pub fn search_in_session(
        &self,
        session_id: &str,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.conn()?;
        SearchRepo::search_in_session(&conn, session_id, query, limit)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Branch management (delegated)
    // ─────────────────────────────────────────────────────────────────────

    /// Get branches for a session.
    pub fn get_branches(
        &self,
        session_id: &str,
    ) -> Result<Vec<crate::sqlite::row_types::BranchRow>> {
        let conn = self.conn()?;
        BranchRepo::get_by_session(&conn, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Projected state
    // ─────────────────────────────────────────────────────────────────────

    /// Reconstruct the full session state at its current head event.
    ///
    /// Replays the ancestor chain from root to head through
    /// [`crate::reconstruct::reconstruct_from_events`] and combines it with
    /// the session row's own model/working-directory/ended-at fields.
    pub fn get_state_at_head(&self, session_id: &str) -> Result<SessionState> {
        let conn = self.conn()?;

        let session = SessionRepo::get_by_id(&conn, session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(session_id.to_string()))?;

        let ancestors: Vec<SessionEvent> = match &session.head_event_id {
            Some(head_id) => EventRepo::get_ancestors(&conn, head_id)?
                .into_iter()
                .map(row_to_session_event)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let reconstructed = crate::reconstruct::reconstruct_from_events(&ancestors);

        Ok(SessionState {
            model: session.latest_model,
            working_directory: session.working_directory,
            system_prompt: reconstructed.system_prompt,
            token_usage: crate::types::payloads::TokenUsage {
                input_tokens: reconstructed.token_usage.input_tokens,
                output_tokens: reconstructed.token_usage.output_tokens,
                cache_read_tokens: Some(reconstructed.token_usage.cache_read_tokens),
                cache_creation_tokens: Some(reconstructed.token_usage.cache_creation_tokens),
                cache_creation_5m_tokens: None,
                cache_creation_1h_tokens: None,
            },
            turn_count: reconstructed.turn_count,
            is_ended: Some(session.ended_at.is_some()),
            messages_with_event_ids: reconstructed.messages_with_event_ids,
        })
    }

    /// Reconstruct the full session state as of a specific event.
    ///
    /// Replays the ancestor chain from root to `event_id` (inclusive) through
    /// [`crate::reconstruct::reconstruct_from_events`], the same projection
    /// [`Self::get_state_at_head`] uses, just anchored at an arbitrary event
    /// instead of the session's current head.
    pub fn get_state_at(&self, event_id: &str) -> Result<SessionState> {
        let conn = self.conn()?;

        let ancestor_rows = EventRepo::get_ancestors(&conn, event_id)?;
        let target_row = ancestor_rows
            .last()
            .ok_or_else(|| EventStoreError::EventNotFound(event_id.to_string()))?;
        if target_row.id != event_id {
            return Err(EventStoreError::EventNotFound(event_id.to_string()));
        }
        let session_id = target_row.session_id.clone();

        let session = SessionRepo::get_by_id(&conn, &session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(session_id.clone()))?;

        let ancestors: Vec<SessionEvent> = ancestor_rows
            .into_iter()
            .map(row_to_session_event)
            .collect::<Result<Vec<_>>>()?;

        let reconstructed = crate::reconstruct::reconstruct_from_events(&ancestors);

        Ok(SessionState {
            model: session.latest_model,
            working_directory: session.working_directory,
            system_prompt: reconstructed.system_prompt,
            token_usage: crate::types::payloads::TokenUsage {
                input_tokens: reconstructed.token_usage.input_tokens,
                output_tokens: reconstructed.token_usage.output_tokens,
                cache_read_tokens: Some(reconstructed.token_usage.cache_read_tokens),
                cache_creation_tokens: Some(reconstructed.token_usage.cache_creation_tokens),
                cache_creation_5m_tokens: None,
                cache_creation_1h_tokens: None,
            },
            turn_count: reconstructed.turn_count,
            // A historical snapshot is never "ended" relative to its own event;
            // end-of-session status only makes sense for the head projection.
            is_ended: None,
            messages_with_event_ids: reconstructed.messages_with_event_ids,
        })
    }

    /// Get the raw connection pool (for advanced/custom queries).
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

/// Convert a raw database row into the canonical [`SessionEvent`] shape.
fn row_to_session_event(row: EventRow) -> Result<SessionEvent> {
    let event_type: EventType = row
        .event_type
        .parse()
        .map_err(EventStoreError::InvalidOperation)?;
    let payload: Value = serde_json::from_str(&row.payload)?;
    Ok(SessionEvent {
        id: row.id,
        parent_id: row.parent_id,
        session_id: row.session_id,
        workspace_id: row.workspace_id,
        timestamp: row.timestamp,
        event_type,
        sequence: row.sequence,
        checksum: row.checksum,
        payload,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
