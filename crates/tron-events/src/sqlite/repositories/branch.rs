//! Branch repository — named alternate heads within a session (`branches` table).

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::errors::Result;
use crate::sqlite::row_types::BranchRow;

/// Options for creating a branch.
pub struct CreateBranchOptions<'a> {
    /// Session the branch belongs to.
    pub session_id: &'a str,
    /// Branch name, unique within the session.
    pub name: &'a str,
    /// Optional description.
    pub description: Option<&'a str>,
    /// Event the branch diverges from.
    pub root_event_id: &'a str,
    /// Current head event of the branch.
    pub head_event_id: &'a str,
}

/// Branch repository — stateless, every method takes `&Connection`.
pub struct BranchRepo;

impl BranchRepo {
    /// Create a new branch.
    pub fn create(conn: &Connection, opts: &CreateBranchOptions<'_>) -> Result<BranchRow> {
        let id = format!("branch_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO branches (id, session_id, name, description, root_event_id,
                 head_event_id, is_default, created_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
            params![
                id,
                opts.session_id,
                opts.name,
                opts.description,
                opts.root_event_id,
                opts.head_event_id,
                now,
            ],
        )?;
        Ok(BranchRow {
            id,
            session_id: opts.session_id.to_string(),
            name: opts.name.to_string(),
            description: opts.description.map(String::from),
            root_event_id: opts.root_event_id.to_string(),
            head_event_id: opts.head_event_id.to_string(),
            is_default: false,
            created_at: now.clone(),
            last_activity_at: now,
        })
    }

    /// Advance a branch's head pointer.
    pub fn update_head(conn: &Connection, branch_id: &str, head_event_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE branches SET head_event_id = ?1, last_activity_at = ?2 WHERE id = ?3",
            params![head_event_id, now, branch_id],
        )?;
        Ok(changed > 0)
    }

    /// Get a branch by ID.
    pub fn get_by_id(conn: &Connection, branch_id: &str) -> Result<Option<BranchRow>> {
        conn.query_row(
            "SELECT id, session_id, name, description, root_event_id, head_event_id,
                    is_default, created_at, last_activity_at
             FROM branches WHERE id = ?1",
            params![branch_id],
            Self::map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List all branches belonging to a session, most recently active first.
    pub fn get_by_session(conn: &Connection, session_id: &str) -> Result<Vec<BranchRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, name, description, root_event_id, head_event_id,
                    is_default, created_at, last_activity_at
             FROM branches WHERE session_id = ?1 ORDER BY last_activity_at DESC",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete a branch by ID.
    pub fn delete(conn: &Connection, branch_id: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM branches WHERE id = ?1", params![branch_id])?;
        Ok(deleted > 0)
    }

    /// Delete all branches for a session. Used when a session is deleted.
    pub fn delete_by_session(conn: &Connection, session_id: &str) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM branches WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(deleted)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BranchRow> {
        Ok(BranchRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            root_event_id: row.get(4)?,
            head_event_id: row.get(5)?,
            is_default: row.get::<_, i32>(6)? == 1,
            created_at: row.get(7)?,
            last_activity_at: row.get(8)?,
        })
    }
}
