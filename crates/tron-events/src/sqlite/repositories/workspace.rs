//! Workspace repository — `workspaces` table.
//!
//! A workspace is a filesystem path that sessions are rooted in. Looked up
//! by path so repeated session creation against the same directory reuses
//! the same workspace row.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::errors::{EventStoreError, Result};
use crate::sqlite::row_types::WorkspaceRow;

/// Workspace repository — stateless, every method takes `&Connection`.
pub struct WorkspaceRepo;

impl WorkspaceRepo {
    /// Get a workspace by its absolute path.
    pub fn get_by_path(conn: &Connection, path: &str) -> Result<Option<WorkspaceRow>> {
        conn.query_row(
            "SELECT id, path, name, created_at, last_activity_at,
                    (SELECT COUNT(*) FROM sessions WHERE workspace_id = workspaces.id) AS session_count
             FROM workspaces WHERE path = ?1",
            params![path],
            Self::map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get or create a workspace by path. Touches `last_activity_at` on reuse.
    pub fn get_or_create(conn: &Connection, path: &str, name: Option<&str>) -> Result<WorkspaceRow> {
        let now = chrono::Utc::now().to_rfc3339();

        if let Some(existing_id) = conn
            .query_row(
                "SELECT id FROM workspaces WHERE path = ?1",
                params![path],
                |row| row.get::<_, String>(0),
            )
            .optional()?
        {
            let _ = conn.execute(
                "UPDATE workspaces SET last_activity_at = ?1 WHERE id = ?2",
                params![now, existing_id],
            )?;
            return Self::get_by_path(conn, path)?
                .ok_or_else(|| EventStoreError::WorkspaceNotFound(path.to_string()));
        }

        let id = format!("ws_{}", Uuid::now_v7());
        let _ = conn.execute(
            "INSERT INTO workspaces (id, path, name, created_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, path, name, now],
        )?;
        Self::get_by_path(conn, path)?
            .ok_or_else(|| EventStoreError::WorkspaceNotFound(path.to_string()))
    }

    /// List all workspaces, most recently active first.
    pub fn list(conn: &Connection) -> Result<Vec<WorkspaceRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, path, name, created_at, last_activity_at,
                    (SELECT COUNT(*) FROM sessions WHERE workspace_id = workspaces.id) AS session_count
             FROM workspaces ORDER BY last_activity_at DESC",
        )?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkspaceRow> {
        Ok(WorkspaceRow {
            id: row.get(0)?,
            path: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            last_activity_at: row.get(4)?,
            session_count: row.get(5)?,
        })
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn get_or_create_inserts_new() {
        let conn = setup();
        let ws = WorkspaceRepo::get_or_create(&conn, "/tmp/project", Some("Project")).unwrap();
        assert_eq!(ws.path, "/tmp/project");
        assert_eq!(ws.name.as_deref(), Some("Project"));
        assert_eq!(ws.session_count, Some(0));
    }

    #[test]
    fn get_or_create_reuses_existing() {
        let conn = setup();
        let first = WorkspaceRepo::get_or_create(&conn, "/tmp/project", None).unwrap();
        let second = WorkspaceRepo::get_or_create(&conn, "/tmp/project", None).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn get_by_path_not_found() {
        let conn = setup();
        let ws = WorkspaceRepo::get_by_path(&conn, "/nonexistent").unwrap();
        assert!(ws.is_none());
    }

    #[test]
    fn list_orders_by_activity() {
        let conn = setup();
        WorkspaceRepo::get_or_create(&conn, "/tmp/a", None).unwrap();
        WorkspaceRepo::get_or_create(&conn, "/tmp/b", None).unwrap();
        let all = WorkspaceRepo::list(&conn).unwrap();
        assert_eq!(all.len(), 2);
    }
}
