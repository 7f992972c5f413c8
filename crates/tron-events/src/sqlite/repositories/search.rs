//! Search repository — full-text search over the `events_fts` mirror.
//!
//! `events_fts` is kept in sync with `events` by insert/delete triggers
//! (see the `v001_schema.sql` migration) that extract the `content` field
//! out of each event's JSON payload. Matches are ranked by SQLite's BM25.

use rusqlite::{Connection, params};

use crate::errors::Result;
use crate::types::state::SearchResult;

/// Options narrowing a full-text search.
pub struct SearchOptions<'a> {
    /// Restrict to a specific workspace.
    pub workspace_id: Option<&'a str>,
    /// Restrict to specific event types.
    pub event_types: Option<&'a [String]>,
    /// Maximum number of hits to return.
    pub limit: Option<i64>,
}

impl Default for SearchOptions<'_> {
    fn default() -> Self {
        Self {
            workspace_id: None,
            event_types: None,
            limit: Some(50),
        }
    }
}

/// Search repository — stateless, every method takes `&Connection`.
pub struct SearchRepo;

impl SearchRepo {
    /// Full-text search across all events, newest-relevance-first.
    pub fn search(conn: &Connection, query: &str, opts: &SearchOptions<'_>) -> Result<Vec<SearchResult>> {
        let limit = opts.limit.unwrap_or(50);
        let mut sql = String::from(
            "SELECT f.id, f.session_id, e.type, snippet(events_fts, 2, '<b>', '</b>', '...', 32) AS snip,
                    bm25(events_fts) AS rank, e.timestamp
             FROM events_fts f
             JOIN events e ON e.id = f.id
             WHERE events_fts MATCH ?1",
        );
        if opts.workspace_id.is_some() {
            sql.push_str(" AND e.workspace_id = ?2");
        }
        sql.push_str(" ORDER BY rank LIMIT ?3");

        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(workspace_id) = opts.workspace_id {
            stmt.query_map(params![query, workspace_id, limit], Self::map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![query, limit], Self::map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        Ok(match opts.event_types {
            Some(types) => rows
                .into_iter()
                .filter(|r| types.iter().any(|t| t == &r.event_type))
                .collect(),
            None => rows,
        })
    }

    /// Full-text search restricted to a single session.
    pub fn search_in_session(
        conn: &Connection,
        session_id: &str,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SearchResult>> {
        let limit = limit.unwrap_or(50);
        let mut stmt = conn.prepare(
            "SELECT f.id, f.session_id, e.type, snippet(events_fts, 2, '<b>', '</b>', '...', 32) AS snip,
                    bm25(events_fts) AS rank, e.timestamp
             FROM events_fts f
             JOIN events e ON e.id = f.id
             WHERE events_fts MATCH ?1 AND f.session_id = ?2
             ORDER BY rank LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![query, session_id, limit], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchResult> {
        Ok(SearchResult {
            event_id: row.get(0)?,
            session_id: row.get(1)?,
            event_type: row.get(2)?,
            snippet: row.get(3)?,
            rank: row.get(4)?,
            timestamp: row.get(5)?,
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
        conn.execute(
            "INSERT INTO workspaces (id, path, created_at, last_activity_at)
             VALUES ('ws_1', '/tmp/test', '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO sessions (id, workspace_id, latest_model, working_directory, created_at, last_activity_at)
             VALUES ('sess_1', 'ws_1', 'test', '/tmp/test', '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn
    }

    fn insert_event(conn: &Connection, id: &str, content: &str) {
        conn.execute(
            "INSERT INTO events (id, session_id, parent_id, sequence, type, timestamp, payload, workspace_id)
             VALUES (?1, 'sess_1', NULL, 1, 'message.user', '2025-01-01T00:00:00Z', ?2, 'ws_1')",
            params![id, serde_json::json!({"content": content}).to_string()],
        )
        .unwrap();
    }

    #[test]
    fn search_finds_matching_content() {
        let conn = setup();
        insert_event(&conn, "evt_1", "rust programming is fun");
        insert_event(&conn, "evt_2", "python scripting");

        let results = SearchRepo::search(&conn, "rust", &SearchOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event_id, "evt_1");
    }

    #[test]
    fn search_in_session_scopes_to_session() {
        let conn = setup();
        conn.execute(
            "INSERT INTO sessions (id, workspace_id, latest_model, working_directory, created_at, last_activity_at)
             VALUES ('sess_2', 'ws_1', 'test', '/tmp/test', '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO events (id, session_id, parent_id, sequence, type, timestamp, payload, workspace_id)
             VALUES ('evt_3', 'sess_2', NULL, 1, 'message.user', '2025-01-01T00:00:00Z', ?1, 'ws_1')",
            params![serde_json::json!({"content": "rust elsewhere"}).to_string()],
        )
        .unwrap();
        insert_event(&conn, "evt_1", "rust in session one");

        let results = SearchRepo::search_in_session(&conn, "sess_1", "rust", None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event_id, "evt_1");
    }

    #[test]
    fn search_no_match_returns_empty() {
        let conn = setup();
        insert_event(&conn, "evt_1", "rust programming");
        let results = SearchRepo::search(&conn, "javascript", &SearchOptions::default()).unwrap();
        assert!(results.is_empty());
    }
}
