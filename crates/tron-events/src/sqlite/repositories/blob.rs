//! Blob repository — content-addressed storage in the `blobs` table.
//!
//! Content is deduplicated by SHA-256 hash: storing identical bytes twice
//! bumps `ref_count` on the existing row instead of inserting a duplicate.

use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::Result;
use crate::sqlite::row_types::BlobRow;

/// Blob repository — stateless, every method takes `&Connection`.
pub struct BlobRepo;

impl BlobRepo {
    /// Store blob content, deduplicating by SHA-256 hash. Returns the blob ID.
    pub fn store(conn: &Connection, content: &[u8], mime_type: &str) -> Result<String> {
        let hash = format!("{:x}", Sha256::digest(content));

        if let Some(id) = conn
            .query_row(
                "SELECT id FROM blobs WHERE hash = ?1",
                params![hash],
                |row| row.get::<_, String>(0),
            )
            .optional()?
        {
            let _ = conn.execute(
                "UPDATE blobs SET ref_count = ref_count + 1 WHERE id = ?1",
                params![id],
            )?;
            return Ok(id);
        }

        let id = format!("blob_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let size = content.len() as i64;
        let _ = conn.execute(
            "INSERT INTO blobs (id, hash, content, mime_type, size_original, size_compressed,
                 compression, created_at, ref_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, 'none', ?6, 1)",
            params![id, hash, content, mime_type, size, now],
        )?;
        Ok(id)
    }

    /// Drop a reference to a blob. Deletes the row once `ref_count` reaches zero.
    pub fn release(conn: &Connection, blob_id: &str) -> Result<bool> {
        let _ = conn.execute(
            "UPDATE blobs SET ref_count = ref_count - 1 WHERE id = ?1 AND ref_count > 0",
            params![blob_id],
        )?;
        let deleted = conn.execute(
            "DELETE FROM blobs WHERE id = ?1 AND ref_count <= 0",
            params![blob_id],
        )?;
        Ok(deleted > 0)
    }

    /// Get blob content by ID.
    pub fn get_content(conn: &Connection, blob_id: &str) -> Result<Option<Vec<u8>>> {
        conn.query_row(
            "SELECT content FROM blobs WHERE id = ?1",
            params![blob_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get full blob metadata (including content) by ID.
    pub fn get_by_id(conn: &Connection, blob_id: &str) -> Result<Option<BlobRow>> {
        conn.query_row(
            "SELECT id, hash, content, mime_type, size_original, size_compressed,
                    compression, created_at, ref_count
             FROM blobs WHERE id = ?1",
            params![blob_id],
            Self::map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlobRow> {
        Ok(BlobRow {
            id: row.get(0)?,
            hash: row.get(1)?,
            content: row.get(2)?,
            mime_type: row.get(3)?,
            size_original: row.get(4)?,
            size_compressed: row.get(5)?,
            compression: row.get(6)?,
            created_at: row.get(7)?,
            ref_count: row.get(8)?,
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
    fn store_and_get_content() {
        let conn = setup();
        let id = BlobRepo::store(&conn, b"hello world", "text/plain").unwrap();
        let content = BlobRepo::get_content(&conn, &id).unwrap();
        assert_eq!(content, Some(b"hello world".to_vec()));
    }

    #[test]
    fn store_deduplicates_identical_content() {
        let conn = setup();
        let first = BlobRepo::store(&conn, b"duplicate", "text/plain").unwrap();
        let second = BlobRepo::store(&conn, b"duplicate", "text/plain").unwrap();
        assert_eq!(first, second);

        let row = BlobRepo::get_by_id(&conn, &first).unwrap().unwrap();
        assert_eq!(row.ref_count, 2);
    }

    #[test]
    fn release_decrements_and_deletes_at_zero() {
        let conn = setup();
        let id = BlobRepo::store(&conn, b"ephemeral", "text/plain").unwrap();
        let deleted = BlobRepo::release(&conn, &id).unwrap();
        assert!(deleted);
        assert!(BlobRepo::get_by_id(&conn, &id).unwrap().is_none());
    }

    #[test]
    fn get_by_id_not_found() {
        let conn = setup();
        assert!(BlobRepo::get_by_id(&conn, "nonexistent").unwrap().is_none());
    }
}
