//! SQLite storage backend

use crate::{decode, encode, Storage, StorageError, StorageStats};
use async_trait::async_trait;
use parking_lot::Mutex;
use revdb_core::{DocumentId, Revision};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQLite storage backend
///
/// Embedded persistence suitable for single-process deployments.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|e| StorageError::Database(e.to_string()))?;

        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Database(e.to_string()))?;

        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS revisions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id TEXT NOT NULL,
                rev_id TEXT NOT NULL,
                generation INTEGER NOT NULL,
                deleted INTEGER NOT NULL,
                data BLOB NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
                UNIQUE (doc_id, rev_id)
            );

            CREATE INDEX IF NOT EXISTS idx_revisions_doc_id ON revisions(doc_id);
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }
}

/// Escape LIKE wildcards so document IDs match literally
fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn append_revision(&self, revision: &Revision) -> Result<bool, StorageError> {
        let data = encode(revision)?;
        let conn = self.conn.lock();

        let affected = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO revisions (doc_id, rev_id, generation, deleted, data)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    revision.document_id().as_str(),
                    revision.id().to_string(),
                    revision.generation() as i64,
                    revision.is_deleted(),
                    data,
                ],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(affected > 0)
    }

    async fn load_revisions(&self, id: &DocumentId) -> Result<Vec<Revision>, StorageError> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT data FROM revisions WHERE doc_id = ?1 ORDER BY seq")
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows: Vec<Vec<u8>> = stmt
            .query_map(params![id.as_str()], |row| row.get(0))
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<_, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.iter().map(|data| decode(data)).collect()
    }

    async fn purge(&self, id: &DocumentId) -> Result<bool, StorageError> {
        let conn = self.conn.lock();

        let affected = conn
            .execute("DELETE FROM revisions WHERE doc_id = ?1", params![id.as_str()])
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(affected > 0)
    }

    async fn list(&self, pattern: Option<&str>) -> Result<Vec<DocumentId>, StorageError> {
        let conn = self.conn.lock();

        let like = match pattern {
            None | Some("*") => "%".to_string(),
            Some(p) if p.ends_with('*') => format!("{}%", like_escape(p.trim_end_matches('*'))),
            Some(p) if p.starts_with('*') => format!("%{}", like_escape(p.trim_start_matches('*'))),
            Some(p) => like_escape(p),
        };

        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT doc_id FROM revisions \
                 WHERE doc_id LIKE ?1 ESCAPE '\\' ORDER BY doc_id",
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows: Vec<String> = stmt
            .query_map(params![like], |row| row.get(0))
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<_, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|id| DocumentId::new(id).map_err(|e| StorageError::Corrupt(e.to_string())))
            .collect()
    }

    async fn exists(&self, id: &DocumentId) -> Result<bool, StorageError> {
        let conn = self.conn.lock();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM revisions WHERE doc_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    async fn stats(&self) -> Result<StorageStats, StorageError> {
        let conn = self.conn.lock();

        let (document_count, revision_count, total_size): (i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(DISTINCT doc_id), COUNT(*), COALESCE(SUM(LENGTH(data)), 0) \
                 FROM revisions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(StorageStats {
            document_count: document_count as usize,
            revision_count: revision_count as usize,
            total_size_bytes: total_size as usize,
        })
    }
}
