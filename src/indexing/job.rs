//! Index jobs
//!
//! At most one outstanding job per auto-index, persisted so a restart does
//! not lose track of what was handed out. A job is created from the next
//! suggested window, claimed by flipping `started`, and deleted once its
//! window is recorded in the tracker.

use super::{IndexingError, IndexingResult};
use crate::tracking::Window;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

/// File name of the job database inside the data directory
pub const JOB_DB_FILE: &str = "index_jobs.db";

/// A window handed out for indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexJob {
    pub id: String,
    pub doc_ref_uuid: String,
    pub window: Window<i64>,
    pub created_at: DateTime<Utc>,
    pub started: bool,
}

/// SQLite-backed job table
pub struct IndexJobStore {
    conn: Mutex<Connection>,
}

impl IndexJobStore {
    pub fn open(data_dir: &Path) -> IndexingResult<Self> {
        std::fs::create_dir_all(data_dir)?;

        let conn = Connection::open_with_flags(
            data_dir.join(JOB_DB_FILE),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Self::with_connection(conn)
    }

    pub fn in_memory() -> IndexingResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> IndexingResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS index_job (
                doc_ref_uuid TEXT PRIMARY KEY,
                job_id TEXT NOT NULL,
                from_value INTEGER NOT NULL,
                to_value INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                started INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> IndexingResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| IndexingError::LockPoisoned)
    }

    /// Existing job for the entity, or a new one from `suggest`
    ///
    /// Returns None when there is no job and `suggest` has nothing to offer.
    pub fn get_or_create(
        &self,
        doc_ref_uuid: &str,
        suggest: impl FnOnce() -> Option<Window<i64>>,
    ) -> IndexingResult<Option<IndexJob>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some(job) = select_job(&tx, doc_ref_uuid)? {
            return Ok(Some(job));
        }

        let Some(window) = suggest() else {
            return Ok(None);
        };

        let job = IndexJob {
            id: uuid::Uuid::new_v4().to_string(),
            doc_ref_uuid: doc_ref_uuid.to_string(),
            window,
            created_at: Utc::now(),
            started: false,
        };
        tx.execute(
            "INSERT INTO index_job (doc_ref_uuid, job_id, from_value, to_value, created_at, started)
             VALUES (?, ?, ?, ?, ?, 0)",
            params![
                job.doc_ref_uuid,
                job.id,
                job.window.from,
                job.window.to,
                job.created_at.timestamp_millis()
            ],
        )?;
        tx.commit()?;

        tracing::debug!(entity_id = %doc_ref_uuid, window = %window, "Index job created");
        Ok(Some(job))
    }

    pub fn get(&self, doc_ref_uuid: &str) -> IndexingResult<Option<IndexJob>> {
        let conn = self.lock()?;
        select_job(&conn, doc_ref_uuid)
    }

    /// Claim the job, false if it was missing or already started
    pub fn mark_started(&self, doc_ref_uuid: &str) -> IndexingResult<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE index_job SET started = 1 WHERE doc_ref_uuid = ? AND started = 0",
            params![doc_ref_uuid],
        )?;
        Ok(updated == 1)
    }

    /// Put a failed job back up for grabs
    pub fn reset(&self, doc_ref_uuid: &str) -> IndexingResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE index_job SET started = 0 WHERE doc_ref_uuid = ?",
            params![doc_ref_uuid],
        )?;
        Ok(())
    }

    /// Release every claimed job, returning how many were released
    pub fn reset_all(&self) -> IndexingResult<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("UPDATE index_job SET started = 0 WHERE started = 1", [])?)
    }

    /// Remove a finished job
    pub fn mark_complete(&self, doc_ref_uuid: &str) -> IndexingResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM index_job WHERE doc_ref_uuid = ?",
            params![doc_ref_uuid],
        )?;
        Ok(())
    }

    /// Every outstanding job, oldest first
    pub fn all(&self) -> IndexingResult<Vec<IndexJob>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT doc_ref_uuid, job_id, from_value, to_value, created_at, started
             FROM index_job ORDER BY created_at ASC",
        )?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }
}

fn select_job(conn: &Connection, doc_ref_uuid: &str) -> IndexingResult<Option<IndexJob>> {
    Ok(conn
        .prepare_cached(
            "SELECT doc_ref_uuid, job_id, from_value, to_value, created_at, started
             FROM index_job WHERE doc_ref_uuid = ?",
        )?
        .query_row(params![doc_ref_uuid], job_from_row)
        .optional()?)
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<IndexJob> {
    let created_millis: i64 = row.get(4)?;
    Ok(IndexJob {
        doc_ref_uuid: row.get(0)?,
        id: row.get(1)?,
        window: Window {
            from: row.get(2)?,
            to: row.get(3)?,
        },
        created_at: DateTime::from_timestamp_millis(created_millis).unwrap_or_default(),
        started: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_or_create() {
        let store = IndexJobStore::in_memory().unwrap();

        let job = store
            .get_or_create("doc-1", || Some(Window::new(10, 20)))
            .unwrap()
            .unwrap();
        assert_eq!(job.window, Window::new(10, 20));
        assert!(!job.started);

        // Existing job wins, suggestion is not consulted
        let again = store
            .get_or_create("doc-1", || panic!("should not suggest"))
            .unwrap()
            .unwrap();
        assert_eq!(again.id, job.id);
    }

    #[test]
    fn test_nothing_to_suggest() {
        let store = IndexJobStore::in_memory().unwrap();

        assert!(store.get_or_create("doc-1", || None).unwrap().is_none());
        assert!(store.get("doc-1").unwrap().is_none());
    }

    #[test]
    fn test_claim_reset_complete() {
        let store = IndexJobStore::in_memory().unwrap();
        store.get_or_create("doc-1", || Some(Window::new(0, 10))).unwrap();

        assert!(store.mark_started("doc-1").unwrap());
        assert!(!store.mark_started("doc-1").unwrap());
        assert!(store.get("doc-1").unwrap().unwrap().started);

        store.reset("doc-1").unwrap();
        assert!(store.mark_started("doc-1").unwrap());
        assert_eq!(store.reset_all().unwrap(), 1);

        store.mark_complete("doc-1").unwrap();
        assert!(store.get("doc-1").unwrap().is_none());
        assert!(!store.mark_started("doc-1").unwrap());
    }

    #[test]
    fn test_all_oldest_first() {
        let store = IndexJobStore::in_memory().unwrap();
        store.get_or_create("b", || Some(Window::new(0, 10))).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.get_or_create("a", || Some(Window::new(0, 10))).unwrap();

        let order: Vec<_> = store.all().unwrap().into_iter().map(|j| j.doc_ref_uuid).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_jobs_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = IndexJobStore::open(dir.path()).unwrap();
            store.get_or_create("doc-1", || Some(Window::new(5, 6))).unwrap();
        }

        let store = IndexJobStore::open(dir.path()).unwrap();
        assert_eq!(store.get("doc-1").unwrap().unwrap().window, Window::new(5, 6));
    }
}
