//! Tracker Store - SQLite persistence for timeline trackers
//!
//! Two tables keyed by entity id:
//!
//! - `timeline_bounds`: at most one row per entity
//! - `tracker_window`: one row per merged window
//!
//! Every tracker operation runs in one IMMEDIATE transaction, which takes
//! SQLite's write lock up front. Concurrent writers on the same database
//! are therefore serialized, including writers in other processes.

use super::error::TrackerResult;
use super::tracker::TimelineTracker;
use super::window::Window;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};

/// File name of the tracker database inside the data directory
pub const TRACKER_DB_FILE: &str = "tracker.db";

/// SQLite-backed tracker storage
pub struct TrackerStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl TrackerStore {
    /// Create or open the tracker database in `data_dir`
    pub fn open(data_dir: &Path) -> TrackerResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(TRACKER_DB_FILE);

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> TrackerResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    fn init_schema(conn: &Connection) -> TrackerResult<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS timeline_bounds (
                doc_ref_uuid TEXT PRIMARY KEY,
                from_value INTEGER NOT NULL,
                to_value INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tracker_window (
                doc_ref_uuid TEXT NOT NULL,
                from_value INTEGER NOT NULL,
                to_value INTEGER NOT NULL,
                PRIMARY KEY (doc_ref_uuid, from_value)
            );
            ",
        )?;
        Ok(())
    }

    /// Path of the database file, None for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Begin a write transaction
    pub fn transaction(&mut self) -> TrackerResult<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Entity ids that have bounds or windows recorded
    pub fn entity_ids(&self) -> TrackerResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT doc_ref_uuid FROM timeline_bounds
             UNION
             SELECT doc_ref_uuid FROM tracker_window
             ORDER BY doc_ref_uuid",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

// ==================== Row Operations ====================
//
// These take a plain connection so they run inside whatever transaction
// the caller holds.

/// Read the full tracker for an entity, empty if nothing is stored
pub(crate) fn load_tracker(conn: &Connection, entity_id: &str) -> TrackerResult<TimelineTracker> {
    let bounds = conn
        .prepare_cached(
            "SELECT from_value, to_value FROM timeline_bounds WHERE doc_ref_uuid = ?",
        )?
        .query_row(params![entity_id], |row| {
            Ok(Window {
                from: row.get(0)?,
                to: row.get(1)?,
            })
        })
        .optional()?;

    let mut stmt = conn.prepare_cached(
        "SELECT from_value, to_value FROM tracker_window
         WHERE doc_ref_uuid = ?
         ORDER BY from_value ASC",
    )?;
    let windows = stmt
        .query_map(params![entity_id], |row| {
            Ok(Window {
                from: row.get(0)?,
                to: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TimelineTracker {
        entity_id: entity_id.to_string(),
        bounds,
        windows,
    })
}

pub(crate) fn insert_window(
    conn: &Connection,
    entity_id: &str,
    window: &Window<i64>,
) -> TrackerResult<()> {
    conn.prepare_cached(
        "INSERT INTO tracker_window (doc_ref_uuid, from_value, to_value) VALUES (?, ?, ?)",
    )?
    .execute(params![entity_id, window.from, window.to])?;
    Ok(())
}

pub(crate) fn delete_window(
    conn: &Connection,
    entity_id: &str,
    window: &Window<i64>,
) -> TrackerResult<()> {
    conn.prepare_cached(
        "DELETE FROM tracker_window
         WHERE doc_ref_uuid = ? AND from_value = ? AND to_value = ?",
    )?
    .execute(params![entity_id, window.from, window.to])?;
    Ok(())
}

/// Remove every window for an entity, returning how many went
pub(crate) fn delete_all_windows(conn: &Connection, entity_id: &str) -> TrackerResult<usize> {
    let deleted = conn
        .prepare_cached("DELETE FROM tracker_window WHERE doc_ref_uuid = ?")?
        .execute(params![entity_id])?;
    Ok(deleted)
}

pub(crate) fn upsert_bounds(
    conn: &Connection,
    entity_id: &str,
    bounds: &Window<i64>,
) -> TrackerResult<()> {
    conn.prepare_cached(
        "INSERT INTO timeline_bounds (doc_ref_uuid, from_value, to_value) VALUES (?, ?, ?)
         ON CONFLICT(doc_ref_uuid) DO UPDATE SET
             from_value = excluded.from_value,
             to_value = excluded.to_value",
    )?
    .execute(params![entity_id, bounds.from, bounds.to])?;
    Ok(())
}
