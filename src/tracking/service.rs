//! Timeline Tracker Service
//!
//! Transactional operations on trackers. Each call locks the store, opens
//! one transaction, and commits or rolls back as a unit, so concurrent
//! `add_window`/`clear_windows` calls for one entity can never interleave.

use super::error::{TrackerError, TrackerResult};
use super::merger::merge_windows;
use super::store::{self, TrackerStore};
use super::tracker::{extend_bounds, TimelineTracker};
use super::window::Window;
use std::path::Path;
use std::sync::Mutex;

/// Shared entry point for reading and mutating trackers
pub struct TimelineTrackerService {
    /// std::sync::Mutex because rusqlite::Connection is not Sync
    store: Mutex<TrackerStore>,
}

impl TimelineTrackerService {
    pub fn new(store: TrackerStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Open the tracker database in `data_dir`
    pub fn open(data_dir: &Path) -> TrackerResult<Self> {
        Ok(Self::new(TrackerStore::open(data_dir)?))
    }

    pub fn in_memory() -> TrackerResult<Self> {
        Ok(Self::new(TrackerStore::open_in_memory()?))
    }

    /// Run `f` inside one committed transaction
    fn with_transaction<R>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> TrackerResult<R>,
    ) -> TrackerResult<R> {
        let mut guard = self.store.lock().map_err(|_| TrackerError::LockPoisoned)?;
        let tx = guard.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Current state, empty if the entity has never been touched
    pub fn get(&self, entity_id: &str) -> TrackerResult<TimelineTracker> {
        self.with_transaction(|tx| store::load_tracker(tx, entity_id))
    }

    /// Overwrite the bounds of known raw data
    pub fn set_bounds(&self, entity_id: &str, bounds: Window<i64>) -> TrackerResult<TimelineTracker> {
        validate(&bounds)?;

        let tracker = self.with_transaction(|tx| {
            store::upsert_bounds(tx, entity_id, &bounds)?;
            store::load_tracker(tx, entity_id)
        })?;

        tracing::info!(entity_id = %entity_id, bounds = %bounds, "Timeline bounds set");
        Ok(tracker)
    }

    /// Record `window` as indexed
    ///
    /// Touching and overlapping windows are merged. Bounds grow to cover
    /// the inserted window and are never shrunk; a tracker without bounds
    /// takes the inserted window as its bounds.
    pub fn add_window(&self, entity_id: &str, window: Window<i64>) -> TrackerResult<TimelineTracker> {
        validate(&window)?;

        self.with_transaction(|tx| {
            let current = store::load_tracker(tx, entity_id)?;
            let outcome = merge_windows(&window, &current.windows);

            for deleted in &outcome.to_delete {
                store::delete_window(tx, entity_id, deleted)?;
            }

            if let Some(inserted) = outcome.to_insert {
                store::insert_window(tx, entity_id, &inserted)?;

                let bounds = extend_bounds(current.bounds, inserted);
                if current.bounds != Some(bounds) {
                    store::upsert_bounds(tx, entity_id, &bounds)?;
                }

                tracing::info!(
                    entity_id = %entity_id,
                    window = %window,
                    merged = %inserted,
                    replaced = outcome.to_delete.len(),
                    "Window added"
                );
            } else {
                tracing::debug!(entity_id = %entity_id, window = %window, "Window already tracked");
            }

            store::load_tracker(tx, entity_id)
        })
    }

    /// Forget every indexed window, keeping bounds
    pub fn clear_windows(&self, entity_id: &str) -> TrackerResult<TimelineTracker> {
        self.with_transaction(|tx| {
            let deleted = store::delete_all_windows(tx, entity_id)?;
            tracing::info!(entity_id = %entity_id, deleted, "Windows cleared");
            store::load_tracker(tx, entity_id)
        })
    }

    /// Ids of every entity with stored state
    pub fn entity_ids(&self) -> TrackerResult<Vec<String>> {
        let guard = self.store.lock().map_err(|_| TrackerError::LockPoisoned)?;
        guard.entity_ids()
    }
}

fn validate(window: &Window<i64>) -> TrackerResult<()> {
    if window.from < window.to {
        Ok(())
    } else {
        Err(TrackerError::InvalidWindow {
            from: window.from,
            to: window.to,
        })
    }
}
