//! Timeline Tracker
//!
//! Per-entity record of what the raw source holds (`bounds`) and what has
//! already been copied into the index (`windows`). Bounds are the extent of
//! known raw data, not the indexed extent.
//!
//! ```text
//! bounds   [=====================================)
//! windows       [====)     [=========)      [===)
//! invert   [====)    [=====)         [======)
//! ```

use super::error::{TrackerError, TrackerResult};
use super::merger::merge_windows;
use super::selector::NextWindowSelector;
use super::window::Window;
use serde::{Deserialize, Serialize};

/// Snapshot of one entity's timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineTracker {
    pub entity_id: String,
    pub bounds: Option<Window<i64>>,
    /// Sorted by `from`, never overlapping or touching
    pub windows: Vec<Window<i64>>,
}

impl TimelineTracker {
    /// A tracker with no bounds and nothing indexed
    pub fn empty(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            bounds: None,
            windows: Vec::new(),
        }
    }

    /// Builder method: set bounds
    pub fn with_bounds(mut self, bounds: Window<i64>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Builder method: merge a window in, extending bounds as the store would
    pub fn with_window(mut self, window: Window<i64>) -> Self {
        let outcome = merge_windows(&window, &self.windows);
        if let Some(inserted) = outcome.to_insert {
            self.bounds = Some(extend_bounds(self.bounds, inserted));
        }
        outcome.apply_to(&mut self.windows);
        self
    }

    /// Gaps between tracked windows inside the bounds
    pub fn invert(&self) -> TrackerResult<Vec<Window<i64>>> {
        let bounds = self
            .bounds
            .ok_or_else(|| TrackerError::NoBounds(self.entity_id.clone()))?;
        Ok(self.gaps_within(bounds))
    }

    /// Parts of `range` covered by tracked windows, in order
    pub fn covered_within(&self, range: Window<i64>) -> Vec<Window<i64>> {
        self.windows
            .iter()
            .filter_map(|w| w.intersection(&range))
            .collect()
    }

    /// Parts of `range` not covered by any tracked window, in order
    pub fn gaps_within(&self, range: Window<i64>) -> Vec<Window<i64>> {
        let mut gaps = Vec::new();
        let mut cursor = range.from;

        for window in &self.windows {
            if window.to <= cursor {
                continue;
            }
            if window.from >= range.to {
                break;
            }
            if window.from > cursor {
                gaps.push(Window::new(cursor, window.from));
            }
            cursor = window.to;
        }

        if cursor < range.to {
            gaps.push(Window::new(cursor, range.to));
        }
        gaps
    }

    /// Selector over this tracker, None until bounds are known
    pub fn next_window_selector(&self, window_size: i64) -> Option<NextWindowSelector<i64>> {
        self.bounds.map(|bounds| {
            NextWindowSelector::new(bounds, window_size).existing_windows(self.windows.iter().copied())
        })
    }

    /// Total span of tracked windows, saturating at `i64::MAX`
    pub fn indexed_span(&self) -> i64 {
        self.windows
            .iter()
            .fold(0i64, |total, w| total.saturating_add(w.to.saturating_sub(w.from)))
    }
}

/// Grow `bounds` so it contains `inserted`; missing bounds become `inserted`
pub(crate) fn extend_bounds(bounds: Option<Window<i64>>, inserted: Window<i64>) -> Window<i64> {
    match bounds {
        Some(bounds) => bounds.span(&inserted),
        None => inserted,
    }
}
