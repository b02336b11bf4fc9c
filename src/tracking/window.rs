//! Window primitive
//!
//! A half-open interval `[from, to)` over any totally ordered value.
//! Windows are plain values: two windows are equal when their bounds are.
//!
//! ```text
//!            from                to
//!   LOWER     |     WITHIN       |    HIGHER
//!  ---------- [==================) ----------
//!        BOTTOM_EDGE         TOP_EDGE
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a value relative to a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Inside {
    /// value < from
    Lower,
    /// value == from
    BottomEdge,
    /// from < value < to
    Within,
    /// value == to
    TopEdge,
    /// value > to
    Higher,
}

impl Inside {
    /// Whether this position is covered by the half-open window
    pub fn is_inside(self) -> bool {
        matches!(self, Inside::BottomEdge | Inside::Within)
    }
}

/// Anything with a lower and upper bound that the merger can work over
pub trait HasBounds<T: Ord + Copy> {
    /// Inclusive lower bound
    fn lower(&self) -> T;

    /// Exclusive upper bound
    fn upper(&self) -> T;

    /// Classify a value against these bounds
    fn check_inside(&self, value: T) -> Inside {
        match value.cmp(&self.lower()) {
            std::cmp::Ordering::Less => Inside::Lower,
            std::cmp::Ordering::Equal => Inside::BottomEdge,
            std::cmp::Ordering::Greater => match value.cmp(&self.upper()) {
                std::cmp::Ordering::Less => Inside::Within,
                std::cmp::Ordering::Equal => Inside::TopEdge,
                std::cmp::Ordering::Greater => Inside::Higher,
            },
        }
    }

    /// `lower <= value < upper`
    fn is_inside(&self, value: T) -> bool {
        self.check_inside(value).is_inside()
    }
}

/// Half-open interval `[from, to)`
///
/// Ordering is by `from`, then `to`, so a sorted collection of
/// non-overlapping windows is in timeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Window<T> {
    /// Inclusive start
    pub from: T,
    /// Exclusive end
    pub to: T,
}

impl<T: Ord + Copy> Window<T> {
    /// Create a new window
    ///
    /// # Panics
    /// Panics if from > to
    pub fn new(from: T, to: T) -> Self {
        assert!(from <= to, "Window: from must not be greater than to");
        Self { from, to }
    }

    /// Create a window, returning None if from > to
    pub fn try_new(from: T, to: T) -> Option<Self> {
        if from <= to {
            Some(Self { from, to })
        } else {
            None
        }
    }

    /// A window with no points in it
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Whether the two windows share at least one point
    pub fn overlaps(&self, other: &Window<T>) -> bool {
        self.from < other.to && other.from < self.to
    }

    /// Whether the two windows overlap or share a boundary point
    pub fn touches(&self, other: &Window<T>) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    /// Whether `other` lies entirely inside this window
    pub fn covers(&self, other: &Window<T>) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    /// The overlapping part of two windows, if any
    pub fn intersection(&self, other: &Window<T>) -> Option<Window<T>> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        if from < to {
            Some(Window { from, to })
        } else {
            None
        }
    }

    /// Smallest window containing both
    pub fn span(&self, other: &Window<T>) -> Window<T> {
        Window {
            from: self.from.min(other.from),
            to: self.to.max(other.to),
        }
    }
}

impl<T: Ord + Copy> HasBounds<T> for Window<T> {
    fn lower(&self) -> T {
        self.from
    }

    fn upper(&self) -> T {
        self.to
    }
}

impl<T: fmt::Display> fmt::Display for Window<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}
