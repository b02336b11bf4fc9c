//! Next Window Selector
//!
//! Decides which not-yet-indexed windows to work on next, newest first.
//!
//! Candidate boundaries sit on a grid of multiples of the window size
//! counted from zero. The partial segment between the highest grid line
//! and `bounds.to` is never offered: more data may still arrive there.
//! Gaps between tracked windows are filled edge to edge, so a gap that
//! straddles a grid line comes back as two undersized pieces.
//!
//! ```text
//! bounds [0,23), size 4, tracked [7,11) [13,15) [17,22)
//!
//! grid:   0   4   8   12  16  20
//!         |---|---|---|---|---|--
//! tracked        [7 11) [13 15) [17 22)
//! offered [0,4) [4,7) [11,12) [12,13) [15,16) [16,17)
//!         <------------- emitted right to left
//! ```

use super::window::Window;
use chrono::{DateTime, Duration, Utc};

/// A value that can be snapped to a grid of fixed steps
pub trait GridValue: Ord + Copy {
    type Step: Copy;

    /// Whether `step` can drive the grid at all
    fn valid_step(step: Self::Step) -> bool;

    /// Largest grid line not above `self`, clamped to the domain minimum
    fn align_down(self, step: Self::Step) -> Self;

    /// `self - step`, saturating at the domain minimum
    fn step_back(self, step: Self::Step) -> Self;
}

impl GridValue for i64 {
    type Step = i64;

    fn valid_step(step: i64) -> bool {
        step > 0
    }

    fn align_down(self, step: i64) -> i64 {
        let aligned = i128::from(self).div_euclid(i128::from(step)) * i128::from(step);
        i64::try_from(aligned).unwrap_or(i64::MIN)
    }

    fn step_back(self, step: i64) -> i64 {
        self.saturating_sub(step)
    }
}

impl GridValue for DateTime<Utc> {
    type Step = Duration;

    fn valid_step(step: Duration) -> bool {
        step.num_milliseconds() > 0
    }

    fn align_down(self, step: Duration) -> Self {
        let millis = self.timestamp_millis().align_down(step.num_milliseconds());
        DateTime::from_timestamp_millis(millis).unwrap_or(self)
    }

    fn step_back(self, step: Duration) -> Self {
        self.checked_sub_signed(step).unwrap_or(self)
    }
}

/// Suggests windows to index inside `bounds`, skipping tracked ones
#[derive(Debug, Clone)]
pub struct NextWindowSelector<T: GridValue> {
    bounds: Window<T>,
    window_size: T::Step,
    existing: Vec<Window<T>>,
}

impl<T: GridValue> NextWindowSelector<T> {
    pub fn new(bounds: Window<T>, window_size: T::Step) -> Self {
        Self {
            bounds,
            window_size,
            existing: Vec::new(),
        }
    }

    /// Builder method: windows already tracked
    pub fn existing_windows(mut self, windows: impl IntoIterator<Item = Window<T>>) -> Self {
        self.existing = windows.into_iter().collect();
        self.existing.sort();
        self
    }

    /// Lazily produce up to `count` windows, highest first
    ///
    /// Each call starts from scratch. The sequence ends early once
    /// `bounds.from` is reached.
    pub fn suggest_next_windows(&self, count: usize) -> SuggestedWindows<'_, T> {
        let exhausted = !T::valid_step(self.window_size);
        let top = if exhausted {
            self.bounds.from
        } else {
            self.bounds.to.align_down(self.window_size)
        };

        SuggestedWindows {
            selector: self,
            unpassed: self.existing.len(),
            top,
            remaining: if exhausted { 0 } else { count },
        }
    }

    pub fn suggest_next_window(&self) -> Option<Window<T>> {
        self.suggest_next_windows(1).next()
    }
}

/// Iterator returned by [`NextWindowSelector::suggest_next_windows`]
pub struct SuggestedWindows<'a, T: GridValue> {
    selector: &'a NextWindowSelector<T>,
    /// Tracked windows at indices below this have not been walked past yet
    unpassed: usize,
    /// Everything at or above this value is already dealt with
    top: T,
    remaining: usize,
}

impl<T: GridValue> Iterator for SuggestedWindows<'_, T> {
    type Item = Window<T>;

    fn next(&mut self) -> Option<Window<T>> {
        let bounds = self.selector.bounds;
        let size = self.selector.window_size;
        let existing = &self.selector.existing;

        loop {
            if self.remaining == 0 || self.top <= bounds.from {
                return None;
            }

            while self.unpassed > 0 && existing[self.unpassed - 1].from >= self.top {
                self.unpassed -= 1;
            }

            let floor = match self.unpassed.checked_sub(1).map(|i| existing[i]) {
                Some(tracked) if tracked.to >= self.top => {
                    // Tracked window reaches the top, jump below it
                    self.top = tracked.from;
                    self.unpassed -= 1;
                    continue;
                }
                Some(tracked) => tracked.to.max(bounds.from),
                None => bounds.from,
            };

            let aligned = self.top.align_down(size);
            let grid_line = if aligned < self.top {
                aligned
            } else {
                self.top.step_back(size)
            };
            let from = grid_line.max(floor);
            if from >= self.top {
                return None;
            }

            let candidate = Window { from, to: self.top };
            self.top = from;

            if existing.binary_search(&candidate).is_ok() {
                continue;
            }

            self.remaining -= 1;
            return Some(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::merger::merge_windows;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn suggest(
        bounds: (i64, i64),
        size: i64,
        existing: &[(i64, i64)],
        count: usize,
    ) -> Vec<Window<i64>> {
        NextWindowSelector::new(Window::new(bounds.0, bounds.1), size)
            .existing_windows(existing.iter().map(|&(f, t)| Window::new(f, t)))
            .suggest_next_windows(count)
            .collect()
    }

    fn windows(pairs: &[(i64, i64)]) -> Vec<Window<i64>> {
        pairs.iter().map(|&(f, t)| Window::new(f, t)).collect()
    }

    #[test]
    fn test_first_window_skips_trailing_partial() {
        let selector = NextWindowSelector::new(Window::new(0, 6089), 30);

        assert_eq!(selector.suggest_next_window(), Some(Window::new(6030, 6060)));
    }

    #[test]
    fn test_below_existing_window() {
        assert_eq!(
            suggest((0, 4056), 20, &[(4020, 4040)], 1),
            windows(&[(4000, 4020)])
        );
    }

    #[test]
    fn test_awkward_gaps_filled_exactly() {
        assert_eq!(
            suggest((0, 23), 4, &[(17, 22), (13, 15), (7, 11)], 6),
            windows(&[(16, 17), (15, 16), (12, 13), (11, 12), (4, 7), (0, 4)])
        );
    }

    #[test]
    fn test_gap_between_existing() {
        assert_eq!(
            suggest((0, 65), 10, &[(50, 60), (0, 10)], 4),
            windows(&[(40, 50), (30, 40), (20, 30), (10, 20)])
        );
    }

    #[test]
    fn test_sequence_is_finite() {
        assert_eq!(
            suggest((100, 200), 10, &[(120, 200)], 5),
            windows(&[(110, 120), (100, 110)])
        );
    }

    #[test]
    fn test_fully_indexed_yields_nothing() {
        assert!(suggest((0, 100), 10, &[(0, 100)], 3).is_empty());
    }

    #[test]
    fn test_bounds_smaller_than_a_window() {
        assert!(suggest((3, 7), 10, &[], 3).is_empty());
    }

    #[test]
    fn test_align_down_near_domain_minimum() {
        assert_eq!(i64::MIN.align_down(10), i64::MIN);
        assert_eq!((i64::MIN + 1).align_down(3), i64::MIN);
        assert_eq!((i64::MIN + 2).align_down(3), i64::MIN + 2);
        assert_eq!(i64::MAX.align_down(1), i64::MAX);
        assert_eq!((-7i64).align_down(5), -10);
    }

    #[test]
    fn test_gap_at_domain_minimum() {
        assert_eq!(
            suggest((i64::MIN, 10), 3, &[(i64::MIN + 1, -3)], 10),
            windows(&[(6, 9), (3, 6), (0, 3), (-3, 0), (i64::MIN, i64::MIN + 1)])
        );
    }

    #[test]
    fn test_unaligned_lower_bound() {
        assert_eq!(
            suggest((5, 40), 10, &[], 10),
            windows(&[(30, 40), (20, 30), (10, 20), (5, 10)])
        );
    }

    #[test]
    fn test_negative_values() {
        assert_eq!(
            suggest((-25, 5), 10, &[], 10),
            windows(&[(-10, 0), (-20, -10), (-25, -20)])
        );
    }

    #[test]
    fn test_invalid_size_yields_nothing() {
        assert!(suggest((0, 100), 0, &[], 3).is_empty());
        assert!(suggest((0, 100), -5, &[], 3).is_empty());
    }

    #[test]
    fn test_restartable() {
        let selector = NextWindowSelector::new(Window::new(0, 100), 10);

        let first: Vec<_> = selector.suggest_next_windows(2).collect();
        let second: Vec<_> = selector.suggest_next_windows(2).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_lazy() {
        let selector = NextWindowSelector::new(Window::new(0, i64::MAX / 2), 1);
        let mut iter = selector.suggest_next_windows(usize::MAX);

        assert!(iter.next().is_some());
        assert!(iter.next().is_some());
    }

    #[test]
    fn test_never_overlaps_existing() {
        let existing = [(3, 9), (14, 15), (31, 44), (60, 61), (77, 90)];
        let suggested = suggest((0, 100), 7, &existing, 100);

        for candidate in &suggested {
            for &(f, t) in &existing {
                assert!(!candidate.overlaps(&Window::new(f, t)));
            }
        }

        // Suggestions plus tracked windows cover [0, 98) exactly
        let mut all = windows(&existing);
        all.extend(suggested.iter().copied());
        all.sort();
        assert_eq!(all.first().map(|w| w.from), Some(0));
        for pair in all.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
        assert_eq!(all.last().map(|w| w.to), Some(98));
    }

    #[test]
    fn test_timestamp_domain() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 4, 6, 0, 0).unwrap();
        let day = Duration::days(1);

        let selector = NextWindowSelector::new(Window::new(start, end), day)
            .existing_windows([Window::new(start + day * 2, start + day * 3)]);
        let suggested: Vec<_> = selector.suggest_next_windows(5).collect();

        assert_eq!(
            suggested,
            vec![
                Window::new(start + day, start + day * 2),
                Window::new(start, start + day),
            ]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Suggestions avoid tracked windows, stay on the indexable part of
        /// the bounds and come out disjoint, highest first
        #[test]
        fn prop_suggestions_within_bounds_and_untracked(
            from in -100..100i64,
            width in 1..400i64,
            size in 1..50i64,
            tracked in proptest::collection::vec((0..400i64, 1..=30i64), 0..12),
            count in 0..60usize,
        ) {
            let bounds = Window::new(from, from + width);
            let mut existing: Vec<Window<i64>> = Vec::new();
            for (offset, len) in tracked {
                let start = (from + offset).min(bounds.to - 1);
                let window = Window::new(start, (start + len).min(bounds.to));
                merge_windows(&window, &existing).apply_to(&mut existing);
            }

            let selector = NextWindowSelector::new(bounds, size).existing_windows(existing.clone());
            let suggested: Vec<_> = selector.suggest_next_windows(count).collect();
            let top = bounds.to.align_down(size);

            prop_assert!(suggested.len() <= count);
            for candidate in &suggested {
                prop_assert!(candidate.from < candidate.to);
                prop_assert!(candidate.from >= bounds.from);
                prop_assert!(candidate.to <= top, "{:?} above {}", candidate, top);
                for window in &existing {
                    prop_assert!(!candidate.overlaps(window), "{:?} overlaps {:?}", candidate, window);
                }
            }
            for pair in suggested.windows(2) {
                prop_assert!(pair[1].to <= pair[0].from);
            }
        }
    }
}
