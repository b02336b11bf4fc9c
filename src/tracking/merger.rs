//! Window Merger
//!
//! Inserts a new window into a sorted set of non-overlapping windows.
//! Every existing window that overlaps or touches the new one is swallowed
//! into a single combined window:
//!
//! ```text
//! existing:  [0,10)      [20,30)      [40,50)
//! new:             [10,20)
//! result:    [0,30)                   [40,50)
//!            delete {[0,10), [20,30)}, insert [0,30)
//! ```
//!
//! The merger never touches storage. It reports what to delete and what to
//! insert, and the caller applies that inside its own transaction.

use super::window::{HasBounds, Window};
use std::marker::PhantomData;

/// What the caller must do to its window set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome<W> {
    /// Combined window, None when the new window was already covered
    pub to_insert: Option<W>,
    /// Existing windows swallowed by the combined window
    pub to_delete: Vec<W>,
}

impl<W> MergeOutcome<W> {
    /// Nothing to do
    pub fn unchanged() -> Self {
        Self {
            to_insert: None,
            to_delete: Vec::new(),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.to_insert.is_none() && self.to_delete.is_empty()
    }
}

impl<T: Ord + Copy> MergeOutcome<Window<T>> {
    /// Apply the outcome to an in-memory window list, keeping it sorted
    pub fn apply_to(self, windows: &mut Vec<Window<T>>) {
        windows.retain(|w| !self.to_delete.contains(w));
        if let Some(inserted) = self.to_insert {
            windows.push(inserted);
        }
        windows.sort();
    }
}

/// Generic merge over any bounded type
///
/// `factory` builds a `W` from two endpoints so the same algorithm serves
/// integer and timestamp windows alike.
pub struct WindowMerger<T, W, F> {
    factory: F,
    _marker: PhantomData<fn() -> (T, W)>,
}

impl<T, W, F> WindowMerger<T, W, F>
where
    T: Ord + Copy,
    W: HasBounds<T> + Clone,
    F: Fn(T, T) -> W,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            _marker: PhantomData,
        }
    }

    /// Merge `new_window` into `existing`
    ///
    /// `existing` must not contain overlapping or touching windows, which
    /// holds for any set built only through this method.
    pub fn merge<'a, I>(&self, new_window: &W, existing: I) -> MergeOutcome<W>
    where
        I: IntoIterator<Item = &'a W>,
        W: 'a,
    {
        let matched: Vec<&W> = existing
            .into_iter()
            .filter(|e| e.upper() >= new_window.lower() && e.lower() <= new_window.upper())
            .collect();

        let subsumed = matched
            .iter()
            .any(|e| e.lower() <= new_window.lower() && e.upper() >= new_window.upper());
        if subsumed {
            return MergeOutcome::unchanged();
        }

        let from = matched
            .iter()
            .map(|e| e.lower())
            .fold(new_window.lower(), |acc, v| acc.min(v));
        let to = matched
            .iter()
            .map(|e| e.upper())
            .fold(new_window.upper(), |acc, v| acc.max(v));

        MergeOutcome {
            to_insert: Some((self.factory)(from, to)),
            to_delete: matched.into_iter().cloned().collect(),
        }
    }
}

/// Merge plain windows
pub fn merge_windows<T: Ord + Copy>(
    new_window: &Window<T>,
    existing: &[Window<T>],
) -> MergeOutcome<Window<T>> {
    WindowMerger::new(Window::new).merge(new_window, existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn build(windows: &[(i64, i64)]) -> Vec<Window<i64>> {
        let mut result = Vec::new();
        for &(from, to) in windows {
            merge_windows(&Window::new(from, to), &result).apply_to(&mut result);
        }
        result
    }

    #[test]
    fn test_merge_into_empty() {
        let outcome = merge_windows(&Window::new(10, 20), &[]);

        assert_eq!(outcome.to_insert, Some(Window::new(10, 20)));
        assert!(outcome.to_delete.is_empty());
    }

    #[test]
    fn test_no_overlap() {
        let existing = vec![Window::new(0, 5), Window::new(30, 40)];
        let outcome = merge_windows(&Window::new(10, 20), &existing);

        assert_eq!(outcome.to_insert, Some(Window::new(10, 20)));
        assert!(outcome.to_delete.is_empty());
    }

    #[test]
    fn test_overlap_start() {
        let existing = vec![Window::new(15, 30)];
        let outcome = merge_windows(&Window::new(10, 20), &existing);

        assert_eq!(outcome.to_insert, Some(Window::new(10, 30)));
        assert_eq!(outcome.to_delete, vec![Window::new(15, 30)]);
    }

    #[test]
    fn test_overlap_end() {
        let existing = vec![Window::new(0, 12)];
        let outcome = merge_windows(&Window::new(10, 20), &existing);

        assert_eq!(outcome.to_insert, Some(Window::new(0, 20)));
        assert_eq!(outcome.to_delete, vec![Window::new(0, 12)]);
    }

    #[test]
    fn test_new_subsumed_by_existing() {
        let existing = vec![Window::new(0, 100)];
        let outcome = merge_windows(&Window::new(10, 20), &existing);

        assert!(outcome.is_unchanged());
    }

    #[test]
    fn test_identical_window_is_noop() {
        let existing = vec![Window::new(10, 20)];
        let outcome = merge_windows(&Window::new(10, 20), &existing);

        assert!(outcome.is_unchanged());
    }

    #[test]
    fn test_existing_subsumed_by_new() {
        let existing = vec![Window::new(12, 14), Window::new(16, 18)];
        let outcome = merge_windows(&Window::new(10, 20), &existing);

        assert_eq!(outcome.to_insert, Some(Window::new(10, 20)));
        assert_eq!(outcome.to_delete.len(), 2);
    }

    #[test]
    fn test_adjacent_windows_merge() {
        let existing = vec![Window::new(0, 10)];
        let outcome = merge_windows(&Window::new(10, 20), &existing);

        assert_eq!(outcome.to_insert, Some(Window::new(0, 20)));
        assert_eq!(outcome.to_delete, vec![Window::new(0, 10)]);
    }

    #[test]
    fn test_chain_collapses_to_one() {
        let windows = build(&[(0, 10), (20, 30), (40, 50), (60, 70)]);
        assert_eq!(windows.len(), 4);

        // Fill the gaps out of order
        let windows = {
            let mut w = windows;
            merge_windows(&Window::new(30, 40), &w).apply_to(&mut w);
            merge_windows(&Window::new(50, 60), &w).apply_to(&mut w);
            merge_windows(&Window::new(10, 20), &w).apply_to(&mut w);
            w
        };

        assert_eq!(windows, vec![Window::new(0, 70)]);
    }

    #[test]
    fn test_bridge_touching_both_neighbours() {
        let existing = vec![Window::new(0, 10), Window::new(20, 30), Window::new(50, 60)];
        let outcome = merge_windows(&Window::new(10, 20), &existing);

        assert_eq!(outcome.to_insert, Some(Window::new(0, 30)));
        assert_eq!(
            outcome.to_delete,
            vec![Window::new(0, 10), Window::new(20, 30)]
        );
    }

    #[test]
    fn test_months_merge() {
        let now: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let one_month_ago = now - Duration::days(30);
        let two_months_ago = now - Duration::days(60);
        let three_months_ago = now - Duration::days(90);

        let mut windows = Vec::new();
        merge_windows(&Window::new(one_month_ago, now), &windows).apply_to(&mut windows);
        merge_windows(&Window::new(two_months_ago, one_month_ago), &windows)
            .apply_to(&mut windows);
        assert_eq!(windows, vec![Window::new(two_months_ago, now)]);

        let mut windows = Vec::new();
        merge_windows(&Window::new(one_month_ago, now), &windows).apply_to(&mut windows);
        merge_windows(&Window::new(three_months_ago, two_months_ago), &windows)
            .apply_to(&mut windows);
        assert_eq!(
            windows,
            vec![
                Window::new(three_months_ago, two_months_ago),
                Window::new(one_month_ago, now)
            ]
        );
    }

    #[test]
    fn test_custom_factory() {
        #[derive(Debug, Clone, PartialEq)]
        struct Tagged {
            from: u32,
            to: u32,
            tag: &'static str,
        }

        impl HasBounds<u32> for Tagged {
            fn lower(&self) -> u32 {
                self.from
            }
            fn upper(&self) -> u32 {
                self.to
            }
        }

        let merger = WindowMerger::new(|from: u32, to: u32| Tagged {
            from,
            to,
            tag: "merged",
        });
        let existing = vec![Tagged {
            from: 0,
            to: 5,
            tag: "old",
        }];
        let outcome = merger.merge(
            &Tagged {
                from: 5,
                to: 9,
                tag: "new",
            },
            &existing,
        );

        let inserted = outcome.to_insert.unwrap();
        assert_eq!((inserted.from, inserted.to, inserted.tag), (0, 9, "merged"));
    }

    fn insert_all<'a>(inserts: impl IntoIterator<Item = &'a Window<i64>>) -> Vec<Window<i64>> {
        let mut windows = Vec::new();
        for window in inserts {
            merge_windows(window, &windows).apply_to(&mut windows);
        }
        windows
    }

    fn window_strategy() -> impl Strategy<Value = Window<i64>> {
        (0..190i64, 1..=10i64).prop_map(|(from, len)| Window::new(from, from + len))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Windows stay sorted, disjoint and non-touching, covering exactly what was inserted
        #[test]
        fn prop_inserts_keep_windows_disjoint(
            inserts in proptest::collection::vec(window_strategy(), 0..40),
        ) {
            let mut windows: Vec<Window<i64>> = Vec::new();
            let mut covered = [false; 200];

            for window in &inserts {
                for p in window.from..window.to {
                    covered[p as usize] = true;
                }
                merge_windows(window, &windows).apply_to(&mut windows);

                // Twice is the same as once
                let again = merge_windows(window, &windows);
                prop_assert!(again.is_unchanged());
            }

            for pair in windows.windows(2) {
                prop_assert!(pair[0].to < pair[1].from, "{:?} touches {:?}", pair[0], pair[1]);
            }
            for (p, &expected) in covered.iter().enumerate() {
                let actual = windows.iter().any(|w| w.is_inside(p as i64));
                prop_assert_eq!(actual, expected, "point {}", p);
            }
        }

        /// The final set depends only on what was inserted, not the order
        #[test]
        fn prop_insert_order_irrelevant(
            inserts in proptest::collection::vec(window_strategy(), 0..30),
        ) {
            let forward = insert_all(&inserts);
            let backward = insert_all(inserts.iter().rev());
            prop_assert_eq!(forward, backward);
        }
    }
}
