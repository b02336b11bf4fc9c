//! Timeline tracking
//!
//! Records which parts of a raw source's timeline have been copied into
//! its index, and picks what to copy next.
//!
//! # Components
//!
//! - [`Window`]: half-open interval over any ordered value
//! - [`WindowMerger`]: coalesces a new window into a sorted set
//! - [`NextWindowSelector`]: grid-aligned suggestions, newest first
//! - [`TimelineTracker`]: bounds plus indexed windows for one entity
//! - [`TimelineTrackerService`]: transactional operations over SQLite
//!
//! # Example
//!
//! ```rust,no_run
//! use autoindex::tracking::{TimelineTrackerService, Window};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TimelineTrackerService::in_memory()?;
//! service.set_bounds("doc-1", Window::new(0, 6089))?;
//!
//! let tracker = service.get("doc-1")?;
//! let next = tracker
//!     .next_window_selector(30)
//!     .and_then(|s| s.suggest_next_window());
//! assert_eq!(next, Some(Window::new(6030, 6060)));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod merger;
pub mod selector;
pub mod service;
pub mod store;
pub mod tracker;
pub mod window;

pub use error::{TrackerError, TrackerResult};
pub use merger::{merge_windows, MergeOutcome, WindowMerger};
pub use selector::{GridValue, NextWindowSelector, SuggestedWindows};
pub use service::TimelineTrackerService;
pub use store::TrackerStore;
pub use tracker::TimelineTracker;
pub use window::{HasBounds, Inside, Window};
