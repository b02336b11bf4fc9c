//! API Routes
//!
//! Route handlers organized by functionality.

pub mod health;
pub mod indexing;
pub mod query_api;
pub mod trackers;
