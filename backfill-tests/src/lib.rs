//! Shared test utilities for the backfill crates
//!
//! This crate provides:
//! - **Fixtures**: asset graph factories pinned to a fixed backfill start time
//! - **Mocks**: scripted [`RunExecutor`](backfill_engine::RunExecutor) implementations
//! - **Assertions**: helpers for status counts and snapshot invariants
//!
//! # Example
//!
//! ```ignore
//! use backfill_tests::{assertions, fixtures, mocks};
//!
//! #[tokio::test]
//! async fn test_failed_upstream_prunes_downstream() {
//!     let graph = fixtures::graphs::unpartitioned_daily_weekly();
//!     let executor = mocks::ScriptedRunExecutor::new(graph.clone()).fail_asset("daily");
//!
//!     // Drive the backfill and inspect the status counts
//!     // ...
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mocks;

// Re-export commonly used items
pub use fixtures::{graphs, time};
pub use mocks::ScriptedRunExecutor;
