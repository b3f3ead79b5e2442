//! Prometheus metrics for backfill driving
//!
//! Metrics are recorded by the driver; the iteration itself stays pure.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};

lazy_static! {
    /// Total number of backfill iterations
    ///
    /// Labels:
    /// - outcome: "requested" (emitted runs), "idle" (nothing to request), "error"
    pub static ref BACKFILL_ITERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "backfill_iterations_total",
        "Total number of backfill iterations",
        &["outcome"]
    )
    .expect("backfill_iterations_total metric registration");

    /// Total number of run requests emitted
    ///
    /// Labels:
    /// - policy: "single_run", "multi_run", "none"
    pub static ref BACKFILL_RUN_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "backfill_run_requests_total",
        "Total number of run requests emitted by backfills",
        &["policy"]
    )
    .expect("backfill_run_requests_total metric registration");

    /// Total number of asset-partition outcomes folded into backfills
    ///
    /// Labels:
    /// - status: "MATERIALIZED", "FAILED"
    pub static ref BACKFILL_ASSET_PARTITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "backfill_asset_partitions_total",
        "Total number of asset-partition outcomes observed by backfills",
        &["status"]
    )
    .expect("backfill_asset_partitions_total metric registration");

    /// Duration of a single iteration in seconds
    ///
    /// Buckets: 100us to 5s
    pub static ref BACKFILL_ITERATION_DURATION: Histogram = register_histogram!(
        "backfill_iteration_duration_seconds",
        "Duration of backfill iterations",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("backfill_iteration_duration_seconds metric registration");

    /// Runs currently executing
    pub static ref BACKFILL_RUNS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "backfill_runs_in_flight",
        "Number of backfill runs currently executing"
    )
    .expect("backfill_runs_in_flight metric registration");
}
