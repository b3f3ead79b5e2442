//! Backfills driven end to end against scripted executors

use backfill_core::{AssetPartition, BackfillPolicy};
use backfill_engine::{
    AssetBackfillStatus, BackfillDriver, BackfillDriverConfig, BackfillRunStatus, Error,
    InMemoryBackfillStore,
};
use backfill_graph::AssetGraph;
use backfill_tests::assertions::{
    assert_counts, assert_snapshot_invariants, summary_for, ExpectedCounts,
};
use backfill_tests::fixtures::{all_partitions, graphs, time};
use backfill_tests::mocks::ScriptedRunExecutor;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

fn driver(
    graph: &Arc<AssetGraph>,
    executor: Arc<ScriptedRunExecutor>,
    config: BackfillDriverConfig,
) -> BackfillDriver {
    BackfillDriver::new(
        Arc::clone(graph),
        executor,
        Arc::new(InMemoryBackfillStore::new()),
        config,
    )
}

#[tokio::test]
async fn test_status_counts_after_upstream_fails() {
    let graph = graphs::unpartitioned_daily_weekly();
    let executor = Arc::new(ScriptedRunExecutor::new(Arc::clone(&graph)).fail_asset("daily"));
    let data = all_partitions(&graph, &["unpartitioned", "daily", "weekly"]);

    let report = driver(&graph, executor.clone(), BackfillDriverConfig::default())
        .run("test_backfill_id", data)
        .await
        .unwrap();

    assert_eq!(report.status, BackfillRunStatus::CompletedWithFailures);
    let completed = &report.backfill_data;
    assert_snapshot_invariants(completed);

    // The weekly asset failed with its upstream and was never requested
    let requested_or_failed = completed
        .requested_subset()
        .union(completed.failed_and_downstream_subset());
    assert_eq!(
        completed.requested_subset().len(),
        1 + time::num_daily_partitions()
    );
    assert_eq!(
        requested_or_failed.len(),
        1 + time::num_daily_partitions() + time::num_weekly_partitions()
    );

    let counts = completed.get_backfill_status_per_asset_key(&graph);
    assert_eq!(counts.len(), 3);
    assert_eq!(counts[0].asset_key().as_str(), "unpartitioned");
    assert_eq!(
        counts[0].backfill_status(),
        Some(AssetBackfillStatus::Materialized)
    );

    assert_eq!(counts[1].asset_key().as_str(), "daily");
    assert_counts(
        &counts[1],
        ExpectedCounts {
            failed: time::num_daily_partitions(),
            ..Default::default()
        },
    );
    assert_eq!(counts[1].num_targeted(), time::num_daily_partitions());

    assert_eq!(counts[2].asset_key().as_str(), "weekly");
    assert_counts(
        &counts[2],
        ExpectedCounts {
            failed: time::num_weekly_partitions(),
            ..Default::default()
        },
    );
    assert_eq!(counts[2].num_targeted(), time::num_weekly_partitions());

    // unpartitioned, then the daily range; weekly never ran
    assert_eq!(executor.requests().await.len(), 2);
}

#[tokio::test]
async fn test_successful_backfill_materializes_everything() {
    let graph = graphs::unpartitioned_daily_weekly();
    let executor = Arc::new(ScriptedRunExecutor::new(Arc::clone(&graph)));
    let data = all_partitions(&graph, &["unpartitioned", "daily", "weekly"]);
    let targeted = data.target_subset().len();

    let report = driver(&graph, executor.clone(), BackfillDriverConfig::default())
        .run("bf", data)
        .await
        .unwrap();

    assert_eq!(report.status, BackfillRunStatus::Completed);
    assert_eq!(report.summary.num_materialized, targeted);
    assert_eq!(report.summary.num_failed, 0);
    // One run per distinct shape, each waiting for its parent
    assert_eq!(report.runs_submitted, 3);
    assert_eq!(report.iterations, 4);

    let requests = executor.requests().await;
    assert!(requests
        .iter()
        .all(|request| request.backfill_id() == Some("bf")));
}

#[tokio::test]
async fn test_single_failed_partition_prunes_only_mapped_downstream() {
    let graph = graphs::daily_chain(
        BackfillPolicy::single_run(),
        BackfillPolicy::multi_run(7).unwrap(),
    );
    let executor = Arc::new(
        ScriptedRunExecutor::new(Arc::clone(&graph))
            .fail_partition(AssetPartition::partitioned("upstream_daily", "2023-03-01")),
    );
    let data = all_partitions(&graph, &["upstream_daily", "downstream_daily"]);

    let report = driver(&graph, executor, BackfillDriverConfig::default())
        .run("bf", data)
        .await
        .unwrap();

    assert_eq!(report.status, BackfillRunStatus::CompletedWithFailures);
    let statuses = report.backfill_data.get_backfill_status_per_asset_key(&graph);
    let expected = ExpectedCounts {
        materialized: time::num_daily_partitions() - 1,
        failed: 1,
        ..Default::default()
    };
    assert_counts(summary_for(&statuses, "upstream_daily"), expected);
    assert_counts(summary_for(&statuses, "downstream_daily"), expected);
    assert!(!report
        .backfill_data
        .requested_subset()
        .contains(&AssetPartition::partitioned("downstream_daily", "2023-03-01")));
}

#[tokio::test]
async fn test_executor_error_fails_every_covered_partition() {
    let graph = graphs::daily_chain(
        BackfillPolicy::single_run(),
        BackfillPolicy::single_run(),
    );
    let executor = Arc::new(
        ScriptedRunExecutor::new(Arc::clone(&graph)).reject_asset("upstream_daily"),
    );
    let data = all_partitions(&graph, &["upstream_daily", "downstream_daily"]);

    let report = driver(&graph, executor, BackfillDriverConfig::default())
        .run("bf", data)
        .await
        .unwrap();

    assert_eq!(report.status, BackfillRunStatus::CompletedWithFailures);
    assert_eq!(report.runs_submitted, 1);
    assert_eq!(report.summary.num_materialized, 0);
    assert_eq!(report.summary.num_failed, 2 * time::num_daily_partitions());
}

#[tokio::test]
async fn test_concurrent_runs_respect_limit() {
    let end = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
    let graph = graphs::bounded_daily(BackfillPolicy::multi_run(5).unwrap(), end);
    let executor = Arc::new(
        ScriptedRunExecutor::new(Arc::clone(&graph)).with_run_duration(Duration::from_millis(5)),
    );
    let data = all_partitions(&graph, &["daily"]);
    let config = BackfillDriverConfig {
        max_concurrent_runs: 3,
        ..Default::default()
    };

    let report = driver(&graph, executor.clone(), config)
        .run("bf", data)
        .await
        .unwrap();

    // 59 partitions in chunks of 5
    assert_eq!(report.runs_submitted, 12);
    assert_eq!(report.status, BackfillRunStatus::Completed);
    assert!(executor.peak_in_flight() <= 3);
    assert!(executor.peak_in_flight() >= 2);
}

#[tokio::test]
async fn test_iteration_cap_stalls_backfill() {
    let graph = graphs::unpartitioned_daily_weekly();
    let executor = Arc::new(ScriptedRunExecutor::new(Arc::clone(&graph)));
    let data = all_partitions(&graph, &["unpartitioned", "daily", "weekly"]);
    let config = BackfillDriverConfig {
        max_iterations: 2,
        ..Default::default()
    };

    let err = driver(&graph, executor, config)
        .run("bf", data)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Stalled(_)));
}

#[tokio::test]
async fn test_mixed_policies_abort_before_any_run() {
    let graph = graphs::mixed_policies();
    let executor = Arc::new(ScriptedRunExecutor::new(Arc::clone(&graph)));
    let data = all_partitions(&graph, &["unpartitioned", "upstream_daily"]);

    let err = driver(&graph, executor.clone(), BackfillDriverConfig::default())
        .run("bf", data)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
    assert!(executor.requests().await.is_empty());
}
