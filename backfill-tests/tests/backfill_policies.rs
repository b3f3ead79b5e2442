//! Run request shapes produced under each backfill policy

use backfill_core::{AssetKey, BackfillPolicy};
use backfill_engine::run_request::{
    ASSET_PARTITION_RANGE_END_TAG, ASSET_PARTITION_RANGE_START_TAG, BACKFILL_ID_TAG, PARTITION_TAG,
};
use backfill_engine::{advance, Error, ObservedOutcomes, MIXED_BACKFILL_POLICY_MESSAGE};
use backfill_tests::assertions::{assert_monotonic, assert_snapshot_invariants};
use backfill_tests::fixtures::{all_partitions, graphs, time};
use chrono::NaiveDate;
use std::collections::BTreeMap;

const BACKFILL_ID: &str = "test_backfill_id";

#[test]
fn test_not_all_assets_have_backfill_policy() {
    let graph = graphs::mixed_policies();
    let data = all_partitions(&graph, &["unpartitioned", "upstream_daily"]);

    let err = advance(BACKFILL_ID, &data, &graph, &ObservedOutcomes::new()).unwrap_err();
    assert_eq!(
        err,
        Error::Configuration(MIXED_BACKFILL_POLICY_MESSAGE.to_string())
    );
}

#[test]
fn test_parent_and_child_with_different_policies_run_separately() {
    let graph = graphs::daily_chain(
        BackfillPolicy::single_run(),
        BackfillPolicy::multi_run_default(),
    );
    let data = all_partitions(&graph, &["upstream_daily", "downstream_daily"]);

    let (next, run_requests) =
        advance(BACKFILL_ID, &data, &graph, &ObservedOutcomes::new()).unwrap();

    assert_ne!(next, data);
    assert_eq!(run_requests.len(), 1);
    // Only the upstream group is requested until it materializes
    assert_eq!(
        run_requests[0].asset_selection,
        vec![AssetKey::new("upstream_daily")]
    );
    assert_snapshot_invariants(&next);
}

#[test]
fn test_parent_and_child_with_same_policy_share_a_run() {
    let graph = graphs::unpartitioned_beside_daily_chain();
    let data = all_partitions(
        &graph,
        &["upstream_daily", "downstream_daily", "upstream_unpartitioned"],
    );

    let (next, run_requests) =
        advance(BACKFILL_ID, &data, &graph, &ObservedOutcomes::new()).unwrap();

    assert_ne!(next, data);
    assert_eq!(run_requests.len(), 2);
    for run_request in &run_requests {
        assert!(run_request.partition_key.is_none());
        if run_request.tag(ASSET_PARTITION_RANGE_START_TAG).is_some() {
            assert!(run_request
                .asset_selection
                .contains(&AssetKey::new("upstream_daily")));
            assert!(run_request
                .asset_selection
                .contains(&AssetKey::new("downstream_daily")));
            assert_eq!(
                run_request.tag(ASSET_PARTITION_RANGE_START_TAG),
                Some("2023-01-01")
            );
            assert_eq!(
                run_request.tag(ASSET_PARTITION_RANGE_END_TAG),
                Some(time::last_daily_key().as_str())
            );
        } else {
            assert_eq!(
                run_request.asset_selection,
                vec![AssetKey::new("upstream_unpartitioned")]
            );
            assert!(run_request.tag(ASSET_PARTITION_RANGE_END_TAG).is_none());
        }
    }
    // Everything targeted went out in the first iteration
    assert!(next.all_requested_or_failed());
}

#[test]
fn test_single_run_request_for_unpartitioned_asset() {
    let graph = graphs::single_unpartitioned(Some(BackfillPolicy::single_run()));
    let data = all_partitions(&graph, &["unpartitioned"]);

    let (next, run_requests) =
        advance(BACKFILL_ID, &data, &graph, &ObservedOutcomes::new()).unwrap();

    assert_ne!(next, data);
    assert_eq!(run_requests.len(), 1);
    assert!(run_requests[0].partition_key.is_none());
    assert!(run_requests[0].partition_range.is_none());
    assert_eq!(
        run_requests[0].tags,
        BTreeMap::from([(BACKFILL_ID_TAG.to_string(), BACKFILL_ID.to_string())])
    );
}

#[test]
fn test_single_run_request_for_partitioned_asset() {
    let graph = graphs::single_daily(BackfillPolicy::single_run());
    let data = all_partitions(&graph, &["daily"]);

    let (next, run_requests) =
        advance(BACKFILL_ID, &data, &graph, &ObservedOutcomes::new()).unwrap();

    assert_ne!(next, data);
    assert_eq!(run_requests.len(), 1);
    assert!(run_requests[0].partition_key.is_none());
    assert_eq!(
        run_requests[0].tag(ASSET_PARTITION_RANGE_START_TAG),
        Some("2023-01-01")
    );
    assert_eq!(
        run_requests[0].tag(ASSET_PARTITION_RANGE_END_TAG),
        Some(time::last_daily_key().as_str())
    );
    assert_eq!(next.requested_subset().len(), time::num_daily_partitions());
}

#[test]
fn test_multiple_run_requests_for_partitioned_asset() {
    let end = NaiveDate::from_ymd_opt(2023, 8, 11).unwrap();
    let graph = graphs::bounded_daily(BackfillPolicy::multi_run(7).unwrap(), end);
    let keys = graph
        .partitions_def(&AssetKey::new("daily"))
        .unwrap()
        .keys(time::now().naive_utc());
    let data = all_partitions(&graph, &["daily"]);

    let (next, run_requests) =
        advance(BACKFILL_ID, &data, &graph, &ObservedOutcomes::new()).unwrap();

    assert_ne!(next, data);
    assert_eq!(run_requests.len(), keys.len().div_ceil(7));
    assert!(run_requests[0].partition_key.is_none());
    assert_eq!(
        run_requests[0].tag(ASSET_PARTITION_RANGE_START_TAG),
        Some("2023-01-01")
    );
    assert_eq!(
        run_requests.last().unwrap().tag(ASSET_PARTITION_RANGE_END_TAG),
        keys.last().map(String::as_str)
    );
    // Chunks are emitted oldest first
    let starts: Vec<&str> = run_requests
        .iter()
        .filter_map(|r| r.tag(ASSET_PARTITION_RANGE_START_TAG))
        .collect();
    let mut sorted = starts.clone();
    sorted.sort();
    assert_eq!(starts, sorted);
}

#[test]
fn test_no_policy_emits_one_run_per_partition() {
    let graph = graphs::policyless_daily_chain();
    let data = all_partitions(&graph, &["a", "b", "c"]);

    let (next, run_requests) =
        advance(BACKFILL_ID, &data, &graph, &ObservedOutcomes::new()).unwrap();

    // The chain shares one shape, so each partition key runs all three assets
    assert_eq!(run_requests.len(), time::num_daily_partitions());
    for run_request in &run_requests {
        assert_eq!(
            run_request.asset_selection,
            vec![AssetKey::new("a"), AssetKey::new("b"), AssetKey::new("c")]
        );
        let partition_key = run_request.partition_key.as_deref().unwrap();
        assert_eq!(run_request.tag(PARTITION_TAG), Some(partition_key));
        assert!(run_request.partition_range.is_none());
    }
    assert!(next.all_requested_or_failed());
    assert_snapshot_invariants(&next);
}

#[test]
fn test_repeated_advance_never_shrinks_status_sets() {
    let graph = graphs::daily_chain(
        BackfillPolicy::single_run(),
        BackfillPolicy::multi_run(7).unwrap(),
    );
    let data = all_partitions(&graph, &["upstream_daily", "downstream_daily"]);

    let (first, _) = advance(BACKFILL_ID, &data, &graph, &ObservedOutcomes::new()).unwrap();
    let (second, run_requests) =
        advance(BACKFILL_ID, &first, &graph, &ObservedOutcomes::new()).unwrap();

    assert!(run_requests.is_empty());
    assert_monotonic(&data, &first);
    assert_monotonic(&first, &second);
    assert_eq!(first, second);
}
