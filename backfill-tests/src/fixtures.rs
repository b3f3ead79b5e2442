//! Test data factories for backfill types
//!
//! Every factory is pinned to [`time::now`] so partition counts are stable.

use backfill_core::{AssetDefinition, BackfillPolicy, PartitionsDefinition};
use backfill_engine::{AssetBackfillData, BackfillSelection};
use backfill_graph::AssetGraph;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

/// Fixed clock
pub mod time {
    use super::*;

    /// Backfill start time used across the tests
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 8, 15, 12, 0, 0)
            .single()
            .expect("valid fixture time")
    }

    /// First day of every fixture partitions definition
    pub fn partitions_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid fixture date")
    }

    /// Number of daily partitions that exist at [`now`]
    pub fn num_daily_partitions() -> usize {
        PartitionsDefinition::daily(partitions_start()).count(now().naive_utc())
    }

    /// Number of weekly partitions that exist at [`now`]
    pub fn num_weekly_partitions() -> usize {
        PartitionsDefinition::weekly(partitions_start()).count(now().naive_utc())
    }

    /// Latest daily partition key at [`now`]
    pub fn last_daily_key() -> String {
        PartitionsDefinition::daily(partitions_start())
            .keys(now().naive_utc())
            .pop()
            .expect("fixture has daily partitions")
    }
}

/// Asset graph factories
pub mod graphs {
    use super::*;

    fn build(definitions: Vec<AssetDefinition>) -> Arc<AssetGraph> {
        Arc::new(AssetGraph::from_definitions(definitions).expect("valid fixture graph"))
    }

    fn daily(key: &str, policy: Option<BackfillPolicy>) -> AssetDefinition {
        let builder = AssetDefinition::builder(key).partitioned_daily(time::partitions_start());
        match policy {
            Some(policy) => builder.backfill_policy(policy).build(),
            None => builder.build(),
        }
    }

    /// One daily asset with the given policy
    pub fn single_daily(policy: BackfillPolicy) -> Arc<AssetGraph> {
        build(vec![daily("daily", Some(policy))])
    }

    /// One daily asset with an exclusive end date
    pub fn bounded_daily(policy: BackfillPolicy, end: NaiveDate) -> Arc<AssetGraph> {
        let partitions = backfill_core::TimeWindowPartitions::new(
            backfill_core::TimeGranularity::Daily,
            time::partitions_start(),
        )
        .with_end(end);
        build(vec![AssetDefinition::builder("daily")
            .partitions(PartitionsDefinition::TimeWindow(partitions))
            .backfill_policy(policy)
            .build()])
    }

    /// One unpartitioned asset with the given policy
    pub fn single_unpartitioned(policy: Option<BackfillPolicy>) -> Arc<AssetGraph> {
        let mut definition = AssetDefinition::new("unpartitioned");
        definition.backfill_policy = policy;
        build(vec![definition])
    }

    /// Unpartitioned asset without a policy next to a single-run daily asset
    pub fn mixed_policies() -> Arc<AssetGraph> {
        build(vec![
            AssetDefinition::new("unpartitioned"),
            daily("upstream_daily", Some(BackfillPolicy::single_run())),
        ])
    }

    /// `upstream_daily -> downstream_daily` with independent policies
    pub fn daily_chain(upstream: BackfillPolicy, downstream: BackfillPolicy) -> Arc<AssetGraph> {
        let mut child = daily("downstream_daily", Some(downstream));
        child.add_dependency("upstream_daily");
        build(vec![daily("upstream_daily", Some(upstream)), child])
    }

    /// Single-run unpartitioned root beside a single-run daily chain
    pub fn unpartitioned_beside_daily_chain() -> Arc<AssetGraph> {
        let mut child = daily("downstream_daily", Some(BackfillPolicy::single_run()));
        child.add_dependency("upstream_daily");
        build(vec![
            AssetDefinition::builder("upstream_unpartitioned")
                .single_run()
                .build(),
            daily("upstream_daily", Some(BackfillPolicy::single_run())),
            child,
        ])
    }

    /// `unpartitioned -> daily -> weekly`, all single-run
    pub fn unpartitioned_daily_weekly() -> Arc<AssetGraph> {
        build(vec![
            AssetDefinition::builder("unpartitioned")
                .single_run()
                .build(),
            AssetDefinition::builder("daily")
                .partitioned_daily(time::partitions_start())
                .single_run()
                .depends_on("unpartitioned")
                .build(),
            AssetDefinition::builder("weekly")
                .partitioned_weekly(time::partitions_start())
                .single_run()
                .depends_on("daily")
                .build(),
        ])
    }

    /// `a -> b -> c` daily assets without backfill policies
    pub fn policyless_daily_chain() -> Arc<AssetGraph> {
        let mut b = daily("b", None);
        b.add_dependency("a");
        let mut c = daily("c", None);
        c.add_dependency("b");
        build(vec![daily("a", None), b, c])
    }
}

/// Snapshot targeting every partition of `assets` at [`time::now`]
pub fn all_partitions(graph: &AssetGraph, assets: &[&str]) -> AssetBackfillData {
    AssetBackfillData::from_asset_partitions(
        graph,
        &BackfillSelection::all_partitions(assets.iter().copied()),
        time::now(),
    )
    .expect("valid fixture selection")
}
