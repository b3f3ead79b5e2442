//! Criterion benchmarks for backfill iterations
//!
//! These benchmarks measure `advance` on wide and deep asset graphs so the
//! frontier walk and failure contagion keep acceptable scaling.

use backfill_core::{AssetDefinition, AssetPartition, BackfillPolicy};
use backfill_engine::{advance, AssetBackfillData, BackfillSelection, ObservedOutcomes};
use backfill_graph::AssetGraph;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::num::NonZeroU32;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
}

/// 90 daily partitions per asset
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap()
}

fn multi_run() -> BackfillPolicy {
    BackfillPolicy::MultiRun {
        max_partitions_per_run: NonZeroU32::new(7).unwrap(),
    }
}

/// Create a chain graph: asset_0 -> asset_1 -> ... -> asset_n
fn create_chain_graph(size: usize) -> (AssetGraph, Vec<String>) {
    let names: Vec<String> = (0..size).map(|i| format!("asset_{}", i)).collect();
    let definitions = names.iter().enumerate().map(|(i, name)| {
        let builder = AssetDefinition::builder(name.as_str())
            .partitioned_daily(start())
            .backfill_policy(multi_run());
        if i > 0 {
            builder.depends_on(names[i - 1].as_str()).build()
        } else {
            builder.build()
        }
    });
    (AssetGraph::from_definitions(definitions).unwrap(), names)
}

/// Create a fan-out graph: one source with N single-run children
fn create_fan_out_graph(fan_out: usize) -> (AssetGraph, Vec<String>) {
    let mut names = vec!["source".to_string()];
    names.extend((0..fan_out).map(|i| format!("target_{}", i)));

    let definitions = names.iter().map(|name| {
        let builder = AssetDefinition::builder(name.as_str())
            .partitioned_daily(start())
            .single_run();
        if name == "source" {
            builder.build()
        } else {
            builder.depends_on("source").build()
        }
    });
    (AssetGraph::from_definitions(definitions).unwrap(), names)
}

fn initial_data(graph: &AssetGraph, names: &[String]) -> AssetBackfillData {
    AssetBackfillData::from_asset_partitions(
        graph,
        &BackfillSelection::all_partitions(names.iter().map(String::as_str)),
        now(),
    )
    .unwrap()
}

fn bench_first_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_iteration");

    for size in [10usize, 50, 200].iter() {
        let (chain, chain_names) = create_chain_graph(*size);
        let chain_data = initial_data(&chain, &chain_names);
        group.throughput(Throughput::Elements(chain_data.target_subset().len() as u64));
        group.bench_with_input(BenchmarkId::new("chain", size), &chain_data, |b, data| {
            b.iter(|| {
                advance("bench", black_box(data), &chain, &ObservedOutcomes::new()).unwrap()
            });
        });

        let (fan_out, fan_names) = create_fan_out_graph(*size);
        let fan_data = initial_data(&fan_out, &fan_names);
        group.bench_with_input(BenchmarkId::new("fan_out", size), &fan_data, |b, data| {
            b.iter(|| {
                advance("bench", black_box(data), &fan_out, &ObservedOutcomes::new()).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_failure_contagion(c: &mut Criterion) {
    let mut group = c.benchmark_group("failure_contagion");

    for size in [10usize, 50, 200].iter() {
        let (graph, names) = create_chain_graph(*size);
        let data = initial_data(&graph, &names);
        let (requested, _) = advance("bench", &data, &graph, &ObservedOutcomes::new()).unwrap();

        // Failing the root's partitions cascades down the whole chain
        let mut outcomes = ObservedOutcomes::new();
        for asset_partition in requested.requested_subset().iter() {
            outcomes.record_failed(AssetPartition::clone(asset_partition));
        }

        group.bench_with_input(BenchmarkId::new("chain", size), &requested, |b, data| {
            b.iter(|| advance("bench", black_box(data), &graph, &outcomes).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_first_iteration, bench_failure_contagion);
criterion_main!(benches);
