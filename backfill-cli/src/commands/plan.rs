//! Plan command
//!
//! Shows what a backfill would target and the run requests its first
//! iteration would emit, without executing or persisting anything.

use super::{load_graph, print_statuses, SelectionArgs};
use anyhow::{Context, Result};
use backfill_engine::{advance, AssetBackfillData, ObservedOutcomes, RunRequest};
use std::path::Path;
use tracing::info;

pub async fn execute(graph_path: &Path, selection_args: &SelectionArgs, json: bool) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let selection = selection_args.to_selection(&graph)?;
    let start_time = selection_args.start_time()?;

    let backfill_data = AssetBackfillData::from_asset_partitions(&graph, &selection, start_time)
        .context("Failed to resolve backfill selection")?;
    let (_, run_requests) = advance("plan", &backfill_data, &graph, &ObservedOutcomes::new())
        .context("Backfill cannot be scheduled")?;

    info!(
        targeted = backfill_data.target_subset().len(),
        run_requests = run_requests.len(),
        "Planned backfill"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&run_requests)?);
        return Ok(());
    }

    println!("Start time: {}", start_time.to_rfc3339());
    println!(
        "Targeted asset-partitions: {}",
        backfill_data.target_subset().len()
    );
    println!();
    print_statuses(&backfill_data.get_backfill_status_per_asset_key(&graph));
    println!();
    println!("First iteration run requests: {}", run_requests.len());
    for (index, request) in run_requests.iter().enumerate() {
        println!("  {:>3}. {}", index + 1, describe(request));
    }

    Ok(())
}

fn describe(request: &RunRequest) -> String {
    let assets = request
        .asset_selection
        .iter()
        .map(|key| key.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    match (&request.partition_key, &request.partition_range) {
        (Some(partition_key), _) => format!("[{}] partition {}", assets, partition_key),
        (None, Some(range)) => format!("[{}] partitions {}..={}", assets, range.start, range.end),
        (None, None) => format!("[{}]", assets),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backfill_engine::PartitionKeyRange;

    #[test]
    fn test_describe_requests() {
        let range = RunRequest::for_range(
            "bf",
            vec!["raw_events".into(), "cleaned_events".into()],
            PartitionKeyRange {
                start: "2024-01-01".to_string(),
                end: "2024-01-07".to_string(),
            },
        );
        assert_eq!(
            describe(&range),
            "[raw_events, cleaned_events] partitions 2024-01-01..=2024-01-07"
        );
        assert_eq!(
            describe(&RunRequest::unpartitioned("bf", vec!["report".into()])),
            "[report]"
        );
    }
}
