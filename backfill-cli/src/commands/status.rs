//! Status command

use super::{load_graph, print_statuses};
use anyhow::{Context, Result};
use backfill_engine::{BackfillStore, FileBackfillStore};
use std::path::Path;

/// Print the per-asset status of a checkpointed backfill.
///
/// With `backfill_id` unset, lists the backfills found in the state directory.
pub async fn execute(
    graph_path: &Path,
    backfill_id: Option<&str>,
    state_dir: &Path,
    json: bool,
) -> Result<()> {
    let store = FileBackfillStore::new(state_dir);

    let Some(backfill_id) = backfill_id else {
        let ids = store.list().await?;
        if ids.is_empty() {
            println!("No backfills found in {}", state_dir.display());
        }
        for id in ids {
            println!("{}", id);
        }
        return Ok(());
    };

    let graph = load_graph(graph_path)?;
    let backfill_data = store
        .load(backfill_id)
        .await?
        .with_context(|| format!("Backfill '{}' not found in {}", backfill_id, state_dir.display()))?;
    let statuses = backfill_data.get_backfill_status_per_asset_key(&graph);

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    let summary = backfill_data.summary();
    println!("Backfill: {}", backfill_id);
    println!(
        "Started: {}",
        backfill_data.backfill_start_time().to_rfc3339()
    );
    println!(
        "Complete: {}",
        if backfill_data.is_complete() { "yes" } else { "no" }
    );
    println!(
        "Targeted: {} / Requested: {} / Materialized: {} / Failed: {}",
        summary.num_targeted, summary.num_requested, summary.num_materialized, summary.num_failed
    );
    println!();
    print_statuses(&statuses);

    Ok(())
}
