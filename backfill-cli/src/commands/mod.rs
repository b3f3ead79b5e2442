//! CLI command implementations

pub mod plan;
pub mod run;
pub mod status;

use anyhow::{bail, Context, Result};
use backfill_core::{AssetKey, AssetPartition};
use backfill_engine::AssetBackfillStatus::{Failed, InProgress, Materialized, Targeted};
use backfill_engine::{AssetBackfillStatusSummary, BackfillSelection, PartitionSelection};
use backfill_graph::{AssetGraph, GraphDefinition, GraphQuery};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use std::path::Path;

/// Which assets and partitions a new backfill targets
#[derive(Debug, Clone, Args)]
pub struct SelectionArgs {
    /// Comma-separated asset keys to backfill
    #[arg(long, value_delimiter = ',', required = true)]
    pub assets: Vec<String>,

    /// Explicit partition keys (repeatable or comma-separated)
    #[arg(long = "partition", value_delimiter = ',', conflicts_with_all = ["start", "end"])]
    pub partitions: Vec<String>,

    /// First partition key of an inclusive range
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Last partition key of an inclusive range
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Also target every asset downstream of the selected ones
    #[arg(long)]
    pub include_downstream: bool,

    /// Backfill start time (RFC 3339 or YYYY-MM-DD); defaults to now
    #[arg(long)]
    pub start_time: Option<String>,
}

impl SelectionArgs {
    /// Resolve the selection against `graph`
    pub fn to_selection(&self, graph: &AssetGraph) -> Result<BackfillSelection> {
        let mut asset_keys: Vec<AssetKey> = Vec::with_capacity(self.assets.len());
        for name in &self.assets {
            let key = AssetKey::new(name.trim());
            if !graph.contains(&key) {
                bail!("Asset '{}' is not declared in the asset graph", key);
            }
            if !asset_keys.contains(&key) {
                asset_keys.push(key);
            }
        }

        if self.include_downstream {
            asset_keys = GraphQuery::new(graph)
                .with_descendants(asset_keys.iter())
                .into_iter()
                .collect();
        }

        let partitions = match (&self.start, &self.end) {
            (Some(start), Some(end)) => PartitionSelection::Range {
                start: start.clone(),
                end: end.clone(),
            },
            _ if !self.partitions.is_empty() => PartitionSelection::Keys {
                keys: self.partitions.clone(),
            },
            _ => PartitionSelection::All,
        };

        Ok(BackfillSelection {
            asset_keys,
            partitions,
        })
    }

    /// Backfill start time, defaulting to now
    pub fn start_time(&self) -> Result<DateTime<Utc>> {
        match &self.start_time {
            Some(value) => parse_start_time(value),
            None => Ok(Utc::now()),
        }
    }
}

/// Load and validate an asset graph from a JSON file
pub fn load_graph(path: &Path) -> Result<AssetGraph> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read asset graph '{}'", path.display()))?;
    let definition: GraphDefinition = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse asset graph '{}'", path.display()))?;
    AssetGraph::from_definition(definition)
        .with_context(|| format!("Invalid asset graph '{}'", path.display()))
}

/// Parse a start time given as RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC) or a date
pub fn parse_start_time(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(time.with_timezone(&Utc));
    }
    if let Ok(time) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(time.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    bail!(
        "Invalid start time '{}'. Expected RFC 3339, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD.",
        value
    )
}

/// Parse a simulated failure: `asset` fails every partition, `asset[key]` one partition
pub fn parse_failure(value: &str) -> Result<FailureRule> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("Failure rule cannot be empty");
    }

    match trimmed.split_once('[') {
        Some((asset, rest)) => {
            let partition_key = rest
                .strip_suffix(']')
                .filter(|key| !key.is_empty())
                .with_context(|| {
                    format!("Invalid failure rule '{}'. Expected asset[partition]", value)
                })?;
            Ok(FailureRule::Partition(AssetPartition::partitioned(
                asset,
                partition_key,
            )))
        }
        None => Ok(FailureRule::Asset(AssetKey::new(trimmed))),
    }
}

/// Simulated failure for local runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureRule {
    Asset(AssetKey),
    Partition(AssetPartition),
}

/// Print per-asset statuses as a table
pub fn print_statuses(statuses: &[AssetBackfillStatusSummary]) {
    println!(
        "{:<32} {:>9} {:>9} {:>12} {:>12} {:>9}",
        "ASSET", "TARGETED", "WAITING", "IN_PROGRESS", "MATERIALIZED", "FAILED"
    );
    for summary in statuses {
        match summary.backfill_status() {
            Some(status) => println!("{:<32} {:>9} {}", summary.asset_key().as_str(), 1, status),
            None => println!(
                "{:<32} {:>9} {:>9} {:>12} {:>12} {:>9}",
                summary.asset_key().as_str(),
                summary.num_targeted(),
                summary.count(Targeted),
                summary.count(InProgress),
                summary.count(Materialized),
                summary.count(Failed),
            ),
        }
    }
}
