//! CLI configuration management

use anyhow::{bail, Context, Result};
use backfill_engine::BackfillDriverConfig;
use std::path::PathBuf;
use std::time::Duration;

const MAX_CONCURRENT_RUNS_VAR: &str = "BACKFILL_MAX_CONCURRENT_RUNS";
const MAX_ITERATIONS_VAR: &str = "BACKFILL_MAX_ITERATIONS";
const ITERATION_DELAY_MS_VAR: &str = "BACKFILL_ITERATION_DELAY_MS";
const STATE_DIR_VAR: &str = "BACKFILL_STATE_DIR";

/// CLI configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub driver: BackfillDriverConfig,
    pub state_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: BackfillDriverConfig::default(),
            state_dir: PathBuf::from(".backfill"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for unset values
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(MAX_CONCURRENT_RUNS_VAR) {
            let max_concurrent_runs: usize = parse_var(MAX_CONCURRENT_RUNS_VAR, &value)?;
            if max_concurrent_runs == 0 {
                bail!("{} must be at least 1", MAX_CONCURRENT_RUNS_VAR);
            }
            config.driver.max_concurrent_runs = max_concurrent_runs;
        }
        if let Some(value) = lookup(MAX_ITERATIONS_VAR) {
            let max_iterations: usize = parse_var(MAX_ITERATIONS_VAR, &value)?;
            if max_iterations == 0 {
                bail!("{} must be at least 1", MAX_ITERATIONS_VAR);
            }
            config.driver.max_iterations = max_iterations;
        }
        if let Some(value) = lookup(ITERATION_DELAY_MS_VAR) {
            let millis: u64 = parse_var(ITERATION_DELAY_MS_VAR, &value)?;
            config.driver.iteration_delay = Duration::from_millis(millis);
        }
        if let Some(value) = lookup(STATE_DIR_VAR) {
            config.state_dir = PathBuf::from(value);
        }

        Ok(config)
    }

    /// Apply command line overrides
    pub fn with_overrides(
        mut self,
        state_dir: Option<PathBuf>,
        max_concurrent_runs: Option<usize>,
    ) -> Result<Self> {
        if let Some(state_dir) = state_dir {
            self.state_dir = state_dir;
        }
        if let Some(max_concurrent_runs) = max_concurrent_runs {
            if max_concurrent_runs == 0 {
                bail!("--max-concurrent-runs must be at least 1");
            }
            self.driver.max_concurrent_runs = max_concurrent_runs;
        }
        Ok(self)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value '{}' for {}", value, name))
}
