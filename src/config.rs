// ABOUTME: Replicator configuration - page size, poll budget and delays
// ABOUTME: Loaded from a TOML file with defaults for every missing key

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::poller::MissingRecordPolicy;

/// Settings for one end-to-end replication run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicatorConfig {
    /// Records per page during full sync
    pub page_size: usize,
    /// Number of change-poll rounds after full sync
    pub poll_rounds: u32,
    /// Delay between poll rounds
    pub poll_interval_ms: u64,
    /// Delay between full sync and the first poll round
    pub settle_delay_ms: u64,
    /// Handling of records deleted from the source after being synced
    pub on_missing: MissingRecordPolicy,
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            page_size: 1,
            poll_rounds: 10,
            poll_interval_ms: 5_000,
            settle_delay_ms: 5_000,
            on_missing: MissingRecordPolicy::Skip,
        }
    }
}

impl ReplicatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        Ok(())
    }

    /// Parse a config from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: ReplicatorConfig =
            toml::from_str(contents).context("Failed to parse replicator config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read replicator config from {:?}", path))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config in {:?}", path))
    }

    /// Load `path` if given, defaults otherwise.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => Ok(Self::default()),
        }
    }
}
