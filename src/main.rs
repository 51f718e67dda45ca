// ABOUTME: CLI entry point for record-replicator
// ABOUTME: Parses commands, builds configuration and routes to the replication engine

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use record_replicator::{
    demo, DeliveryCounter, Fields, MemoryStore, RecordStore, ReplicatorConfig, StoreSink,
    Synchronizer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "record-replicator")]
#[command(about = "Batched full sync and change polling between record stores", long_about = None)]
#[command(version)]
struct Cli {
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the three-company demonstration scenario
    Demo {
        /// Spacing between seed inserts and before the update, in milliseconds
        #[arg(long, default_value_t = 300)]
        insert_delay_ms: u64,
    },
    /// Replicate records from a JSON file into an in-memory target and print the report
    Run {
        /// JSON array of objects to seed the source store with
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        settings: RunSettings,
    },
}

/// Replication settings for `run`. The demo scenario uses fixed values.
#[derive(Args)]
struct RunSettings {
    /// Path to a TOML config file
    #[arg(long, env = "RECORD_REPLICATOR_CONFIG")]
    config: Option<PathBuf>,
    /// Records per page during full sync (overrides config)
    #[arg(long)]
    page_size: Option<usize>,
    /// Number of change-poll rounds (overrides config)
    #[arg(long)]
    poll_rounds: Option<u32>,
    /// Delay between poll rounds in milliseconds (overrides config)
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    /// Delay between full sync and polling in milliseconds (overrides config)
    #[arg(long)]
    settle_delay_ms: Option<u64>,
}

impl RunSettings {
    async fn resolve(&self) -> anyhow::Result<ReplicatorConfig> {
        let mut config = ReplicatorConfig::load_or_default(self.config.as_deref()).await?;
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(rounds) = self.poll_rounds {
            config.poll_rounds = rounds;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = self.settle_delay_ms {
            config.settle_delay_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --log
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Demo { insert_delay_ms } => {
            let checks = demo::run_scenario(Duration::from_millis(insert_delay_ms))
                .await
                .context("Demo scenario failed")?;
            let mut failed = 0;
            for check in &checks {
                let status = if check.passed { "OK" } else { "FAILED" };
                println!("{} ... {} ({})", check.label, status, check.detail);
                if !check.passed {
                    failed += 1;
                }
            }
            if failed > 0 {
                bail!("{} of {} demo checks failed", failed, checks.len());
            }
            Ok(())
        }
        Commands::Run { input, settings } => {
            let config = settings.resolve().await?;
            run(&input, &config).await
        }
    }
}

async fn run(input: &Path, config: &ReplicatorConfig) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read records from {:?}", input))?;
    let rows: Vec<Fields> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse records from {:?}", input))?;

    let source = Arc::new(MemoryStore::new("source"));
    for row in rows {
        source.insert(row).await.context("Failed to seed source store")?;
    }

    let target = Arc::new(MemoryStore::new("target"));
    let sink = Arc::new(StoreSink::new(target, DeliveryCounter::new()));
    let synchronizer = Synchronizer::new(source, sink, config);

    let report = match synchronizer.run(config.page_size, config.poll_rounds).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Replication run failed: {}", e);
            return Err(e).context("Replication run failed");
        }
    };

    let output = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", output);
    Ok(())
}
