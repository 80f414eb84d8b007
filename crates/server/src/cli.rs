//! CLI argument parsing and the one-shot subcommands.

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use harvest_core::Config;
use harvest_ingest::{BatchWorker, TriggerKind};

use crate::{db, startup};

/// Incremental record harvester with a batch scheduler and admin API.
#[derive(Parser, Debug)]
#[command(name = "harvest-server", version, about = "Incremental record harvester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server and cron trigger (default)
    Serve {
        /// Keep records in memory instead of PostgreSQL
        #[arg(long)]
        memory: bool,
    },
    /// Run a single batch against the configured store, print the summary and exit
    RunOnce,
    /// Load the id list and checkpoint, print the scheduler status and exit
    Status,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Serve { memory: false })
    }
}

pub async fn run_once(config: &Config) -> anyhow::Result<()> {
    let stores = db::open_stores(&config.postgres, false).await?;
    let scheduler = startup::build_scheduler(config, &stores).await?;

    // Same path as the server: the batch runs on the worker task.
    let (batches, _worker_task) = BatchWorker::spawn(scheduler.clone());
    let outcome = batches
        .run_and_wait(TriggerKind::Cli)
        .await
        .ok_or_else(|| anyhow::anyhow!("batch worker stopped before running the batch"))?;
    info!(processed = outcome.processed(), "Batch finished");

    let report = json!({ "outcome": outcome, "status": scheduler.status() });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn print_status(config: &Config) -> anyhow::Result<()> {
    let stores = db::open_stores(&config.postgres, false).await?;
    let scheduler = startup::build_scheduler(config, &stores).await?;
    let stored = stores.records.count_all().await?;

    let mut status = serde_json::to_value(scheduler.status())?;
    status["storedInDatabase"] = json!(stored);
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
