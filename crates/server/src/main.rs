mod api;
mod cli;
mod cron_trigger;
mod db;
mod router;
mod startup;
mod state;

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use harvest_core::Config;
use harvest_ingest::BatchWorker;

use crate::cli::{Cli, Command};
use crate::state::AppState;

fn load_config() -> Config {
    harvest_core::config::load_dotenv();
    Config::from_env()
}

async fn serve(config: Config, memory: bool) -> anyhow::Result<()> {
    config.log_summary();

    // Storage is the only fatal startup dependency.
    let stores = db::open_stores(&config.postgres, memory).await?;
    let scheduler = startup::build_scheduler(&config, &stores).await?;

    let schedule = cron_trigger::parse_cron(&config.scheduler.cron).map_err(|e| {
        anyhow::anyhow!("invalid CRON_SCHEDULE '{}': {}", config.scheduler.cron, e)
    })?;

    let (batches, _worker_task) = BatchWorker::spawn(scheduler.clone());
    tokio::spawn(cron_trigger::run_cron_trigger(schedule, batches.clone()));
    info!("Cron trigger scheduled: {}", config.scheduler.cron);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let port = config.server.port;
    let state = Arc::new(AppState {
        config,
        store: stores.records,
        scheduler,
        batches,
    });
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://localhost:{}", port);
    info!("API docs at http://localhost:{}/docs", port);
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config();

    match cli.command() {
        Command::Serve { memory } => serve(config, memory).await,
        Command::RunOnce => cli::run_once(&config).await,
        Command::Status => cli::print_status(&config).await,
    }
}
