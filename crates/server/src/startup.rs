//! Scheduler construction shared by `serve`, `run-once` and `status`.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use harvest_core::Config;
use harvest_ingest::{JsonFileIdSource, RemoteClient, Scheduler, SchedulerOptions};

use crate::db::Stores;

/// Build the scheduler, load the id list and restore the cursor.
pub async fn build_scheduler(config: &Config, stores: &Stores) -> anyhow::Result<Arc<Scheduler>> {
    if !config.remote.is_configured() {
        warn!("BEARER_TOKEN not set; remote lookups will be sent without authorization");
    }
    let client = RemoteClient::new(&config.remote).context("failed to build remote client")?;
    let id_source = JsonFileIdSource::from_config(&config.id_source);

    let scheduler = Scheduler::new(
        SchedulerOptions::from_config(&config.scheduler),
        Arc::new(id_source),
        Arc::new(client),
        stores.records.clone(),
    )
    .with_checkpoints(stores.checkpoints.clone());

    scheduler.load_ids().await;
    if config.scheduler.resume_from_checkpoint {
        scheduler.restore_checkpoint().await;
    } else {
        info!("Checkpoint resume disabled, starting at index 0");
    }

    Ok(Arc::new(scheduler))
}
