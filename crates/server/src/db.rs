use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use harvest_core::config::PostgresConfig;
use harvest_storage::{CheckpointStore, MemoryRecordStore, PgRecordStore, RecordStore};

/// Record and checkpoint stores, usually the same backend behind two traits.
#[derive(Clone)]
pub struct Stores {
    pub records: Arc<dyn RecordStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryRecordStore::new());
        Self {
            records: store.clone(),
            checkpoints: store,
        }
    }
}

/// Open the configured store.
///
/// PostgreSQL connection or migration failure is returned as an error; the
/// process treats it as fatal.
pub async fn open_stores(config: &PostgresConfig, memory: bool) -> anyhow::Result<Stores> {
    if memory {
        warn!("Using in-memory store; records and checkpoints are lost on exit");
        return Ok(Stores::memory());
    }

    let store = PgRecordStore::connect(config)
        .await
        .with_context(|| format!("failed to open PostgreSQL store at {}", config.redacted_url()))?;
    let store = Arc::new(store);
    Ok(Stores {
        records: store.clone(),
        checkpoints: store,
    })
}
