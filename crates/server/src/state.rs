use std::sync::Arc;

use harvest_core::Config;
use harvest_ingest::{BatchHandle, Scheduler};
use harvest_storage::RecordStore;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub scheduler: Arc<Scheduler>,
    /// Batches are only ever run by the worker behind this handle.
    pub batches: BatchHandle,
}
