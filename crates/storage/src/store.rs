//! Storage traits shared by the scheduler and the admin API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use harvest_core::{CursorCheckpoint, Page, PageRequest, Record, RecordField, RecordId, RecordStats};

use crate::error::StoreError;

/// Upsert-by-id record collection.
///
/// The scheduler only needs [`find_by_id`](RecordStore::find_by_id) and
/// [`upsert`](RecordStore::upsert); the rest backs the admin surface.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError>;

    /// Insert or replace the payloads of `id`.
    ///
    /// Absent payloads overwrite existing ones. `now` becomes `updated_at`
    /// and, for a new row only, `fetched_at`.
    async fn upsert(
        &self,
        id: RecordId,
        version_data: Option<Value>,
        full_data: Option<Value>,
        now: DateTime<Utc>,
    ) -> Result<Record, StoreError>;

    /// Returns `false` when no record existed.
    async fn delete_by_id(&self, id: RecordId) -> Result<bool, StoreError>;

    async fn count_all(&self) -> Result<u64, StoreError>;

    /// Count records whose `field` payload is present.
    async fn count_where(&self, field: RecordField) -> Result<u64, StoreError>;

    /// Page through all records, highest id first.
    async fn list(&self, page: PageRequest) -> Result<Page<Record>, StoreError>;

    async fn stats(&self) -> Result<RecordStats, StoreError> {
        Ok(RecordStats {
            total: self.count_all().await?,
            with_version_data: self.count_where(RecordField::VersionData).await?,
            with_full_data: self.count_where(RecordField::FullData).await?,
        })
    }
}

/// Single-slot persistence for the scheduler cursor.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load_checkpoint(&self) -> Result<Option<CursorCheckpoint>, StoreError>;

    async fn save_checkpoint(&self, checkpoint: &CursorCheckpoint) -> Result<(), StoreError>;
}

/// Treat a JSON `null` payload the same as a missing one.
pub(crate) fn normalize_payload(payload: Option<Value>) -> Option<Value> {
    payload.filter(|v| !v.is_null())
}
