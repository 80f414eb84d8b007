//! In-process record store.
//!
//! Backs the test suites and the server's `--memory` dev mode. Semantics
//! match [`PgRecordStore`](crate::PgRecordStore): absent payloads overwrite,
//! `fetched_at` is only set on insert, listings are id-descending.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use harvest_core::{CursorCheckpoint, Page, PageRequest, Record, RecordField, RecordId};

use crate::error::StoreError;
use crate::store::{normalize_payload, CheckpointStore, RecordStore};

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<RecordId, Record>>,
    checkpoint: RwLock<Option<CursorCheckpoint>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing upsert timestamp rules.
    pub fn insert(&self, record: Record) {
        self.records
            .write()
            .expect("records lock poisoned")
            .insert(record.id, record);
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("records lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        Ok(self
            .records
            .read()
            .expect("records lock poisoned")
            .get(&id)
            .cloned())
    }

    async fn upsert(
        &self,
        id: RecordId,
        version_data: Option<Value>,
        full_data: Option<Value>,
        now: DateTime<Utc>,
    ) -> Result<Record, StoreError> {
        let mut records = self.records.write().expect("records lock poisoned");
        let fetched_at = records.get(&id).map(|r| r.fetched_at).unwrap_or(now);
        let record = Record {
            id,
            version_data: normalize_payload(version_data),
            full_data: normalize_payload(full_data),
            fetched_at,
            updated_at: now,
        };
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_by_id(&self, id: RecordId) -> Result<bool, StoreError> {
        Ok(self
            .records
            .write()
            .expect("records lock poisoned")
            .remove(&id)
            .is_some())
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        Ok(self.len() as u64)
    }

    async fn count_where(&self, field: RecordField) -> Result<u64, StoreError> {
        let records = self.records.read().expect("records lock poisoned");
        Ok(records.values().filter(|r| r.has(field)).count() as u64)
    }

    async fn list(&self, page: PageRequest) -> Result<Page<Record>, StoreError> {
        let records = self.records.read().expect("records lock poisoned");
        let items = records
            .values()
            .rev()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total: records.len() as u64,
        })
    }
}

#[async_trait]
impl CheckpointStore for MemoryRecordStore {
    async fn load_checkpoint(&self) -> Result<Option<CursorCheckpoint>, StoreError> {
        Ok(self.checkpoint.read().expect("checkpoint lock poisoned").clone())
    }

    async fn save_checkpoint(&self, checkpoint: &CursorCheckpoint) -> Result<(), StoreError> {
        *self.checkpoint.write().expect("checkpoint lock poisoned") = Some(checkpoint.clone());
        Ok(())
    }
}
