use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Integer key naming one remote record.
pub type RecordId = i64;

/// Default page size for record listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Upper bound on a single listing page.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// A harvested record: two independently fetched payloads keyed by id.
///
/// Either payload may be absent when its lookup failed. A record is only
/// considered done once both are present, see [`Record::is_complete`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub version_data: Option<Value>,
    pub full_data: Option<Value>,
    /// First successful write.
    pub fetched_at: DateTime<Utc>,
    /// Last write.
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn is_complete(&self) -> bool {
        is_present(&self.version_data) && is_present(&self.full_data)
    }

    pub fn has(&self, field: RecordField) -> bool {
        match field {
            RecordField::VersionData => is_present(&self.version_data),
            RecordField::FullData => is_present(&self.full_data),
        }
    }
}

/// JSON `null` stored in a payload column counts as absent.
fn is_present(payload: &Option<Value>) -> bool {
    matches!(payload, Some(v) if !v.is_null())
}

/// The two payload columns of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordField {
    VersionData,
    FullData,
}

impl RecordField {
    pub fn column(&self) -> &'static str {
        match self {
            RecordField::VersionData => "version_data",
            RecordField::FullData => "full_data",
        }
    }
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordField::VersionData => write!(f, "versionData"),
            RecordField::FullData => write!(f, "fullData"),
        }
    }
}

/// Aggregate counts over the record collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStats {
    pub total: u64,
    pub with_version_data: u64,
    pub with_full_data: u64,
}

/// 1-based page request, already clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Build a request from optional raw query values.
    ///
    /// Missing or zero values fall back to page 1 and [`DEFAULT_PAGE_LIMIT`];
    /// the limit is capped at [`MAX_PAGE_LIMIT`].
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of records plus the collection total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

/// Persisted copy of the scheduler cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorCheckpoint {
    pub current_index: u64,
    /// Length of the id list the index refers to.
    pub total_ids: u64,
    /// [`id_list_hash`] of that list.
    pub ids_hash: String,
    pub updated_at: DateTime<Utc>,
}

/// Deterministic SHA-256 hex hash of an ordered id list.
///
/// Order matters: the checkpoint index is a position in this exact sequence.
pub fn id_list_hash(ids: &[RecordId]) -> String {
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}
