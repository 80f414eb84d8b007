//! Id sources: where the ordered list of record identifiers comes from.
//!
//! The production source is a JSON snapshot of a previous API listing page
//! (`{"success": true, "data": [{"id": 101, ...}, ...]}`). Loading never
//! fails: unreadable or malformed input yields an empty list and a warning,
//! so the service still starts and picks the ids up on the next reload.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use harvest_core::config::IdSourceConfig;
use harvest_core::{HarvestError, RecordId};

/// Supplies the identifier list the scheduler walks.
#[async_trait]
pub trait IdSource: Send + Sync {
    /// Load identifiers in source order. Returns an empty list on failure.
    async fn load(&self) -> Vec<RecordId>;

    /// Human-readable origin, used in log lines.
    fn describe(&self) -> String;
}

/// Reads ids from a JSON listing snapshot on disk.
#[derive(Debug, Clone)]
pub struct JsonFileIdSource {
    path: PathBuf,
    dedupe: bool,
}

impl JsonFileIdSource {
    pub fn new(path: impl Into<PathBuf>, dedupe: bool) -> Self {
        Self {
            path: path.into(),
            dedupe,
        }
    }

    pub fn from_config(config: &IdSourceConfig) -> Self {
        Self::new(config.path.clone(), config.dedupe)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<RecordId>, HarvestError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        parse_snapshot(&raw)
    }
}

#[async_trait]
impl IdSource for JsonFileIdSource {
    async fn load(&self) -> Vec<RecordId> {
        let ids = match self.read().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to load id source");
                return Vec::new();
            }
        };

        let loaded = ids.len();
        let ids = if self.dedupe { dedupe_ids(ids) } else { ids };
        info!(
            path = %self.path.display(),
            loaded,
            unique = ids.len(),
            "Loaded {} ids from id source",
            ids.len()
        );
        ids
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fixed in-memory id list.
#[derive(Debug, Clone, Default)]
pub struct StaticIdSource {
    ids: Vec<RecordId>,
}

impl StaticIdSource {
    pub fn new(ids: Vec<RecordId>) -> Self {
        Self { ids }
    }
}

#[async_trait]
impl IdSource for StaticIdSource {
    async fn load(&self) -> Vec<RecordId> {
        self.ids.clone()
    }

    fn describe(&self) -> String {
        format!("static list ({} ids)", self.ids.len())
    }
}

/// Extract ids, in order, from a listing snapshot.
///
/// Entries whose `id` is neither an integer nor an integer string are
/// skipped.
pub fn parse_snapshot(raw: &str) -> Result<Vec<RecordId>, HarvestError> {
    let doc: Value = serde_json::from_str(raw)?;

    if doc.get("success").and_then(Value::as_bool) != Some(true) {
        return Err(HarvestError::InvalidIdSource(
            "missing `\"success\": true`".to_string(),
        ));
    }

    let items = doc
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| HarvestError::InvalidIdSource("`data` is not an array".to_string()))?;

    let mut ids = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        match item.get("id").and_then(id_from_value) {
            Some(id) => ids.push(id),
            None => debug!(position, "skipping snapshot entry without integer id"),
        }
    }
    Ok(ids)
}

fn id_from_value(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keep the first occurrence of every id, preserving order.
pub fn dedupe_ids(ids: Vec<RecordId>) -> Vec<RecordId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn snapshot_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_ids_in_file_order() {
        let raw = r#"{"success":true,"data":[{"id":103,"title":"c"},{"id":101},{"id":102}]}"#;
        assert_eq!(parse_snapshot(raw).unwrap(), vec![103, 101, 102]);
    }

    #[test]
    fn accepts_numeric_string_ids_and_skips_garbage() {
        let raw = r#"{"success":true,"data":[{"id":"7"},{"id":null},{"name":"x"},{"id":1.5},{"id":8}]}"#;
        assert_eq!(parse_snapshot(raw).unwrap(), vec![7, 8]);
    }

    #[test]
    fn rejects_unsuccessful_or_malformed_snapshots() {
        assert!(matches!(
            parse_snapshot(r#"{"success":false,"data":[{"id":1}]}"#),
            Err(HarvestError::InvalidIdSource(_))
        ));
        assert!(matches!(
            parse_snapshot(r#"{"success":true,"data":{"id":1}}"#),
            Err(HarvestError::InvalidIdSource(_))
        ));
        assert!(matches!(parse_snapshot("not json"), Err(HarvestError::Serialize(_))));
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        assert_eq!(dedupe_ids(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn file_source_keeps_duplicates_by_default() {
        let file = snapshot_file(r#"{"success":true,"data":[{"id":1},{"id":2},{"id":1}]}"#);
        let source = JsonFileIdSource::new(file.path(), false);
        assert_eq!(source.load().await, vec![1, 2, 1]);
    }

    #[tokio::test]
    async fn file_source_dedupes_when_enabled() {
        let file = snapshot_file(r#"{"success":true,"data":[{"id":1},{"id":2},{"id":1}]}"#);
        let source = JsonFileIdSource::new(file.path(), true);
        assert_eq!(source.load().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn missing_file_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonFileIdSource::new(dir.path().join("nope.json"), false);
        assert!(source.load().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_yields_empty_list() {
        let file = snapshot_file("{ this is not json");
        let source = JsonFileIdSource::new(file.path(), false);
        assert!(source.load().await.is_empty());
    }
}
