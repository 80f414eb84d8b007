//! PostgreSQL-backed record and checkpoint store.
//!
//! Uses runtime-checked `sqlx::query_as` against the `harvest_records` and
//! `harvest_checkpoint` tables created by `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use harvest_core::config::PostgresConfig;
use harvest_core::{CursorCheckpoint, Page, PageRequest, Record, RecordField, RecordId};

use crate::error::StoreError;
use crate::store::{normalize_payload, CheckpointStore, RecordStore};

const RECORD_COLUMNS: &str = "id, version_data, full_data, fetched_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: i64,
    version_data: Option<Value>,
    full_data: Option<Value>,
    fetched_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Record {
            id: row.id,
            version_data: row.version_data,
            full_data: row.full_data,
            fetched_at: row.fetched_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CheckpointRow {
    current_index: i64,
    total_ids: i64,
    ids_hash: String,
    updated_at: DateTime<Utc>,
}

/// Record store over a shared connection pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, then apply pending migrations.
    ///
    /// Any failure here is returned to the caller; the server treats it as
    /// fatal at startup.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;
        info!("PostgreSQL connected: {}", config.redacted_url());

        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("Database migrations applied successfully");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM harvest_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Record::from))
    }

    async fn upsert(
        &self,
        id: RecordId,
        version_data: Option<Value>,
        full_data: Option<Value>,
        now: DateTime<Utc>,
    ) -> Result<Record, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "INSERT INTO harvest_records (id, version_data, full_data, fetched_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             ON CONFLICT (id) DO UPDATE SET
                version_data = EXCLUDED.version_data,
                full_data = EXCLUDED.full_data,
                updated_at = EXCLUDED.updated_at
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .bind(normalize_payload(version_data))
        .bind(normalize_payload(full_data))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(id = id, error = %e, "record upsert failed");
            e
        })?;

        Ok(row.into())
    }

    async fn delete_by_id(&self, id: RecordId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM harvest_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM harvest_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_where(&self, field: RecordField) -> Result<u64, StoreError> {
        // Column name comes from a closed enum, never from user input.
        let sql = format!(
            "SELECT COUNT(*) FROM harvest_records WHERE {} IS NOT NULL",
            field.column()
        );
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn list(&self, page: PageRequest) -> Result<Page<Record>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM harvest_records
             ORDER BY id DESC
             LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total = self.count_all().await?;

        Ok(Page {
            items: rows.into_iter().map(Record::from).collect(),
            page: page.page,
            limit: page.limit,
            total,
        })
    }
}

#[async_trait]
impl CheckpointStore for PgRecordStore {
    async fn load_checkpoint(&self) -> Result<Option<CursorCheckpoint>, StoreError> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT current_index, total_ids, ids_hash, updated_at FROM harvest_checkpoint WHERE singleton",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| CursorCheckpoint {
            current_index: r.current_index.max(0) as u64,
            total_ids: r.total_ids.max(0) as u64,
            ids_hash: r.ids_hash,
            updated_at: r.updated_at,
        }))
    }

    async fn save_checkpoint(&self, checkpoint: &CursorCheckpoint) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO harvest_checkpoint (singleton, current_index, total_ids, ids_hash, updated_at)
             VALUES (TRUE, $1, $2, $3, $4)
             ON CONFLICT (singleton) DO UPDATE SET
                current_index = EXCLUDED.current_index,
                total_ids = EXCLUDED.total_ids,
                ids_hash = EXCLUDED.ids_hash,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(checkpoint.current_index as i64)
        .bind(checkpoint.total_ids as i64)
        .bind(&checkpoint.ids_hash)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
