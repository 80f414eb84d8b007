//! Read and delete endpoints over the stored records.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use harvest_core::{PageRequest, RecordId};

use crate::state::AppState;

use super::{internal_error, not_found, ApiResult};

const NOT_FOUND: &str = "News data not found";

/// Raw strings so a malformed value falls back to the default instead of
/// failing extraction.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListParams {
    /// 1-based page number (default 1).
    #[param(value_type = Option<u32>)]
    pub page: Option<String>,
    /// Page size (default 50, max 1000).
    #[param(value_type = Option<u32>)]
    pub limit: Option<String>,
}

fn parse_u32(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// A path segment that is not an integer names no record.
fn parse_id(raw: &str) -> ApiResult<RecordId> {
    raw.parse().map_err(|_| not_found(NOT_FOUND))
}

/// Page through stored records, highest id first.
#[utoipa::path(
    get,
    path = "/api/news-data",
    tag = "Records",
    params(ListParams),
    responses(
        (status = 200, description = "Page of records with pagination info", body = Object),
        (status = 500, description = "Store failure", body = Object)
    )
)]
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let request = PageRequest::new(
        parse_u32(params.page.as_deref()),
        parse_u32(params.limit.as_deref()),
    );
    let page = state.store.list(request).await.map_err(|e| {
        warn!(error = %e, "Failed to list records");
        internal_error(e)
    })?;

    let total_pages = page.total_pages();
    Ok(Json(json!({
        "success": true,
        "data": page.items,
        "pagination": {
            "page": page.page,
            "limit": page.limit,
            "total": page.total,
            "totalPages": total_pages,
        }
    })))
}

/// Fetch one record by id.
#[utoipa::path(
    get,
    path = "/api/news-data/{id}",
    tag = "Records",
    params(("id" = i64, Path, description = "Record id")),
    responses(
        (status = 200, description = "The record", body = Object),
        (status = 404, description = "No record with this id", body = Object),
        (status = 500, description = "Store failure", body = Object)
    )
)]
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let record = state.store.find_by_id(id).await.map_err(|e| {
        warn!(id, error = %e, "Failed to load record");
        internal_error(e)
    })?;

    match record {
        Some(record) => Ok(Json(json!({ "success": true, "data": record }))),
        None => Err(not_found(NOT_FOUND)),
    }
}

/// Total record count and how many carry each payload.
#[utoipa::path(
    get,
    path = "/api/news-data/stats/count",
    tag = "Records",
    responses(
        (status = 200, description = "Record counts", body = Object),
        (status = 500, description = "Store failure", body = Object)
    )
)]
pub async fn record_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let stats = state.store.stats().await.map_err(|e| {
        warn!(error = %e, "Failed to count records");
        internal_error(e)
    })?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// Delete one record by id.
#[utoipa::path(
    delete,
    path = "/api/news-data/{id}",
    tag = "Records",
    params(("id" = i64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record deleted", body = Object),
        (status = 404, description = "No record with this id", body = Object),
        (status = 500, description = "Store failure", body = Object)
    )
)]
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let deleted = state.store.delete_by_id(id).await.map_err(|e| {
        warn!(id, error = %e, "Failed to delete record");
        internal_error(e)
    })?;

    if !deleted {
        return Err(not_found(NOT_FOUND));
    }
    info!(id, "Record deleted");
    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted news data with ID: {}", id),
    })))
}
