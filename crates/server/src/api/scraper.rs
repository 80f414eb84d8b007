//! Scheduler control endpoints: status, manual trigger, reset.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use harvest_ingest::{EnqueueResult, ResetError, SchedulerStatus, TriggerKind};

use crate::state::AppState;

use super::{conflict, internal_error, unavailable, ApiResult};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScraperStatus {
    #[serde(flatten)]
    status: SchedulerStatus,
    stored_in_database: u64,
}

/// Scheduler status plus the number of stored records.
#[utoipa::path(
    get,
    path = "/api/news-data/scraper/status",
    tag = "Scraper",
    responses(
        (status = 200, description = "Scheduler status", body = Object),
        (status = 500, description = "Store failure", body = Object)
    )
)]
pub async fn scraper_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let status = state.scheduler.status();
    let stored_in_database = state.store.count_all().await.map_err(|e| {
        warn!(error = %e, "Failed to count records");
        internal_error(e)
    })?;
    let body = ScraperStatus {
        status,
        stored_in_database,
    };
    Ok(Json(json!({ "success": true, "status": body })))
}

/// Queue a batch run and return immediately.
///
/// `queued` is `false` when a request is already waiting; the pending run
/// covers this one.
#[utoipa::path(
    post,
    path = "/api/news-data/scraper/trigger",
    tag = "Scraper",
    responses(
        (status = 202, description = "Batch accepted", body = Object),
        (status = 503, description = "Batch worker is not running", body = Object)
    )
)]
pub async fn scraper_trigger(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let result = state.batches.request(TriggerKind::Manual);
    if result == EnqueueResult::Closed {
        return Err(unavailable("Batch worker is not running"));
    }
    let queued = result.is_queued();
    let message = if queued {
        "Batch processing triggered"
    } else {
        "A batch is already pending"
    };
    info!(queued, "Manual batch requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "success": true, "queued": queued, "message": message })),
    ))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ResetParams {
    /// Revoke a running batch instead of failing with 409.
    #[param(value_type = Option<bool>)]
    pub force: Option<String>,
}

impl ResetParams {
    /// `true`/`1` force; anything else, or no value, does not.
    fn force(&self) -> bool {
        matches!(self.force.as_deref(), Some("true") | Some("1"))
    }
}

/// Move the cursor back to the start and reload the id list.
#[utoipa::path(
    post,
    path = "/api/news-data/scraper/reset",
    tag = "Scraper",
    params(ResetParams),
    responses(
        (status = 200, description = "Scheduler reset", body = Object),
        (status = 409, description = "A batch is running and force was not set", body = Object)
    )
)]
pub async fn scraper_reset(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResetParams>,
) -> ApiResult<Json<Value>> {
    let force = params.force();
    match state.scheduler.reset(force).await {
        Ok(report) => Ok(Json(json!({
            "success": true,
            "message": "Scraper reset to beginning",
            "totalIds": report.total_ids,
            "preemptedBatch": report.preempted_batch,
            "status": state.scheduler.status(),
        }))),
        Err(e @ ResetError::Busy) => Err(conflict(e.to_string())),
    }
}
