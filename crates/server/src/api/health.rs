//! Service info and health endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// Service name, version and endpoint listing.
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses(
        (status = 200, description = "Service info", body = Object)
    )
)]
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "harvest-server",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/docs",
        "endpoints": {
            "GET /health": "Health check",
            "GET /config": "Effective configuration (secrets redacted)",
            "GET /api/news-data": "List stored records (paginated)",
            "GET /api/news-data/{id}": "Get a single record by id",
            "GET /api/news-data/stats/count": "Record counts",
            "GET /api/news-data/scraper/status": "Scheduler status",
            "POST /api/news-data/scraper/trigger": "Queue a batch run",
            "POST /api/news-data/scraper/reset": "Reset the scheduler cursor (?force=true preempts a running batch)",
            "DELETE /api/news-data/{id}": "Delete a record by id",
        }
    }))
}

/// Effective configuration with secrets removed.
#[utoipa::path(
    get,
    path = "/config",
    tag = "Health",
    responses(
        (status = 200, description = "Redacted configuration", body = Object)
    )
)]
pub async fn config_summary(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "success": true, "config": state.config.redacted_summary() }))
}

/// Liveness plus a snapshot of the scheduler.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = Object)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "scraper": state.scheduler.status(),
    }))
}
