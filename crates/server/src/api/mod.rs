//! Admin API endpoint modules.
//!
//! Record and scraper responses carry a `success` flag. Errors are
//! `{ "success": false, "error": "..." }` with a status code that
//! distinguishes missing records (404) and conflicts (409) from failures (500).
//! Handlers parse path and query values themselves so malformed input never
//! produces a plain-text extractor rejection.

pub mod doc;
mod health;
mod records;
mod scraper;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

// ── Shared error helpers ─────────────────────────────────────────

pub(crate) type ApiError = (StatusCode, Json<Value>);
pub(crate) type ApiResult<T> = Result<T, ApiError>;

fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub(crate) fn not_found(message: &str) -> ApiError {
    error_body(StatusCode::NOT_FOUND, message)
}

pub(crate) fn conflict(message: impl Into<String>) -> ApiError {
    error_body(StatusCode::CONFLICT, message)
}

pub(crate) fn unavailable(message: impl Into<String>) -> ApiError {
    error_body(StatusCode::SERVICE_UNAVAILABLE, message)
}

// ── Re-exports ───────────────────────────────────────────────────
// Flat `api::foo` paths for route registration in router.rs.

pub use health::{config_summary, health, root};
pub use records::{delete_record, get_record, list_records, record_stats};
pub use scraper::{scraper_reset, scraper_status, scraper_trigger};
