//! HTTP router construction.
//!
//! Assembles the admin routes, CORS and OpenAPI docs into a single `Router`.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .route("/config", get(api::config_summary))
        .route("/api/news-data", get(api::list_records))
        // Fixed paths are two segments deep, so they never collide with /{id}.
        .route("/api/news-data/stats/count", get(api::record_stats))
        .route("/api/news-data/scraper/status", get(api::scraper_status))
        .route("/api/news-data/scraper/trigger", post(api::scraper_trigger))
        .route("/api/news-data/scraper/reset", post(api::scraper_reset))
        .route(
            "/api/news-data/{id}",
            get(api::get_record).delete(api::delete_record),
        )
        .layer(cors)
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "Invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tokio::sync::{Notify, Semaphore};
    use tower::ServiceExt;

    use harvest_core::{Config, Record, RecordId};
    use harvest_ingest::{
        BatchHandle, BatchWorker, FetchError, RecordFetcher, Scheduler, SchedulerOptions,
        StaticIdSource, TriggerKind,
    };
    use harvest_storage::MemoryRecordStore;

    use super::*;

    /// Answers every lookup, optionally blocking version fetches on a gate.
    #[derive(Default)]
    struct FakeFetcher {
        gate: Option<(Arc<Notify>, Arc<Semaphore>)>,
    }

    #[async_trait]
    impl RecordFetcher for FakeFetcher {
        async fn fetch_version(&self, id: RecordId) -> Result<Option<Value>, FetchError> {
            if let Some((entered, permits)) = &self.gate {
                entered.notify_one();
                permits.acquire().await.unwrap().forget();
            }
            Ok(Some(json!([{ "id": id }])))
        }

        async fn fetch_full(&self, id: RecordId) -> Result<Option<Value>, FetchError> {
            Ok(Some(json!({ "id": id })))
        }
    }

    struct TestApp {
        router: Router,
        store: Arc<MemoryRecordStore>,
        scheduler: Arc<Scheduler>,
        // Keeps the queue open; the worker is never run so requests stay pending.
        _worker: BatchWorker,
    }

    fn test_app(ids: Vec<RecordId>, fetcher: FakeFetcher) -> TestApp {
        test_app_with(Config::from_lookup(&|_: &str| None), ids, fetcher)
    }

    fn test_app_with(config: Config, ids: Vec<RecordId>, fetcher: FakeFetcher) -> TestApp {
        let store = Arc::new(MemoryRecordStore::new());
        let options = SchedulerOptions {
            batch_size: 2,
            item_delay: Duration::ZERO,
            max_item_failures: 3,
        };
        let scheduler = Arc::new(Scheduler::new(
            options,
            Arc::new(StaticIdSource::new(ids)),
            Arc::new(fetcher),
            store.clone(),
        ));
        let (worker, batches): (BatchWorker, BatchHandle) = BatchWorker::new(scheduler.clone());
        let state = Arc::new(AppState {
            config,
            store: store.clone(),
            scheduler: scheduler.clone(),
            batches,
        });
        TestApp {
            router: build_router(state),
            store,
            scheduler,
            _worker: worker,
        }
    }

    fn seed(store: &MemoryRecordStore, id: RecordId, complete: bool) {
        let now = chrono::Utc::now();
        store.insert(Record {
            id,
            version_data: Some(json!([id])),
            full_data: complete.then(|| json!({ "id": id })),
            fetched_at: now,
            updated_at: now,
        });
    }

    async fn call(router: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_reports_scheduler_status() {
        let app = test_app(vec![1, 2, 3], FakeFetcher::default());
        app.scheduler.load_ids().await;

        let (status, body) = call(&app.router, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
        assert_eq!(body["scraper"]["totalIds"], 3);
        assert_eq!(body["scraper"]["progress"], "0.00%");
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let app = test_app(vec![], FakeFetcher::default());
        let (status, body) = call(&app.router, "GET", "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["endpoints"]["GET /api/news-data"].is_string());
    }

    #[tokio::test]
    async fn list_is_paginated_id_descending() {
        let app = test_app(vec![], FakeFetcher::default());
        for id in 1..=5 {
            seed(&app.store, id, true);
        }

        let (status, body) = call(&app.router, "GET", "/api/news-data?page=2&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let ids: Vec<i64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(
            body["pagination"],
            json!({ "page": 2, "limit": 2, "total": 5, "totalPages": 3 })
        );
    }

    #[tokio::test]
    async fn list_defaults_to_first_page_of_fifty() {
        let app = test_app(vec![], FakeFetcher::default());
        let (status, body) = call(&app.router, "GET", "/api/news-data").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["pagination"],
            json!({ "page": 1, "limit": 50, "total": 0, "totalPages": 0 })
        );
    }

    #[tokio::test]
    async fn get_record_and_missing_record() {
        let app = test_app(vec![], FakeFetcher::default());
        seed(&app.store, 42, true);

        let (status, body) = call(&app.router, "GET", "/api/news-data/42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], 42);
        assert!(body["data"]["versionData"].is_array());

        let (status, body) = call(&app.router, "GET", "/api/news-data/43").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({ "success": false, "error": "News data not found" })
        );
    }

    #[tokio::test]
    async fn non_numeric_id_is_not_found() {
        let app = test_app(vec![], FakeFetcher::default());
        let expected = json!({ "success": false, "error": "News data not found" });

        let (status, body) = call(&app.router, "GET", "/api/news-data/abc").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, expected);

        let (status, body) = call(&app.router, "DELETE", "/api/news-data/abc").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn malformed_page_and_limit_fall_back_to_defaults() {
        let app = test_app(vec![], FakeFetcher::default());
        seed(&app.store, 1, true);

        let (status, body) =
            call(&app.router, "GET", "/api/news-data?page=abc&limit=-5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(
            body["pagination"],
            json!({ "page": 1, "limit": 50, "total": 1, "totalPages": 1 })
        );
    }

    #[tokio::test]
    async fn config_is_redacted() {
        let config = Config::from_lookup(&|key: &str| {
            (key == "BEARER_TOKEN").then(|| "very-secret-token".to_string())
        });
        let app = test_app_with(config, vec![], FakeFetcher::default());

        let (status, body) = call(&app.router, "GET", "/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["config"]["remote"]["configured"], true);
        assert!(!body.to_string().contains("very-secret-token"));
    }

    #[tokio::test]
    async fn stats_count_payloads() {
        let app = test_app(vec![], FakeFetcher::default());
        seed(&app.store, 1, true);
        seed(&app.store, 2, false);

        let (status, body) = call(&app.router, "GET", "/api/news-data/stats/count").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["stats"],
            json!({ "total": 2, "withVersionData": 2, "withFullData": 1 })
        );
    }

    #[tokio::test]
    async fn delete_record_then_404() {
        let app = test_app(vec![], FakeFetcher::default());
        seed(&app.store, 7, true);

        let (status, body) = call(&app.router, "DELETE", "/api/news-data/7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Deleted news data with ID: 7");
        assert!(app.store.is_empty());

        let (status, _) = call(&app.router, "DELETE", "/api/news-data/7").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scraper_status_includes_stored_count() {
        let app = test_app(vec![101, 102, 103], FakeFetcher::default());
        app.scheduler.run_batch(TriggerKind::Manual).await;

        let (status, body) = call(&app.router, "GET", "/api/news-data/scraper/status").await;
        assert_eq!(status, StatusCode::OK);
        let s = &body["status"];
        assert_eq!(s["currentIndex"], 2);
        assert_eq!(s["totalIds"], 3);
        assert_eq!(s["isProcessing"], false);
        assert_eq!(s["progress"], "66.67%");
        assert_eq!(s["storedInDatabase"], 2);
        assert_eq!(s["lastBatch"]["processed"], 2);
    }

    #[tokio::test]
    async fn trigger_is_accepted_and_collapses_when_pending() {
        let app = test_app(vec![1], FakeFetcher::default());

        let (status, body) = call(&app.router, "POST", "/api/news-data/scraper/trigger").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["queued"], true);

        let (status, body) = call(&app.router, "POST", "/api/news-data/scraper/trigger").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["queued"], false);
    }

    #[tokio::test]
    async fn trigger_without_worker_is_unavailable() {
        let app = test_app(vec![1], FakeFetcher::default());
        let TestApp {
            router,
            _worker: worker,
            ..
        } = app;
        drop(worker);

        let (status, body) = call(&router, "POST", "/api/news-data/scraper/trigger").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn reset_conflicts_while_running_unless_forced() {
        let entered = Arc::new(Notify::new());
        let permits = Arc::new(Semaphore::new(0));
        let fetcher = FakeFetcher {
            gate: Some((entered.clone(), permits.clone())),
        };
        let app = test_app(vec![1, 2, 3], fetcher);

        let scheduler = app.scheduler.clone();
        let running = tokio::spawn(async move { scheduler.run_batch(TriggerKind::Manual).await });
        entered.notified().await;

        let (status, body) = call(&app.router, "POST", "/api/news-data/scraper/reset").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, body) =
            call(&app.router, "POST", "/api/news-data/scraper/reset?force=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["preemptedBatch"], true);
        assert_eq!(body["status"]["currentIndex"], 0);
        assert_eq!(body["status"]["isProcessing"], false);

        permits.add_permits(10);
        running.await.unwrap();
    }

    #[tokio::test]
    async fn reset_when_idle_reloads_ids() {
        let app = test_app(vec![1, 2, 3], FakeFetcher::default());
        app.scheduler.run_batch(TriggerKind::Manual).await;

        let (status, body) = call(&app.router, "POST", "/api/news-data/scraper/reset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Scraper reset to beginning");
        assert_eq!(body["totalIds"], 3);
        assert_eq!(body["status"]["currentIndex"], 0);
    }

    #[tokio::test]
    async fn docs_are_served() {
        let app = test_app(vec![], FakeFetcher::default());
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/docs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn cors_layer_accepts_specific_origin() {
        // Constructing must not panic for either form.
        let _ = cors_layer("https://admin.example.com");
        let _ = cors_layer("*");
        let _ = cors_layer("bad\norigin");
    }
}
