//! OpenAPI documentation aggregator.
//!
//! Collects the `#[utoipa::path]`-annotated handlers into a single OpenAPI
//! spec, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "harvest-server API",
        version = "0.1.0",
        description = "Incremental record harvester: stored records and scheduler control.",
    ),
    tags(
        (name = "Health", description = "Service info, liveness and configuration"),
        (name = "Records", description = "Stored records: list, lookup, counts, delete"),
        (name = "Scraper", description = "Batch scheduler status, manual trigger and reset"),
    ),
    paths(
        // Health
        crate::api::health::root,
        crate::api::health::health,
        crate::api::health::config_summary,
        // Records
        crate::api::records::list_records,
        crate::api::records::get_record,
        crate::api::records::record_stats,
        crate::api::records::delete_record,
        // Scraper
        crate::api::scraper::scraper_status,
        crate::api::scraper::scraper_trigger,
        crate::api::scraper::scraper_reset,
    )
)]
pub struct ApiDoc;
