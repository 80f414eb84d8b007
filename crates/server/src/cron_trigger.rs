//! Cron-driven batch trigger.
//!
//! Sleeps until the next fire time of the configured schedule, then asks the
//! batch worker for a run. Ticks that arrive while a request is still
//! pending are dropped.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::{debug, info, warn};

use harvest_ingest::{BatchHandle, EnqueueResult, TriggerKind};

/// Parse a cron expression, auto-prepending "0 " for 5-field expressions.
///
/// The `cron` crate requires 6 fields (sec min hr dom mon dow), but
/// `CRON_SCHEDULE` is usually written with 5 (min hr dom mon dow).
pub fn parse_cron(expr: &str) -> Result<Schedule, cron::error::Error> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() == 5 {
        Schedule::from_str(&format!("0 {}", expr))
    } else {
        Schedule::from_str(expr)
    }
}

/// Time to wait from `now` until the next fire time, if there is one.
fn until_next(schedule: &Schedule, now: DateTime<Utc>) -> Option<Duration> {
    let next = schedule.after(&now).next()?;
    Some((next - now).to_std().unwrap_or(Duration::ZERO))
}

/// Run until the batch worker goes away or the schedule is exhausted.
pub async fn run_cron_trigger(schedule: Schedule, batches: BatchHandle) {
    info!("Cron trigger started");

    loop {
        let Some(wait) = until_next(&schedule, Utc::now()) else {
            warn!("Cron schedule has no upcoming fire time, trigger stopped");
            return;
        };
        tokio::time::sleep(wait).await;

        info!(at = %Utc::now().to_rfc3339(), "Cron tick");
        match batches.request(TriggerKind::Scheduled) {
            EnqueueResult::Enqueued => debug!("Scheduled batch queued"),
            EnqueueResult::AlreadyPending => {
                info!("Previous batch request still pending, skipping tick")
            }
            EnqueueResult::Closed => {
                warn!("Batch worker stopped, cron trigger exiting");
                return;
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
