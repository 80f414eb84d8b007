//! Public value types produced by the [`Scheduler`](super::Scheduler).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use harvest_core::config::SchedulerConfig;

/// What caused a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Scheduled,
    Manual,
    Cli,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::Scheduled => write!(f, "scheduled"),
            TriggerKind::Manual => write!(f, "manual"),
            TriggerKind::Cli => write!(f, "cli"),
        }
    }
}

/// Tunables for batch runs.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Fetch/upsert attempts per invocation. Free skips do not count.
    pub batch_size: usize,
    /// Pause between attempts.
    pub item_delay: Duration,
    /// Failed attempts before an id is quarantined; 0 disables quarantine.
    pub max_item_failures: u32,
}

impl SchedulerOptions {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            item_delay: config.item_delay(),
            max_item_failures: config.max_item_failures,
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// Why a `run_batch` call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// Another batch holds the lock.
    AlreadyRunning,
    /// The id list is empty even after a reload.
    NoIds,
}

/// Counters and cursor movement for one batch invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub trigger: TriggerKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub start_index: usize,
    pub end_index: usize,
    /// Fetch/upsert attempts, successful or not.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Ids passed over because the existing record could not be read.
    /// Not counted as attempts.
    pub lookup_errors: usize,
    /// Ids skipped because their record was already complete.
    pub skipped: usize,
    /// Ids skipped because they are quarantined.
    pub quarantined: usize,
    /// The cursor reached the end of the list and went back to 0.
    pub wrapped: bool,
}

/// Result of a `run_batch` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome", content = "detail")]
pub enum BatchOutcome {
    Completed(BatchSummary),
    Skipped(SkipReason),
    /// A forced reset revoked the lock while the batch was running; the
    /// summary covers the work done before it stopped.
    Preempted(BatchSummary),
}

impl BatchOutcome {
    pub fn summary(&self) -> Option<&BatchSummary> {
        match self {
            BatchOutcome::Completed(s) | BatchOutcome::Preempted(s) => Some(s),
            BatchOutcome::Skipped(_) => None,
        }
    }

    pub fn processed(&self) -> usize {
        self.summary().map(|s| s.processed).unwrap_or(0)
    }
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub total_ids: usize,
    pub current_index: usize,
    pub is_processing: bool,
    /// `current_index / total_ids` as a two-decimal percentage, e.g. `"66.67%"`.
    pub progress: String,
    pub quarantined: usize,
    pub cycles_completed: u64,
    pub last_batch: Option<BatchSummary>,
}

/// Format cursor progress the way the status endpoint reports it.
pub fn format_progress(current_index: usize, total_ids: usize) -> String {
    if total_ids == 0 {
        return "0%".to_string();
    }
    format!("{:.2}%", current_index as f64 / total_ids as f64 * 100.0)
}

/// Summary of a completed reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetReport {
    pub total_ids: usize,
    /// A running batch was revoked to perform the reset.
    pub preempted_batch: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResetError {
    #[error("a batch is currently running; retry later or force the reset")]
    Busy,
}
