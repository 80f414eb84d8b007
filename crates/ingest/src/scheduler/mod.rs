//! Batch ingestion scheduler.
//!
//! A [`Scheduler`] owns the cursor over the id list. Each
//! [`run_batch`](Scheduler::run_batch) call resumes at the cursor, skips
//! records that are already complete, fetches and upserts up to
//! `batch_size` ids with a pause between attempts, and wraps to the start of
//! the list after the last id. Overlapping calls are rejected, not queued;
//! queueing lives in [`crate::worker`].

mod core;
mod pacer;
mod state;
mod types;


pub use self::core::Scheduler;
pub use self::pacer::{Pacer, TokioPacer};
pub use self::types::{
    format_progress, BatchOutcome, BatchSummary, ResetError, ResetReport, SchedulerOptions,
    SchedulerStatus, SkipReason, TriggerKind,
};
