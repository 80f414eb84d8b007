//! Record harvesting: id sources, the remote fetch client, the batch
//! scheduler and the worker that runs it.

pub mod client;
pub mod id_source;
pub mod scheduler;
pub mod worker;

pub use client::{FetchError, LookupKind, RecordFetcher, RemoteClient};
pub use id_source::{IdSource, JsonFileIdSource, StaticIdSource};
pub use scheduler::{
    BatchOutcome, BatchSummary, Pacer, ResetError, ResetReport, Scheduler, SchedulerOptions,
    SchedulerStatus, SkipReason, TokioPacer, TriggerKind,
};
pub use worker::{BatchHandle, BatchWorker, EnqueueResult};
