//! [`Scheduler`]: walks the id list in bounded, paced batches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use harvest_core::{CursorCheckpoint, Record, RecordId};
use harvest_storage::{CheckpointStore, RecordStore, StoreError};

use crate::client::{FetchError, LookupKind, RecordFetcher};
use crate::id_source::IdSource;

use super::pacer::{Pacer, TokioPacer};
use super::state::CursorState;
use super::types::{
    format_progress, BatchOutcome, BatchSummary, ResetError, ResetReport, SchedulerOptions,
    SchedulerStatus, SkipReason, TriggerKind,
};

/// Lock value meaning no batch or reset is in progress.
const IDLE: u64 = 0;

/// Set on tokens held by a reset, so a forced reset can tell whether it
/// revoked a batch or another reset.
const RESET_TOKEN: u64 = 1 << 63;

#[derive(Debug, Error)]
enum ItemError {
    #[error("record lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("{kind} fetch failed: {source}")]
    Fetch {
        kind: LookupKind,
        #[source]
        source: FetchError,
    },

    #[error("upsert failed: {0}")]
    Upsert(#[source] StoreError),
}

impl ItemError {
    /// Remote-side failures count toward quarantine; store failures do not.
    fn counts_as_miss(&self) -> bool {
        matches!(self, ItemError::Fetch { .. })
    }
}

/// Incremental harvester over an ordered id list.
///
/// At most one batch runs at a time. The lock is an atomic token: 0 when
/// idle, otherwise the token of the batch (or reset) holding it. A batch only
/// writes cursor state while its token is still installed, so a forced
/// [`reset`](Scheduler::reset) can revoke it mid-run.
pub struct Scheduler {
    options: SchedulerOptions,
    id_source: Arc<dyn IdSource>,
    fetcher: Arc<dyn RecordFetcher>,
    store: Arc<dyn RecordStore>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    pacer: Arc<dyn Pacer>,
    lock: AtomicU64,
    next_token: AtomicU64,
    state: RwLock<CursorState>,
}

impl Scheduler {
    pub fn new(
        options: SchedulerOptions,
        id_source: Arc<dyn IdSource>,
        fetcher: Arc<dyn RecordFetcher>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            options,
            id_source,
            fetcher,
            store,
            checkpoints: None,
            pacer: Arc::new(TokioPacer),
            lock: AtomicU64::new(IDLE),
            next_token: AtomicU64::new(1),
            state: RwLock::new(CursorState::default()),
        }
    }

    /// Persist the cursor after every batch and reset.
    pub fn with_checkpoints(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Load the id list from the source. Returns the number of ids.
    pub async fn load_ids(&self) -> usize {
        let ids = self.id_source.load().await;
        let total = ids.len();
        self.write_state().install_ids(ids);
        info!(source = %self.id_source.describe(), total, "Loaded {} ids", total);
        total
    }

    /// Resume from the stored checkpoint if it matches the loaded list.
    ///
    /// Call after [`load_ids`](Scheduler::load_ids). Returns whether the
    /// cursor was restored.
    pub async fn restore_checkpoint(&self) -> bool {
        let Some(checkpoints) = &self.checkpoints else {
            return false;
        };

        let checkpoint = match checkpoints.load_checkpoint().await {
            Ok(Some(cp)) => cp,
            Ok(None) => {
                info!("No checkpoint stored, starting at index 0");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load checkpoint, starting at index 0");
                return false;
            }
        };

        let mut state = self.write_state();
        let total = state.total_ids();
        let index = checkpoint.current_index as usize;
        if checkpoint.total_ids as usize != total || checkpoint.ids_hash != state.ids_hash {
            info!(
                checkpoint_total = checkpoint.total_ids,
                total, "Id list changed since checkpoint, starting at index 0"
            );
            return false;
        }
        if index >= total {
            info!(index, total, "Checkpoint index out of range, starting at index 0");
            return false;
        }

        state.current_index = index;
        info!(index, total, "Resumed from checkpoint");
        true
    }

    /// Run one batch of up to `batch_size` fetch/upsert attempts.
    ///
    /// Never fails: per-item errors are logged and the cursor moves on.
    pub async fn run_batch(&self, trigger: TriggerKind) -> BatchOutcome {
        let Some(token) = self.try_acquire() else {
            info!(%trigger, "Batch already running, skipping");
            return BatchOutcome::Skipped(SkipReason::AlreadyRunning);
        };

        let started_at = Utc::now();

        if self.read_state().total_ids() == 0 {
            let ids = self.id_source.load().await;
            if ids.is_empty() {
                warn!(source = %self.id_source.describe(), "No ids to process");
                self.release(token);
                return BatchOutcome::Skipped(SkipReason::NoIds);
            }
            let mut state = self.write_state();
            if self.owns(token) {
                state.install_ids(ids);
            }
        }

        let (ids, start_index) = {
            let state = self.read_state();
            (Arc::clone(&state.all_ids), state.current_index)
        };
        let len = ids.len();

        let mut summary = BatchSummary {
            trigger,
            started_at,
            finished_at: started_at,
            start_index,
            end_index: start_index,
            processed: 0,
            succeeded: 0,
            failed: 0,
            lookup_errors: 0,
            skipped: 0,
            quarantined: 0,
            wrapped: false,
        };

        info!(
            %trigger,
            start_index,
            total = len,
            batch_size = self.options.batch_size,
            "Starting batch"
        );

        let mut index = start_index;
        let mut preempted = !self.owns(token);

        while !preempted && summary.processed < self.options.batch_size && index < len {
            let id = ids[index];

            if self.read_state().is_quarantined(id) {
                debug!(id, "Skipping quarantined id");
                summary.quarantined += 1;
                index += 1;
                preempted = !self.commit(token, |s| s.current_index = index);
                continue;
            }

            match self.store.find_by_id(id).await {
                Ok(Some(existing)) if existing.is_complete() => {
                    debug!(id, "Record already complete, skipping");
                    summary.skipped += 1;
                    index += 1;
                    preempted = !self.commit(token, |s| s.current_index = index);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    // Nothing was fetched: no attempt, no pause.
                    let e = ItemError::Lookup(e);
                    warn!(id, error = %e, "Failed to process id");
                    summary.lookup_errors += 1;
                    index += 1;
                    preempted = !self.commit(token, |s| s.current_index = index);
                    continue;
                }
            }

            let result = self.harvest(id).await;

            let threshold = self.options.max_item_failures;
            let quarantined = match result {
                Ok(record) => {
                    summary.succeeded += 1;
                    let empty = record.version_data.is_none() && record.full_data.is_none();
                    debug!(id, complete = record.is_complete(), "Stored record");
                    let mut hit = false;
                    self.commit(token, |s| {
                        if empty {
                            hit = s.note_miss(id, threshold);
                        } else {
                            s.clear_failures(id);
                        }
                    });
                    hit
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(id, error = %e, "Failed to process id");
                    let mut hit = false;
                    if e.counts_as_miss() {
                        self.commit(token, |s| hit = s.note_miss(id, threshold));
                    }
                    hit
                }
            };
            if quarantined {
                warn!(id, threshold, "Id quarantined after repeated failures");
            }

            summary.processed += 1;
            index += 1;
            if !self.commit(token, |s| s.current_index = index) {
                preempted = true;
                break;
            }

            if summary.processed < self.options.batch_size && index < len {
                self.pacer.pause(self.options.item_delay).await;
                preempted = !self.owns(token);
            }
        }

        if !preempted && index >= len {
            summary.wrapped = self.commit(token, CursorState::wrap);
            preempted = !summary.wrapped;
            if summary.wrapped {
                info!(total = len, "Reached end of id list, wrapping to 0");
            }
        }

        summary.end_index = if summary.wrapped { 0 } else { index };
        summary.finished_at = Utc::now();

        if preempted {
            warn!(
                %trigger,
                processed = summary.processed,
                "Batch preempted by reset"
            );
            return BatchOutcome::Preempted(summary);
        }

        self.save_checkpoint().await;
        self.commit(token, |s| s.last_batch = Some(summary.clone()));
        self.release(token);

        info!(
            %trigger,
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            lookup_errors = summary.lookup_errors,
            skipped = summary.skipped,
            end_index = summary.end_index,
            "Batch complete"
        );
        BatchOutcome::Completed(summary)
    }

    /// Zero the cursor, clear failure history and reload the id list.
    ///
    /// While a batch runs this returns [`ResetError::Busy`] unless `force`
    /// is set, in which case the batch is revoked and stops at its next item.
    pub async fn reset(&self, force: bool) -> Result<ResetReport, ResetError> {
        let token = self.mint_token() | RESET_TOKEN;
        let preempted_batch = match self
            .lock
            .compare_exchange(IDLE, token, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => false,
            Err(_) if !force => return Err(ResetError::Busy),
            Err(_) => {
                let revoked = self.lock.swap(token, Ordering::AcqRel);
                warn!(revoked, "Forcing reset, revoking the current lock holder");
                revoked != IDLE && revoked & RESET_TOKEN == 0
            }
        };

        let ids = self.id_source.load().await;
        let total_ids = ids.len();
        // A later forced reset may have taken over; it writes its own state.
        if self.commit(token, |s| s.reset(ids)) {
            self.save_checkpoint().await;
            self.release(token);
        }

        info!(total_ids, preempted_batch, "Scheduler reset");
        Ok(ResetReport {
            total_ids,
            preempted_batch,
        })
    }

    /// Current cursor position and lock state. Never awaits.
    pub fn status(&self) -> SchedulerStatus {
        let state = self.read_state();
        let total_ids = state.total_ids();
        SchedulerStatus {
            total_ids,
            current_index: state.current_index,
            is_processing: self.is_processing(),
            progress: format_progress(state.current_index, total_ids),
            quarantined: state.quarantined.len(),
            cycles_completed: state.cycles_completed,
            last_batch: state.last_batch.clone(),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.lock.load(Ordering::Acquire) != IDLE
    }

    /// Fetch both payloads concurrently and upsert whatever came back.
    async fn harvest(&self, id: RecordId) -> Result<Record, ItemError> {
        let (version, full) = tokio::join!(self.fetcher.fetch_version(id), self.fetcher.fetch_full(id));

        let version = version.map_err(|source| ItemError::Fetch {
            kind: LookupKind::Version,
            source,
        })?;
        let full = full.map_err(|source| ItemError::Fetch {
            kind: LookupKind::Full,
            source,
        })?;

        self.store
            .upsert(id, version, full, Utc::now())
            .await
            .map_err(ItemError::Upsert)
    }

    async fn save_checkpoint(&self) {
        let Some(checkpoints) = &self.checkpoints else {
            return;
        };
        let checkpoint = {
            let state = self.read_state();
            CursorCheckpoint {
                current_index: state.current_index as u64,
                total_ids: state.total_ids() as u64,
                ids_hash: state.ids_hash.clone(),
                updated_at: Utc::now(),
            }
        };
        if let Err(e) = checkpoints.save_checkpoint(&checkpoint).await {
            warn!(error = %e, "Failed to save checkpoint");
        }
    }

    fn mint_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn try_acquire(&self) -> Option<u64> {
        let token = self.mint_token();
        self.lock
            .compare_exchange(IDLE, token, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| token)
    }

    /// No-op when the token was revoked.
    fn release(&self, token: u64) {
        let _ = self
            .lock
            .compare_exchange(token, IDLE, Ordering::AcqRel, Ordering::Acquire);
    }

    fn owns(&self, token: u64) -> bool {
        self.lock.load(Ordering::Acquire) == token
    }

    /// Apply `f` under the state write lock if `token` still holds the lock.
    fn commit(&self, token: u64, f: impl FnOnce(&mut CursorState)) -> bool {
        let mut state = self.write_state();
        if !self.owns(token) {
            return false;
        }
        f(&mut state);
        true
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CursorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CursorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
