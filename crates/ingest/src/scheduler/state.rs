//! Cursor state shared between the batch loop, reset and status readers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use harvest_core::{id_list_hash, RecordId};

use super::types::BatchSummary;

/// Everything the scheduler mutates besides the lock token.
///
/// Lives behind a `std::sync::RwLock`; no method here awaits.
#[derive(Debug, Default)]
pub(crate) struct CursorState {
    pub current_index: usize,
    pub all_ids: Arc<Vec<RecordId>>,
    /// Hash of `all_ids`, stamped on checkpoints.
    pub ids_hash: String,
    pub failures: HashMap<RecordId, u32>,
    pub quarantined: HashSet<RecordId>,
    pub cycles_completed: u64,
    pub last_batch: Option<BatchSummary>,
}

impl CursorState {
    pub fn total_ids(&self) -> usize {
        self.all_ids.len()
    }

    /// Replace the id list. The cursor is kept when it is still in range.
    pub fn install_ids(&mut self, ids: Vec<RecordId>) {
        self.ids_hash = id_list_hash(&ids);
        self.all_ids = Arc::new(ids);
        if self.current_index >= self.all_ids.len() {
            self.current_index = 0;
        }
    }

    /// Back to the start of a fresh list with no failure history.
    pub fn reset(&mut self, ids: Vec<RecordId>) {
        self.ids_hash = id_list_hash(&ids);
        self.all_ids = Arc::new(ids);
        self.current_index = 0;
        self.failures.clear();
        self.quarantined.clear();
    }

    /// Move the cursor to the start of the list after a full pass.
    pub fn wrap(&mut self) {
        self.current_index = 0;
        self.cycles_completed += 1;
    }

    /// Count a miss for `id`. Returns `true` when this pushes it into
    /// quarantine. A threshold of 0 never quarantines.
    pub fn note_miss(&mut self, id: RecordId, threshold: u32) -> bool {
        let count = self.failures.entry(id).or_insert(0);
        *count += 1;
        if threshold > 0 && *count >= threshold {
            self.failures.remove(&id);
            return self.quarantined.insert(id);
        }
        false
    }

    pub fn clear_failures(&mut self, id: RecordId) {
        self.failures.remove(&id);
    }

    pub fn is_quarantined(&self, id: RecordId) -> bool {
        self.quarantined.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_keeps_cursor_in_range() {
        let mut state = CursorState::default();
        state.install_ids(vec![1, 2, 3]);
        state.current_index = 2;

        state.install_ids(vec![1, 2, 3, 4]);
        assert_eq!(state.current_index, 2);

        state.install_ids(vec![9]);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.ids_hash, id_list_hash(&[9]));
    }

    #[test]
    fn misses_quarantine_at_threshold() {
        let mut state = CursorState::default();
        assert!(!state.note_miss(7, 3));
        assert!(!state.note_miss(7, 3));
        assert!(state.note_miss(7, 3));
        assert!(state.is_quarantined(7));
        assert!(!state.failures.contains_key(&7));
    }

    #[test]
    fn zero_threshold_never_quarantines() {
        let mut state = CursorState::default();
        for _ in 0..10 {
            assert!(!state.note_miss(7, 0));
        }
        assert!(!state.is_quarantined(7));
        assert_eq!(state.failures[&7], 10);
    }

    #[test]
    fn reset_clears_history() {
        let mut state = CursorState::default();
        state.install_ids(vec![1, 2]);
        state.current_index = 1;
        state.note_miss(1, 1);
        state.note_miss(2, 5);

        state.reset(vec![4, 5, 6]);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.total_ids(), 3);
        assert!(state.quarantined.is_empty());
        assert!(state.failures.is_empty());
    }
}
