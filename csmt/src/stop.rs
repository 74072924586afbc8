//! The global stop table of the Live engine.
//!
//! One atomic cursor per worker. `stop[w]` is the highest update count worker
//! `w` has been told to abandon; an update `(w, c)` with `stop[w] >= c` must
//! end its climb at the next check. Cursors only move forward, via an atomic
//! monotonic max.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::live::UpdateId;

pub(crate) struct StopTable {
    slots: Box<[AtomicU64]>,
}

impl StopTable {
    pub fn new(workers: usize) -> Self {
        StopTable {
            slots: (0..workers).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Raise `stop[worker_index]` to at least `update_count`.
    pub fn advance(&self, worker_index: usize, update_count: u64) {
        self.slots[worker_index].fetch_max(update_count, Ordering::SeqCst);
    }

    pub fn cursor(&self, worker_index: usize) -> u64 {
        self.slots[worker_index].load(Ordering::SeqCst)
    }

    /// Whether the update has been superseded and must stop climbing.
    pub fn cancels(&self, id: UpdateId) -> bool {
        self.cursor(id.worker_index) >= id.update_count
    }
}
