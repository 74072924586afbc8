//! The live update engine: per-request concurrent percolation.
//!
//! Each update writes its leaf and climbs toward the root, recomputing every
//! ancestor from both children read atomically with respect to each other.
//! Overlapping climbs coordinate through the stop table: when an update finds
//! a node last written by another worker, it advances that worker's stop
//! cursor to the count it displaced, telling the earlier climb that anything
//! it would still write above this point is already stale. Cancellation is
//! cooperative and checked once per level, right after taking the parent's
//! lock.
//!
//! Lock discipline: a climbing worker carries no lock between levels. At each
//! level it takes the parent's lock, then transiently both children's locks
//! (left before right) for the sibling read. Lock acquisition never ascends
//! while a lock is held, so no cycle can form.

use crate::error::{Error, Result};
use crate::hasher;
use crate::stop::StopTable;
use crate::tree::Tree;
use crate::MAX_WORKERS;

/// Names one live update: which worker issued it and where it falls in that
/// worker's strictly increasing sequence. Counts start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateId {
    /// Index of the issuing worker, below [`MAX_WORKERS`].
    pub worker_index: usize,
    /// Position in the worker's update sequence, strictly monotonic.
    pub update_count: u64,
}

/// The live engine. Owns the stop table shared by all workers.
pub struct LiveEngine {
    stop: StopTable,
}

impl Default for LiveEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveEngine {
    /// Create an engine with a stop table sized for [`MAX_WORKERS`], all
    /// cursors at zero.
    pub fn new() -> Self {
        LiveEngine {
            stop: StopTable::new(MAX_WORKERS),
        }
    }

    /// The current stop cursor of a worker: the highest update count it has
    /// been told to abandon.
    pub fn stop_cursor(&self, worker_index: usize) -> u64 {
        self.stop.cursor(worker_index)
    }

    /// Apply one update. Either the leaf reflects `value` and every ancestor
    /// this update was the latest to touch has been recomputed, or the update
    /// was superseded and returned early; both outcomes leave every written
    /// hash consistent with the child hashes observed under lock.
    pub fn update(&self, tree: &Tree, key: &str, value: &str, id: UpdateId) -> Result<()> {
        if id.worker_index >= MAX_WORKERS {
            return Err(Error::InvalidArgument(format!(
                "worker index {} out of range 0..{MAX_WORKERS}",
                id.worker_index
            )));
        }

        let leaf = tree.validate_key(key)?;
        if !tree.node(leaf).is_leaf {
            return Err(Error::IllegalState(
                "leaf key resolved to a non-leaf node".to_string(),
            ));
        }

        {
            let mut state = tree.node(leaf).state.lock();
            if let Some(prev) = state.last_writer {
                // A request with a lower or equal count lost the race to the
                // leaf; it must not roll the value back.
                if id.update_count <= prev.update_count {
                    return Ok(());
                }
                self.displace(prev, id);
            }
            state.hash = hasher::hash_bytes(value.as_bytes());
            state.last_writer = Some(id);
        }

        let mut cur = leaf;
        while let Some(parent_index) = tree.node(cur).parent {
            let parent = tree.node(parent_index);
            let mut state = parent.state.lock();

            if self.stop.cancels(id) {
                return Ok(());
            }

            let (left, right) = match (parent.left, parent.right) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    return Err(Error::IllegalState(
                        "internal node missing a child".to_string(),
                    ))
                }
            };

            // This update already reached the parent from this side; a second
            // pass would rewrite an identical state.
            let from_left = left == cur;
            if from_left {
                if state.left_child_writer == Some(id) {
                    return Ok(());
                }
            } else if state.right_child_writer == Some(id) {
                return Ok(());
            }

            let (left_hash, left_writer, right_hash, right_writer) = {
                let left_state = tree.node(left).state.lock();
                let right_state = tree.node(right).state.lock();
                (
                    left_state.hash.clone(),
                    left_state.last_writer,
                    right_state.hash.clone(),
                    right_state.last_writer,
                )
            };

            if let Some(prev) = state.last_writer {
                self.displace(prev, id);
            }

            state.hash = hasher::hash_children(&left_hash, &right_hash);
            state.left_child_writer = left_writer;
            state.right_child_writer = right_writer;
            state.last_writer = Some(id);
            drop(state);

            cur = parent_index;
        }

        Ok(())
    }

    /// Tell the worker whose write was just displaced to abandon everything
    /// up to and including the displaced count. A worker never displaces
    /// itself.
    fn displace(&self, prev: UpdateId, id: UpdateId) {
        if prev.worker_index != id.worker_index {
            self.stop.advance(prev.worker_index, prev.update_count);
        }
    }
}
