//! The batch update engine (the "Angela" algorithm).
//!
//! A batch is sorted by key, which makes every group of updates sharing a
//! prefix contiguous. The longest common prefix of each adjacent pair names
//! the lowest common ancestor of two update leaves; the set of these conflict
//! nodes is exactly where concurrent climbs can meet. Below its nearest
//! conflict node every path segment belongs to a single update, so workers
//! percolate those segments in parallel without coordination. At a conflict
//! node the first arrival flips the node's `visited` flag and stops; the
//! later arrival sees the flag set, recomputes the node from two final
//! children, and carries the climb upward.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use threadpool::ThreadPool;

use crate::error::{Error, Result};
use crate::hasher;
use crate::tree::Tree;
use crate::MAX_WORKERS;

/// The batch engine. Owns a worker pool reused across batches.
pub struct BatchEngine {
    workers: ThreadPool,
    num_workers: usize,
}

impl BatchEngine {
    /// Create an engine backed by `num_workers` pool threads.
    pub fn new(num_workers: usize) -> Result<Self> {
        if num_workers == 0 || num_workers > MAX_WORKERS {
            return Err(Error::InvalidArgument(format!(
                "num_workers must be in 1..={MAX_WORKERS}, got {num_workers}"
            )));
        }
        Ok(BatchEngine {
            workers: threadpool::Builder::new()
                .num_threads(num_workers)
                .thread_name("angela-worker".to_string())
                .build(),
            num_workers,
        })
    }

    /// Apply every update in the batch and return the wall-clock time from
    /// dispatch to the last worker finishing. The empty batch returns zero
    /// and touches nothing.
    ///
    /// Updates with identical keys all land on the same leaf; which value
    /// survives is unspecified. Callers that care must deduplicate to the
    /// last write per key beforehand.
    pub fn process_batch(
        &self,
        tree: &Arc<Tree>,
        updates: &[(String, String)],
    ) -> Result<Duration> {
        if updates.is_empty() {
            return Ok(Duration::ZERO);
        }

        for (key, _) in updates {
            tree.validate_key(key)?;
        }

        let mut updates = updates.to_vec();
        updates.sort_by(|a, b| a.0.cmp(&b.0));

        let conflicts = conflict_prefixes(&updates);
        for prefix in &conflicts {
            if let Some(node) = tree.node_by_prefix(prefix) {
                tree.node(node).visited.store(false, Ordering::SeqCst);
            }
        }

        let updates = Arc::new(updates);
        let conflicts = Arc::new(conflicts);
        let next = Arc::new(AtomicUsize::new(0));

        let started = Instant::now();
        let (tx, rx) = crossbeam_channel::bounded(self.num_workers);
        for _ in 0..self.num_workers {
            let tree = tree.clone();
            let updates = updates.clone();
            let conflicts = conflicts.clone();
            let next = next.clone();
            let tx = tx.clone();
            self.workers.execute(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_worker(&tree, &updates, &conflicts, &next)
                }));
                let _ = tx.send(result);
            });
        }
        drop(tx);

        for result in rx.iter().take(self.num_workers) {
            match result {
                Ok(worker_result) => worker_result?,
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        Ok(started.elapsed())
    }
}

/// Claim updates off the shared counter until the batch is exhausted,
/// percolating each one.
fn run_worker(
    tree: &Tree,
    updates: &[(String, String)],
    conflicts: &HashSet<String>,
    next: &AtomicUsize,
) -> Result<()> {
    loop {
        let index = next.fetch_add(1, Ordering::SeqCst);
        let Some((key, value)) = updates.get(index) else {
            return Ok(());
        };
        let Some(leaf) = tree.leaf(key) else {
            continue;
        };

        tree.node(leaf).state.lock().hash = hasher::hash_bytes(value.as_bytes());

        let mut cur = leaf;
        while let Some(parent_index) = tree.node(cur).parent {
            let parent = tree.node(parent_index);
            let mut state = parent.state.lock();

            if conflicts.contains(parent.key.as_str())
                && parent
                    .visited
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                // First arrival at the meeting point. The partner will see
                // both children final and recompute this node on its way up.
                break;
            }

            let (left, right) = match (parent.left, parent.right) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    return Err(Error::IllegalState(
                        "internal node missing a child".to_string(),
                    ))
                }
            };
            let left_hash = tree.node(left).state.lock().hash.clone();
            let right_hash = tree.node(right).state.lock().hash.clone();
            state.hash = hasher::hash_children(&left_hash, &right_hash);
            drop(state);

            cur = parent_index;
        }
    }
}

/// The longest common prefix of every adjacent pair of sorted keys. Each
/// prefix names the lowest common ancestor of two update leaves.
fn conflict_prefixes(sorted: &[(String, String)]) -> HashSet<String> {
    let mut prefixes = HashSet::new();
    for pair in sorted.windows(2) {
        let len = common_prefix_len(&pair[0].0, &pair[1].0);
        prefixes.insert(pair[0].0[..len].to_string());
    }
    prefixes
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(keys: &[&str]) -> Vec<(String, String)> {
        keys.iter()
            .map(|k| (k.to_string(), "v".to_string()))
            .collect()
    }

    #[test]
    fn common_prefix_lengths() {
        assert_eq!(common_prefix_len("000", "001"), 2);
        assert_eq!(common_prefix_len("000", "111"), 0);
        assert_eq!(common_prefix_len("010", "010"), 3);
        assert_eq!(common_prefix_len("", ""), 0);
    }

    #[test]
    fn adjacent_pairs_yield_their_lca() {
        let prefixes = conflict_prefixes(&batch(&["000", "001", "111"]));
        let expected: HashSet<String> = ["00", ""].iter().map(|s| s.to_string()).collect();
        assert_eq!(prefixes, expected);
    }

    #[test]
    fn single_update_has_no_conflicts() {
        assert!(conflict_prefixes(&batch(&["010"])).is_empty());
    }

    #[test]
    fn duplicate_keys_conflict_at_the_leaf() {
        let prefixes = conflict_prefixes(&batch(&["01", "01"]));
        let expected: HashSet<String> = ["01"].iter().map(|s| s.to_string()).collect();
        assert_eq!(prefixes, expected);
    }

    #[test]
    fn worker_count_bounds() {
        assert!(matches!(
            BatchEngine::new(0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            BatchEngine::new(MAX_WORKERS + 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(BatchEngine::new(MAX_WORKERS).is_ok());
    }
}
