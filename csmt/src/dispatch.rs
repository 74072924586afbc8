//! The operation dispatcher feeding the Live engine.
//!
//! A fixed pool of worker threads drains a shared queue of operations. Each
//! worker owns its index and a private update counter, so every UPDATE is
//! delivered exactly once to exactly one worker with a fresh, strictly
//! monotonic count. Shutdown is by channel disconnection: dropping the sender
//! lets workers drain the queue and exit.
//!
//! Keys are validated at submission, so an operation that enters the queue
//! cannot fail on a bad key inside a worker. Per-operation response times
//! (submission to completion) are collected per worker and handed back at
//! join.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::error::{Error, Result};
use crate::live::{LiveEngine, UpdateId};
use crate::tree::Tree;
use crate::MAX_WORKERS;

/// An operation submitted to the dispatcher.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Write `value` into the leaf at `key` and percolate.
    Update {
        /// Full-length binary leaf key.
        key: String,
        /// Raw value; the leaf stores its hash.
        value: String,
    },
    /// Read the root hash.
    ReadRoot,
    /// Read the hash of the leaf at `key`.
    ReadLeaf {
        /// Full-length binary leaf key.
        key: String,
    },
}

struct Job {
    op: Operation,
    arrival: Instant,
}

/// A pool of Live workers behind a shared request queue.
pub struct Dispatcher {
    tree: Arc<Tree>,
    sender: Sender<Job>,
    workers: Vec<JoinHandle<Result<Vec<Duration>>>>,
}

impl Dispatcher {
    /// Spawn `num_workers` workers over `tree` driving `engine`.
    pub fn new(tree: Arc<Tree>, engine: Arc<LiveEngine>, num_workers: usize) -> Result<Self> {
        if num_workers == 0 || num_workers > MAX_WORKERS {
            return Err(Error::InvalidArgument(format!(
                "num_workers must be in 1..={MAX_WORKERS}, got {num_workers}"
            )));
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(num_workers);
        for worker_index in 0..num_workers {
            let tree = tree.clone();
            let engine = engine.clone();
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("live-worker-{worker_index}"))
                .spawn(move || worker_loop(worker_index, &tree, &engine, receiver))
                .expect("failed to spawn live worker");
            workers.push(handle);
        }

        Ok(Dispatcher {
            tree,
            sender,
            workers,
        })
    }

    /// Enqueue an operation, stamping its arrival time. Keys are validated
    /// here so errors surface to the submitter rather than inside a worker.
    pub fn submit(&self, op: Operation) -> Result<()> {
        match &op {
            Operation::Update { key, .. } | Operation::ReadLeaf { key } => {
                self.tree.validate_key(key)?;
            }
            Operation::ReadRoot => {}
        }
        let job = Job {
            op,
            arrival: Instant::now(),
        };
        // UNWRAP: workers hold the receiver until the sender is dropped in
        // `join`, which consumes the dispatcher.
        self.sender.send(job).expect("live workers exited early");
        Ok(())
    }

    /// Close the queue, wait for the workers to drain it, and collect each
    /// worker's response times. Worker panics are propagated.
    pub fn join(self) -> Result<Vec<Vec<Duration>>> {
        drop(self.sender);
        let mut response_times = Vec::with_capacity(self.workers.len());
        for handle in self.workers {
            match handle.join() {
                Ok(worker_result) => response_times.push(worker_result?),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
        Ok(response_times)
    }
}

fn worker_loop(
    worker_index: usize,
    tree: &Tree,
    engine: &LiveEngine,
    receiver: Receiver<Job>,
) -> Result<Vec<Duration>> {
    let mut update_count = 0u64;
    let mut response_times = Vec::new();
    while let Ok(job) = receiver.recv() {
        match job.op {
            Operation::Update { key, value } => {
                update_count += 1;
                let id = UpdateId {
                    worker_index,
                    update_count,
                };
                engine.update(tree, &key, &value, id)?;
            }
            Operation::ReadRoot => {
                let _ = tree.root_hash();
            }
            Operation::ReadLeaf { key } => {
                let _ = tree.leaf_hash(&key)?;
            }
        }
        response_times.push(job.arrival.elapsed());
    }
    Ok(response_times)
}
