#![warn(missing_docs)]

//! A sparse merkle tree maintained under a stream of concurrent leaf updates.
//!
//! The tree is a complete binary tree of fixed depth, materialized in full:
//! every leaf position exists from the start and holds the hash of the empty
//! value until written. Keys are binary strings of '0'/'1' characters naming
//! the root-to-leaf path.
//!
//! Two engines mutate the tree, and both agree with the [`serial`] reference
//! oracle once quiescent:
//!
//! - [`LiveEngine`] applies each update individually, percolating the new
//!   hash from leaf to root under fine-grained per-node locks. When a later
//!   update overtakes an earlier one at a shared ancestor, the earlier
//!   worker's stop cursor is advanced so it abandons the rest of its climb
//!   instead of rewriting hashes the overtaker will recompute.
//! - [`BatchEngine`] applies a whole batch at once: updates are sorted by
//!   key, the lowest common ancestors of adjacent update paths become
//!   conflict nodes, and workers climb disjoint path segments in parallel,
//!   meeting at each conflict node with a one-writer-wins rendezvous.
//!
//! Reads ([`Tree::root_hash`], [`Tree::leaf_hash`]) take the node's lock and
//! therefore always observe a whole hash, though no consistency across nodes
//! is implied while writers are active.

mod angela;
mod dispatch;
mod error;
mod hasher;
mod live;
mod stop;
mod tree;

pub mod serial;

pub use angela::BatchEngine;
pub use dispatch::{Dispatcher, Operation};
pub use error::{Error, Result};
pub use hasher::{empty_leaf_hash, hash_bytes, hash_children, NodeHash, DIGEST_HEX_LEN};
pub use live::{LiveEngine, UpdateId};
pub use tree::{Tree, MAX_DEPTH};

/// Fixed upper bound on worker threads across the engines. Also sizes the
/// Live engine's stop table.
pub const MAX_WORKERS: usize = 64;
