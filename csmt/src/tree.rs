//! The materialized sparse merkle tree.
//!
//! The tree is an arena of nodes: parent and child links are indices into a
//! single `Vec`, which sidesteps cyclic ownership between parents and
//! children. Topology (`key`, links, `is_leaf`) is fixed at construction and
//! lives outside any lock; the hash and the Live engine's writer metadata sit
//! behind a per-node mutex, and the batch engine's rendezvous flag is an
//! atomic on the node itself.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::hasher::{self, NodeHash};
use crate::live::UpdateId;

/// Largest accepted tree depth. The tree is materialized in full, so anything
/// near this bound is already impractical to allocate.
pub const MAX_DEPTH: usize = 32;

pub(crate) type NodeIndex = usize;

const ROOT: NodeIndex = 0;

/// Mutable per-node state, guarded by the node's mutex.
pub(crate) struct NodeState {
    pub hash: NodeHash,
    /// The update that last wrote this node's hash. `None` until first write.
    pub last_writer: Option<UpdateId>,
    /// The update that had last written the left child when this node's hash
    /// was last recomputed.
    pub left_child_writer: Option<UpdateId>,
    /// Symmetric to `left_child_writer` for the right child.
    pub right_child_writer: Option<UpdateId>,
}

pub(crate) struct Node {
    /// Root-to-node path, '0' = left, '1' = right. Empty at the root.
    pub key: String,
    pub parent: Option<NodeIndex>,
    pub left: Option<NodeIndex>,
    pub right: Option<NodeIndex>,
    pub is_leaf: bool,
    /// Batch-engine rendezvous flag, reset per batch for conflict nodes.
    pub visited: AtomicBool,
    pub state: Mutex<NodeState>,
}

/// A complete binary merkle tree of fixed depth.
///
/// Depth D yields `2^D` leaves and `2^(D+1) - 1` nodes, all allocated once at
/// construction. `D = 0` is a single node that is both root and leaf.
pub struct Tree {
    nodes: Vec<Node>,
    depth: usize,
    leaves: HashMap<String, NodeIndex>,
}

impl Tree {
    /// Build the full tree. Every leaf starts at the hash of the empty value
    /// and every internal hash is computed bottom-up from its children.
    pub fn new(depth: usize) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(Error::InvalidArgument(format!(
                "depth {depth} exceeds maximum {MAX_DEPTH}"
            )));
        }

        let default_leaf_hash = hasher::empty_leaf_hash();
        let node_count = (1u64 << (depth + 1)) - 1;
        let mut nodes = Vec::with_capacity(node_count as usize);
        let mut leaves = HashMap::with_capacity((1u64 << depth) as usize);
        build_subtree(
            &mut nodes,
            &mut leaves,
            depth,
            None,
            String::new(),
            &default_leaf_hash,
        );

        Ok(Tree {
            nodes,
            depth,
            leaves,
        })
    }

    /// The depth the tree was built with.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of leaves, always `2^depth`.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// The current root hash, read under the root's lock.
    pub fn root_hash(&self) -> NodeHash {
        self.nodes[ROOT].state.lock().hash.clone()
    }

    /// The current hash of the leaf at `key`, read under the leaf's lock.
    pub fn leaf_hash(&self, key: &str) -> Result<NodeHash> {
        let leaf = self.validate_key(key)?;
        Ok(self.nodes[leaf].state.lock().hash.clone())
    }

    /// The current hash of the node named by `path` (any length up to the
    /// depth; the empty path is the root), read under that node's lock.
    pub fn node_hash(&self, path: &str) -> Result<NodeHash> {
        let node = self
            .node_by_prefix(path)
            .ok_or_else(|| Error::InvalidKey(format!("no node at path {path:?}")))?;
        Ok(self.nodes[node].state.lock().hash.clone())
    }

    /// Check length and membership in the leaf map, returning the leaf's
    /// index.
    pub(crate) fn validate_key(&self, key: &str) -> Result<NodeIndex> {
        if key.len() != self.depth {
            return Err(Error::InvalidKey(format!(
                "key length {} does not match tree depth {}",
                key.len(),
                self.depth
            )));
        }
        self.leaves
            .get(key)
            .copied()
            .ok_or_else(|| Error::InvalidKey(format!("no leaf for key {key:?}")))
    }

    pub(crate) fn leaf(&self, key: &str) -> Option<NodeIndex> {
        self.leaves.get(key).copied()
    }

    /// Descend from the root along `prefix`. `None` when the prefix walks off
    /// the tree or contains a character other than '0'/'1'.
    pub(crate) fn node_by_prefix(&self, prefix: &str) -> Option<NodeIndex> {
        let mut cur = ROOT;
        for c in prefix.chars() {
            let node = &self.nodes[cur];
            cur = match c {
                '0' => node.left?,
                '1' => node.right?,
                _ => return None,
            };
        }
        Some(cur)
    }

    pub(crate) fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index]
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index]
    }
}

fn build_subtree(
    nodes: &mut Vec<Node>,
    leaves: &mut HashMap<String, NodeIndex>,
    levels_below: usize,
    parent: Option<NodeIndex>,
    key: String,
    default_leaf_hash: &NodeHash,
) -> NodeIndex {
    let index = nodes.len();
    let is_leaf = levels_below == 0;
    nodes.push(Node {
        key: key.clone(),
        parent,
        left: None,
        right: None,
        is_leaf,
        visited: AtomicBool::new(false),
        state: Mutex::new(NodeState {
            hash: NodeHash::new(),
            last_writer: None,
            left_child_writer: None,
            right_child_writer: None,
        }),
    });

    if is_leaf {
        nodes[index].state.get_mut().hash = default_leaf_hash.clone();
        leaves.insert(key, index);
        return index;
    }

    let left = build_subtree(
        nodes,
        leaves,
        levels_below - 1,
        Some(index),
        format!("{key}0"),
        default_leaf_hash,
    );
    let right = build_subtree(
        nodes,
        leaves,
        levels_below - 1,
        Some(index),
        format!("{key}1"),
        default_leaf_hash,
    );

    let combined = {
        let left_hash = nodes[left].state.get_mut().hash.clone();
        let right_hash = nodes[right].state.get_mut().hash.clone();
        hasher::hash_children(&left_hash, &right_hash)
    };
    let node = &mut nodes[index];
    node.left = Some(left);
    node.right = Some(right);
    node.state.get_mut().hash = combined;
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::{empty_leaf_hash, hash_children};

    #[test]
    fn depth_zero_is_a_single_leaf() {
        let tree = Tree::new(0).unwrap();
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.root_hash(), empty_leaf_hash());
        assert_eq!(tree.leaf_hash("").unwrap(), tree.root_hash());
    }

    #[test]
    fn fresh_tree_hashes_bottom_up() {
        let tree = Tree::new(2).unwrap();
        let leaf = empty_leaf_hash();
        let level1 = hash_children(&leaf, &leaf);
        assert_eq!(tree.root_hash(), hash_children(&level1, &level1));
        assert_eq!(tree.node_hash("0").unwrap(), level1);
        assert_eq!(tree.node_hash("10").unwrap(), leaf);
    }

    #[test]
    fn leaf_map_covers_every_key() {
        let tree = Tree::new(3).unwrap();
        assert_eq!(tree.leaf_count(), 8);
        for i in 0..8u32 {
            let key = format!("{i:03b}");
            assert!(tree.leaf(&key).is_some(), "missing leaf {key}");
        }
    }

    #[test]
    fn key_validation() {
        let tree = Tree::new(3).unwrap();
        assert!(matches!(
            tree.leaf_hash("00"),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            tree.leaf_hash("0000"),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            tree.leaf_hash("0a1"),
            Err(Error::InvalidKey(_))
        ));
        assert!(tree.leaf_hash("010").is_ok());
    }

    #[test]
    fn prefix_descent() {
        let tree = Tree::new(3).unwrap();
        assert_eq!(tree.node_by_prefix(""), Some(0));
        assert!(tree.node_by_prefix("1111").is_none());
        assert!(tree.node_by_prefix("2").is_none());

        let idx = tree.node_by_prefix("01").unwrap();
        assert_eq!(tree.node(idx).key, "01");
        assert!(!tree.node(idx).is_leaf);
    }

    #[test]
    fn depth_cap() {
        assert!(matches!(
            Tree::new(MAX_DEPTH + 1),
            Err(Error::InvalidArgument(_))
        ));
    }
}
