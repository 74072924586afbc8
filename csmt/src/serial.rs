//! The serial reference oracle.
//!
//! A plain leaf write followed by a bottom-up recomputation of every
//! ancestor, with no synchronization at all: it takes the tree by `&mut` and
//! goes through [`Mutex::get_mut`], so no lock is ever contended. This
//! defines the canonical root hash both concurrent engines must converge to.
//!
//! [`Mutex::get_mut`]: parking_lot::Mutex::get_mut

use crate::error::{Error, Result};
use crate::hasher;
use crate::tree::Tree;

/// Set the leaf at `key` to the hash of `value` and recompute every ancestor
/// hash up to the root.
pub fn update(tree: &mut Tree, key: &str, value: &str) -> Result<()> {
    let leaf = tree.validate_key(key)?;
    if !tree.node(leaf).is_leaf {
        return Err(Error::IllegalState(
            "leaf key resolved to a non-leaf node".to_string(),
        ));
    }
    tree.node_mut(leaf).state.get_mut().hash = hasher::hash_bytes(value.as_bytes());

    let mut cur = leaf;
    while let Some(parent) = tree.node(cur).parent {
        let (left, right) = match (tree.node(parent).left, tree.node(parent).right) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                return Err(Error::IllegalState(
                    "internal node missing a child".to_string(),
                ))
            }
        };
        let left_hash = tree.node_mut(left).state.get_mut().hash.clone();
        let right_hash = tree.node_mut(right).state.get_mut().hash.clone();
        tree.node_mut(parent).state.get_mut().hash =
            hasher::hash_children(&left_hash, &right_hash);
        cur = parent;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::{empty_leaf_hash, hash_bytes, hash_children};

    #[test]
    fn single_update_depth_one() {
        let mut tree = Tree::new(1).unwrap();
        update(&mut tree, "0", "v").unwrap();
        assert_eq!(tree.leaf_hash("0").unwrap(), hash_bytes(b"v"));
        assert_eq!(
            tree.root_hash(),
            hash_children(&hash_bytes(b"v"), &empty_leaf_hash())
        );
    }

    #[test]
    fn last_write_wins_per_key() {
        let mut tree = Tree::new(2).unwrap();
        update(&mut tree, "01", "a").unwrap();
        update(&mut tree, "01", "b").unwrap();
        assert_eq!(tree.leaf_hash("01").unwrap(), hash_bytes(b"b"));

        let mut oracle = Tree::new(2).unwrap();
        update(&mut oracle, "01", "b").unwrap();
        assert_eq!(tree.root_hash(), oracle.root_hash());
    }

    #[test]
    fn invalid_key_is_rejected_before_mutation() {
        let mut tree = Tree::new(2).unwrap();
        let before = tree.root_hash();
        assert!(update(&mut tree, "0", "v").is_err());
        assert_eq!(tree.root_hash(), before);
    }
}
