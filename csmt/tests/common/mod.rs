use csmt::{hash_children, serial, NodeHash, Tree};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Root hash after applying `updates` in order through the serial oracle on a
/// fresh tree.
pub fn serial_root(depth: usize, updates: &[(String, String)]) -> NodeHash {
    let mut tree = Tree::new(depth).unwrap();
    for (key, value) in updates {
        serial::update(&mut tree, key, value).unwrap();
    }
    tree.root_hash()
}

/// Assert that every internal node's hash is the hash of its children's
/// hashes. Only meaningful once the engines are quiescent.
#[allow(dead_code)]
pub fn check_internal_hashes(tree: &Tree) {
    fn check(tree: &Tree, prefix: &str) {
        if prefix.len() == tree.depth() {
            return;
        }
        let left = format!("{prefix}0");
        let right = format!("{prefix}1");
        assert_eq!(
            tree.node_hash(prefix).unwrap(),
            hash_children(
                &tree.node_hash(&left).unwrap(),
                &tree.node_hash(&right).unwrap()
            ),
            "inconsistent internal node at {prefix:?}"
        );
        check(tree, &left);
        check(tree, &right);
    }
    check(tree, "");
}

/// `count` distinct random leaf keys for a tree of the given depth,
/// deterministic in `seed`.
#[allow(dead_code)]
pub fn distinct_keys(depth: usize, count: usize, seed: u64) -> Vec<String> {
    assert!(count <= 1 << depth);
    let mut rng = rand_pcg::Pcg32::seed_from_u64(seed);
    let mut keys: Vec<String> = (0..1u64 << depth)
        .map(|i| format!("{i:0depth$b}"))
        .collect();
    keys.shuffle(&mut rng);
    keys.truncate(count);
    keys
}

/// Random updates over distinct keys with small numeric string values.
#[allow(dead_code)]
pub fn random_updates(depth: usize, count: usize, seed: u64) -> Vec<(String, String)> {
    let mut rng = rand_pcg::Pcg32::seed_from_u64(seed.wrapping_add(1));
    distinct_keys(depth, count, seed)
        .into_iter()
        .map(|key| (key, rng.gen_range(0..1000u32).to_string()))
        .collect()
}
