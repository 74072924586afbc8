mod common;

use std::sync::Arc;

use csmt::{
    hash_bytes, hash_children, serial, BatchEngine, Dispatcher, LiveEngine, Operation, Tree,
    UpdateId,
};

#[test]
fn single_update_produces_the_expected_root() {
    // Depth 3, update leaf "000" with "a". The expected root is spelled out
    // by hand: only the leftmost spine of the tree changes.
    let empty = hash_bytes(b"");
    let pair = hash_children(&empty, &empty);
    let expected_root = hash_children(
        &hash_children(&hash_children(&hash_bytes(b"a"), &empty), &pair),
        &hash_children(&pair, &pair),
    );

    let mut tree = Tree::new(3).unwrap();
    serial::update(&mut tree, "000", "a").unwrap();
    assert_eq!(tree.root_hash(), expected_root);

    let tree = Tree::new(3).unwrap();
    let engine = LiveEngine::new();
    engine
        .update(
            &tree,
            "000",
            "a",
            UpdateId {
                worker_index: 0,
                update_count: 1,
            },
        )
        .unwrap();
    assert_eq!(tree.root_hash(), expected_root);

    let tree = Arc::new(Tree::new(3).unwrap());
    let engine = BatchEngine::new(2).unwrap();
    engine
        .process_batch(&tree, &[("000".to_string(), "a".to_string())])
        .unwrap();
    assert_eq!(tree.root_hash(), expected_root);
}

#[test]
fn adjacent_updates_meet_at_their_lowest_common_ancestor() {
    // "000" and "001" share the prefix "00"; that node combines both fresh
    // leaves, and everything above mixes in untouched subtrees.
    let updates = vec![
        ("000".to_string(), "a".to_string()),
        ("001".to_string(), "b".to_string()),
    ];
    let expected_lca = hash_children(&hash_bytes(b"a"), &hash_bytes(b"b"));
    let empty_pair = hash_children(&hash_bytes(b""), &hash_bytes(b""));
    let serial_root = common::serial_root(3, &updates);

    let mut tree = Tree::new(3).unwrap();
    for (key, value) in &updates {
        serial::update(&mut tree, key, value).unwrap();
    }
    assert_eq!(tree.node_hash("00").unwrap(), expected_lca);
    assert_eq!(
        tree.node_hash("0").unwrap(),
        hash_children(&expected_lca, &empty_pair)
    );

    for num_workers in [1, 2] {
        let tree = Arc::new(Tree::new(3).unwrap());
        let engine = BatchEngine::new(num_workers).unwrap();
        engine.process_batch(&tree, &updates).unwrap();
        assert_eq!(tree.node_hash("00").unwrap(), expected_lca);
        assert_eq!(tree.root_hash(), serial_root);
        common::check_internal_hashes(&tree);
    }

    let tree = Arc::new(Tree::new(3).unwrap());
    let engine = Arc::new(LiveEngine::new());
    let dispatcher = Dispatcher::new(tree.clone(), engine, 2).unwrap();
    for (key, value) in &updates {
        dispatcher
            .submit(Operation::Update {
                key: key.clone(),
                value: value.clone(),
            })
            .unwrap();
    }
    dispatcher.join().unwrap();
    assert_eq!(tree.node_hash("00").unwrap(), expected_lca);
    assert_eq!(tree.root_hash(), serial_root);
    common::check_internal_hashes(&tree);
}

#[test]
fn untouched_leaves_keep_the_default_hash() {
    let mut tree = Tree::new(3).unwrap();
    serial::update(&mut tree, "000", "a").unwrap();
    for i in 1..8u32 {
        let key = format!("{i:03b}");
        assert_eq!(tree.leaf_hash(&key).unwrap(), hash_bytes(b""));
    }
}
