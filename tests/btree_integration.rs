//! End-to-end tests for the B+ tree index over a file-backed pool.

use std::sync::Arc;

use pagetree::{BTreeConfig, BTreeIndex, BufferPool, DiskManager, Error, Key, PageId, RecordId};
use tempfile::tempdir;

fn rid(key: Key) -> RecordId {
    RecordId::new(PageId::new(key.unsigned_abs()), (key.unsigned_abs() % 1000) as u16 + 1)
}

fn create_tree(pool_size: usize, order: usize) -> (BTreeIndex, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("tree.db")).unwrap();
    let pool = Arc::new(BufferPool::new(pool_size, dm));
    let tree = BTreeIndex::create(pool, "idx", BTreeConfig::new(order).unwrap()).unwrap();
    (tree, dir)
}

fn scan_keys(tree: &BTreeIndex, low: Option<Key>, high: Option<Key>) -> Vec<Key> {
    tree.open_scan(low, high)
        .unwrap()
        .map(|item| item.unwrap().1)
        .collect()
}

fn assert_no_pins(tree: &BTreeIndex) {
    let pool = tree.pool();
    assert_eq!(pool.pinned_frame_count(), 0);
    assert_eq!(pool.stats().snapshot().outstanding_pins(), 0);
}

#[test]
fn test_every_inserted_key_is_found() {
    let (mut tree, _dir) = create_tree(16, 2);

    // Interleave the insertion order so splits happen throughout the tree.
    let keys: Vec<Key> = (0..500).map(|i| (i * 37) % 500).collect();
    for &key in &keys {
        tree.insert(key, rid(key)).unwrap();
    }

    for &key in &keys {
        assert_eq!(tree.search(key).unwrap(), Some(rid(key)));
    }
    assert_eq!(tree.search(500).unwrap(), None);
    assert_eq!(tree.search(-1).unwrap(), None);
    assert_eq!(scan_keys(&tree, None, None), (0..500).collect::<Vec<_>>());
    tree.verify().unwrap();
    assert_no_pins(&tree);
}

#[test]
fn test_delete_lower_half() {
    let (mut tree, _dir) = create_tree(16, 2);

    for key in 1..=100 {
        tree.insert(key, rid(key)).unwrap();
    }
    for key in 1..=50 {
        tree.delete(key, rid(key)).unwrap();
        tree.verify().unwrap();
    }

    assert_eq!(scan_keys(&tree, None, None), (51..=100).collect::<Vec<_>>());
    for key in 1..=50 {
        assert_eq!(tree.search(key).unwrap(), None);
    }
    assert_no_pins(&tree);
}

#[test]
fn test_split_and_merge_return_to_single_leaf() {
    let (mut tree, _dir) = create_tree(8, 2);
    let pool = Arc::clone(tree.pool());

    for key in 1..=200 {
        tree.insert(key, rid(key)).unwrap();
    }
    let grown = tree.statistics().unwrap();
    assert!(grown.height >= 3);
    assert_eq!(grown.leaf_entries, 200);

    // Delete from both ends towards the middle.
    for i in 0..100 {
        for key in [1 + i, 200 - i] {
            tree.delete(key, rid(key)).unwrap();
        }
    }

    let stats = tree.statistics().unwrap();
    assert_eq!(stats.node_count(), 1);
    assert_eq!(stats.height, 1);
    assert_eq!(stats.leaf_entries, 0);
    assert_eq!(pool.live_page_count(), 1);
    assert!(scan_keys(&tree, None, None).is_empty());
}

#[test]
fn test_five_inserts_split_root() {
    let (mut tree, _dir) = create_tree(8, 2);
    let first_root = tree.root_page_id();

    for key in 1..=4 {
        tree.insert(key, rid(key)).unwrap();
    }
    assert_eq!(tree.root_page_id(), first_root);
    assert_eq!(tree.statistics().unwrap().height, 1);

    tree.insert(5, rid(5)).unwrap();
    assert_ne!(tree.root_page_id(), first_root);

    let stats = tree.statistics().unwrap();
    assert_eq!(stats.height, 2);
    assert_eq!(stats.leaf_nodes, 2);
    assert_eq!(stats.index_entries, 1);

    let mut out = Vec::new();
    tree.print(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(&format!("index node {}", tree.root_page_id())));
}

#[test]
fn test_range_scan_scenario() {
    let (mut tree, _dir) = create_tree(16, 2);
    for key in 1..=30 {
        tree.insert(key, rid(key)).unwrap();
    }

    let scanned: Vec<(RecordId, Key)> = tree
        .open_scan(Some(10), Some(20))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let expected: Vec<(RecordId, Key)> = (10..=20).map(|k| (rid(k), k)).collect();
    assert_eq!(scanned, expected);

    assert_eq!(scan_keys(&tree, None, Some(3)), vec![1, 2, 3]);
    assert_eq!(scan_keys(&tree, Some(28), None), vec![28, 29, 30]);
    assert_no_pins(&tree);
}

#[test]
fn test_small_pool_reports_exhaustion_without_corruption() {
    let (mut tree, _dir) = create_tree(2, 2);

    // Two frames are enough while splits stay on the rightmost leaf.
    for key in 1..=5 {
        tree.insert(key, rid(key)).unwrap();
    }
    tree.insert(0, rid(0)).unwrap();
    tree.insert(-1, rid(-1)).unwrap();

    // Splitting the left leaf also needs its successor pinned.
    let err = tree.insert(-2, rid(-2)).unwrap_err();
    assert!(matches!(err, Error::PoolExhausted));

    tree.verify().unwrap();
    assert_eq!(tree.search(-2).unwrap(), None);
    assert_eq!(scan_keys(&tree, None, None), vec![-1, 0, 1, 2, 3, 4, 5]);
    assert!(tree.pool().pinned_frame_count() <= tree.pool().pool_size());
    assert_no_pins(&tree);
}

#[test]
fn test_three_frames_are_enough() {
    let (mut tree, _dir) = create_tree(3, 2);

    for key in (1..=150).rev() {
        tree.insert(key, rid(key)).unwrap();
        assert_eq!(tree.pool().pinned_frame_count(), 0);
    }
    for key in (1..=150).filter(|k| k % 3 != 0) {
        tree.delete(key, rid(key)).unwrap();
    }

    tree.verify().unwrap();
    assert_eq!(
        scan_keys(&tree, None, None),
        (1..=150).filter(|k| k % 3 == 0).collect::<Vec<_>>()
    );
    assert_no_pins(&tree);
}

#[test]
fn test_rejected_operations_leave_tree_intact() {
    let (mut tree, _dir) = create_tree(16, 2);
    for key in 1..=20 {
        tree.insert(key, rid(key)).unwrap();
    }

    assert!(matches!(
        tree.insert(7, rid(99)),
        Err(Error::DuplicateKey(7))
    ));
    assert!(matches!(
        tree.delete(7, rid(8)),
        Err(Error::KeyNotFound { key: 7, .. })
    ));
    assert!(matches!(
        tree.delete(21, rid(21)),
        Err(Error::KeyNotFound { key: 21, .. })
    ));

    assert_eq!(tree.search(7).unwrap(), Some(rid(7)));
    assert_eq!(scan_keys(&tree, None, None), (1..=20).collect::<Vec<_>>());
    tree.verify().unwrap();
    assert_no_pins(&tree);
}

#[test]
fn test_index_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let config = BTreeConfig::new(3).unwrap();

    let root = {
        let pool = Arc::new(BufferPool::new(8, DiskManager::create(&path).unwrap()));
        let mut tree = BTreeIndex::create(pool, "persisted", config).unwrap();
        for key in 0..300 {
            tree.insert(key, rid(key)).unwrap();
        }
        let root = tree.root_page_id();
        tree.close().unwrap();
        root
    };

    let pool = Arc::new(BufferPool::new(8, DiskManager::open(&path).unwrap()));
    let tree = BTreeIndex::open(pool, "persisted", config).unwrap();
    assert_eq!(tree.root_page_id(), root);
    assert_eq!(tree.search(123).unwrap(), Some(rid(123)));
    assert_eq!(scan_keys(&tree, None, None), (0..300).collect::<Vec<_>>());
    tree.verify().unwrap();
}

#[test]
fn test_two_indexes_share_a_pool() {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("tree.db")).unwrap();
    let pool = Arc::new(BufferPool::new(8, dm));

    let mut evens = BTreeIndex::create(Arc::clone(&pool), "evens", BTreeConfig::default()).unwrap();
    let mut odds = BTreeIndex::create(Arc::clone(&pool), "odds", BTreeConfig::default()).unwrap();
    for key in 0..100 {
        let tree = if key % 2 == 0 { &mut evens } else { &mut odds };
        tree.insert(key, rid(key)).unwrap();
    }

    assert_eq!(
        scan_keys(&evens, None, None),
        (0..100).filter(|k| k % 2 == 0).collect::<Vec<_>>()
    );
    assert_eq!(odds.search(51).unwrap(), Some(rid(51)));
    assert_eq!(evens.search(51).unwrap(), None);

    evens.destroy().unwrap();
    assert_eq!(pool.file_entry("evens"), None);
    assert_eq!(odds.search(99).unwrap(), Some(rid(99)));
    odds.verify().unwrap();
}
