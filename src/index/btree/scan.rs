//! Forward range scans over the leaf chain.

use crate::buffer::{BufferPool, PageReadGuard};
use crate::common::{Key, PageId, RecordId, Result};

use super::node::LeafNode;

/// Cursor over leaf entries in key order, bounded above by an optional
/// inclusive `high` key.
///
/// At most one leaf is pinned at a time; it is released when the cursor
/// moves past it, reaches the end, or is dropped.
pub struct ScanCursor<'a> {
    pool: &'a BufferPool,
    leaf: Option<PageReadGuard<'a>>,
    slot: usize,
    high: Option<Key>,
}

impl<'a> ScanCursor<'a> {
    /// Pin `leaf_id` and position on the first entry `>= low`.
    pub(crate) fn open(
        pool: &'a BufferPool,
        leaf_id: PageId,
        low: Option<Key>,
        high: Option<Key>,
    ) -> Result<Self> {
        let guard = pool.fetch_page_read(leaf_id)?;
        let slot = match low {
            Some(low) => LeafNode::view(guard.as_slice())?.lower_bound(low),
            None => 0,
        };
        Ok(Self {
            pool,
            leaf: Some(guard),
            slot,
            high,
        })
    }

    /// Next `(record id, key)` pair, or `Ok(None)` once the range is
    /// exhausted.
    pub fn get_next(&mut self) -> Result<Option<(RecordId, Key)>> {
        loop {
            let Some(guard) = self.leaf.as_ref() else {
                return Ok(None);
            };
            let leaf = LeafNode::view(guard.as_slice())?;

            if self.slot < leaf.len() {
                let entry = leaf.entry(self.slot)?;
                if self.high.is_some_and(|high| entry.key > high) {
                    self.leaf = None;
                    return Ok(None);
                }
                self.slot += 1;
                return Ok(Some((entry.rid, entry.key)));
            }

            let next = leaf.next();
            self.leaf = None;
            if !next.is_valid() {
                return Ok(None);
            }
            self.leaf = Some(self.pool.fetch_page_read(next)?);
            self.slot = 0;
        }
    }

    /// Whether the cursor has released its last leaf.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.leaf.is_none()
    }

    /// Leaf currently pinned by the cursor.
    pub fn current_page(&self) -> Option<PageId> {
        self.leaf.as_ref().map(|guard| guard.page_id())
    }
}

impl Iterator for ScanCursor<'_> {
    type Item = Result<(RecordId, Key)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::index::btree::{BTreeConfig, BTreeIndex};
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    fn rid(key: Key) -> RecordId {
        RecordId::new(PageId::new(key as u32), key as u16 + 1)
    }

    fn populated_tree(keys: impl IntoIterator<Item = Key>) -> (BTreeIndex, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("scan.db")).unwrap();
        let pool = Arc::new(BufferPool::new(16, dm));
        let mut tree = BTreeIndex::create(pool, "scan", BTreeConfig::default()).unwrap();
        for key in keys {
            tree.insert(key, rid(key)).unwrap();
        }
        (tree, dir)
    }

    fn collect_keys(cursor: ScanCursor<'_>) -> Vec<Key> {
        cursor.map(|item| item.unwrap().1).collect()
    }

    #[test]
    fn test_scan_empty_tree() {
        let (tree, _dir) = populated_tree([]);
        let mut cursor = tree.open_scan(None, None).unwrap();
        assert_eq!(cursor.get_next().unwrap(), None);
        assert!(cursor.is_done());
        // Stays exhausted.
        assert_eq!(cursor.get_next().unwrap(), None);
    }

    #[test]
    fn test_full_scan_crosses_leaves() {
        let (tree, _dir) = populated_tree((1..=40).rev());
        let keys = collect_keys(tree.open_scan(None, None).unwrap());
        assert_eq!(keys, (1..=40).collect::<Vec<_>>());
    }

    #[test]
    fn test_scan_returns_record_ids() {
        let (tree, _dir) = populated_tree(1..=10);
        let mut cursor = tree.open_scan(Some(4), Some(4)).unwrap();
        assert_eq!(cursor.get_next().unwrap(), Some((rid(4), 4)));
        assert_eq!(cursor.get_next().unwrap(), None);
    }

    #[test]
    fn test_bounds_between_keys() {
        let (tree, _dir) = populated_tree((0..50).map(|k| k * 2));
        let keys = collect_keys(tree.open_scan(Some(9), Some(21)).unwrap());
        assert_eq!(keys, vec![10, 12, 14, 16, 18, 20]);
    }

    #[test]
    fn test_low_above_every_key() {
        let (tree, _dir) = populated_tree(1..=20);
        let keys = collect_keys(tree.open_scan(Some(100), None).unwrap());
        assert!(keys.is_empty());
    }

    #[test]
    fn test_low_greater_than_high() {
        let (tree, _dir) = populated_tree(1..=20);
        let keys = collect_keys(tree.open_scan(Some(15), Some(5)).unwrap());
        assert!(keys.is_empty());
    }

    #[test]
    fn test_cursor_pins_one_leaf() {
        let (tree, _dir) = populated_tree(1..=40);
        let pool = Arc::clone(tree.pool());

        let mut cursor = tree.open_scan(None, None).unwrap();
        for _ in 0..15 {
            cursor.get_next().unwrap();
            assert_eq!(pool.pinned_frame_count(), 1);
        }
        let page = cursor.current_page().unwrap();
        assert_eq!(pool.pin_count(page), Some(1));

        drop(cursor);
        assert_eq!(pool.pinned_frame_count(), 0);
    }
}
