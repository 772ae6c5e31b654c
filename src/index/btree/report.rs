//! Tree-walking diagnostics: printing, statistics and structural checks.
//!
//! Each walk pins one node at a time just long enough to copy it out, so
//! none of them leaves pins behind.

use std::fmt;
use std::io::Write;

use crate::common::{Error, Key, PageId, Result};

use super::tree::{BTreeIndex, NodeSnapshot};

/// Minimum, maximum and mean fill of one node kind, as fractions of
/// `2 * order`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FillFactor {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl FillFactor {
    fn from_fills(fills: &[f64]) -> Self {
        if fills.is_empty() {
            return Self::default();
        }
        let min = fills.iter().copied().fold(f64::INFINITY, f64::min);
        let max = fills.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = fills.iter().sum::<f64>() / fills.len() as f64;
        Self { min, max, mean }
    }
}

impl fmt::Display for FillFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min {:.1}%, max {:.1}%, mean {:.1}%",
            self.min * 100.0,
            self.max * 100.0,
            self.mean * 100.0
        )
    }
}

/// Shape of a tree at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TreeStatistics {
    /// Levels from root to leaves; a lone leaf root has height 1.
    pub height: usize,
    pub leaf_nodes: usize,
    pub index_nodes: usize,
    pub leaf_entries: usize,
    pub index_entries: usize,
    pub leaf_fill: FillFactor,
    pub index_fill: FillFactor,
}

impl TreeStatistics {
    /// Leaf plus index nodes.
    pub fn node_count(&self) -> usize {
        self.leaf_nodes + self.index_nodes
    }
}

impl fmt::Display for TreeStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "height:        {}", self.height)?;
        writeln!(f, "leaf nodes:    {}", self.leaf_nodes)?;
        writeln!(f, "index nodes:   {}", self.index_nodes)?;
        writeln!(f, "leaf entries:  {}", self.leaf_entries)?;
        writeln!(f, "index entries: {}", self.index_entries)?;
        writeln!(f, "leaf fill:     {}", self.leaf_fill)?;
        write!(f, "index fill:    {}", self.index_fill)
    }
}

/// Accumulates per-node observations while walking.
#[derive(Default)]
struct StatsWalk {
    stats: TreeStatistics,
    leaf_fills: Vec<f64>,
    index_fills: Vec<f64>,
}

/// Leaf links gathered in left-to-right order by [`BTreeIndex::verify`].
struct LeafLink {
    page_id: PageId,
    prev: PageId,
    next: PageId,
}

impl BTreeIndex {
    /// Write every node, children before their parent, to `out`.
    pub fn print<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(
            out,
            "---- B+ tree '{}' (root {}, order {}) ----",
            self.name(),
            self.root_page_id(),
            self.config().order
        )?;
        self.print_subtree(self.root_page_id(), out)
    }

    fn print_subtree<W: Write>(&self, page_id: PageId, out: &mut W) -> Result<()> {
        match self.snapshot(page_id)? {
            NodeSnapshot::Internal { leftmost, entries } => {
                self.print_subtree(leftmost, out)?;
                for entry in &entries {
                    self.print_subtree(entry.child, out)?;
                }

                writeln!(out, "index node {page_id}")?;
                writeln!(out, "  leftmost: {leftmost}")?;
                for entry in &entries {
                    writeln!(out, "  key: {:>6}  child: {}", entry.key, entry.child)?;
                }
                writeln!(out, "  {} entries", entries.len())?;
            }
            NodeSnapshot::Leaf {
                entries,
                prev,
                next,
            } => {
                writeln!(out, "leaf node {page_id} (prev {prev}, next {next})")?;
                for entry in &entries {
                    writeln!(out, "  key: {:>6}  rid: {}", entry.key, entry.rid)?;
                }
                writeln!(out, "  {} entries", entries.len())?;
            }
        }
        Ok(())
    }

    /// Count nodes and entries and measure fill factors.
    pub fn statistics(&self) -> Result<TreeStatistics> {
        let mut walk = StatsWalk::default();
        self.stats_subtree(self.root_page_id(), 1, &mut walk)?;

        let mut stats = walk.stats;
        stats.leaf_fill = FillFactor::from_fills(&walk.leaf_fills);
        stats.index_fill = FillFactor::from_fills(&walk.index_fills);
        Ok(stats)
    }

    fn stats_subtree(&self, page_id: PageId, depth: usize, walk: &mut StatsWalk) -> Result<()> {
        let max_entries = self.config().max_entries() as f64;
        walk.stats.height = walk.stats.height.max(depth);

        match self.snapshot(page_id)? {
            NodeSnapshot::Leaf { entries, .. } => {
                walk.stats.leaf_nodes += 1;
                walk.stats.leaf_entries += entries.len();
                walk.leaf_fills.push(entries.len() as f64 / max_entries);
            }
            NodeSnapshot::Internal { leftmost, entries } => {
                walk.stats.index_nodes += 1;
                walk.stats.index_entries += entries.len();
                walk.index_fills.push(entries.len() as f64 / max_entries);

                self.stats_subtree(leftmost, depth + 1, walk)?;
                for entry in entries {
                    self.stats_subtree(entry.child, depth + 1, walk)?;
                }
            }
        }
        Ok(())
    }

    /// Check the structural invariants of the whole tree.
    ///
    /// Verified: strictly ascending keys within each node, separator
    /// ranges, fill bounds of non-root nodes, equal leaf depth, and
    /// mutually consistent `prev`/`next` links along the leaf chain.
    ///
    /// # Errors
    /// `Error::TreeInvariant` describing the first violation found.
    pub fn verify(&self) -> Result<()> {
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        self.verify_subtree(
            self.root_page_id(),
            None,
            None,
            1,
            &mut leaf_depth,
            &mut leaves,
        )?;

        for (i, leaf) in leaves.iter().enumerate() {
            let expected_prev = match i {
                0 => PageId::INVALID,
                _ => leaves[i - 1].page_id,
            };
            let expected_next = leaves
                .get(i + 1)
                .map_or(PageId::INVALID, |next| next.page_id);

            if leaf.prev != expected_prev {
                return Err(violation(format!(
                    "leaf {} has prev {}, expected {}",
                    leaf.page_id, leaf.prev, expected_prev
                )));
            }
            if leaf.next != expected_next {
                return Err(violation(format!(
                    "leaf {} has next {}, expected {}",
                    leaf.page_id, leaf.next, expected_next
                )));
            }
        }
        Ok(())
    }

    /// `low` is inclusive, `high` exclusive; `None` is unbounded.
    fn verify_subtree(
        &self,
        page_id: PageId,
        low: Option<Key>,
        high: Option<Key>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<LeafLink>,
    ) -> Result<()> {
        let is_root = page_id == self.root_page_id();
        let order = self.config().order;
        let max_entries = self.config().max_entries();

        let snapshot = self.snapshot(page_id)?;
        let keys: Vec<Key> = match &snapshot {
            NodeSnapshot::Leaf { entries, .. } => entries.iter().map(|e| e.key).collect(),
            NodeSnapshot::Internal { entries, .. } => entries.iter().map(|e| e.key).collect(),
        };

        if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(violation(format!("keys of {page_id} are not ascending")));
        }
        if let Some(&key) = keys
            .iter()
            .find(|&&k| low.is_some_and(|l| k < l) || high.is_some_and(|h| k >= h))
        {
            return Err(violation(format!(
                "key {key} in {page_id} outside [{low:?}, {high:?})"
            )));
        }
        if keys.len() > max_entries {
            return Err(violation(format!(
                "{page_id} holds {} entries, more than {max_entries}",
                keys.len()
            )));
        }
        if !is_root && keys.len() < order {
            return Err(violation(format!(
                "{page_id} holds {} entries, fewer than {order}",
                keys.len()
            )));
        }

        match snapshot {
            NodeSnapshot::Leaf { prev, next, .. } => {
                let expected = *leaf_depth.get_or_insert(depth);
                if expected != depth {
                    return Err(violation(format!(
                        "leaf {page_id} at depth {depth}, expected {expected}"
                    )));
                }
                leaves.push(LeafLink {
                    page_id,
                    prev,
                    next,
                });
            }
            NodeSnapshot::Internal { leftmost, entries } => {
                if entries.is_empty() {
                    return Err(violation(format!("index node {page_id} has no entries")));
                }
                let first_high = Some(entries[0].key);
                self.verify_subtree(leftmost, low, first_high, depth + 1, leaf_depth, leaves)?;
                for (i, entry) in entries.iter().enumerate() {
                    let child_high = entries.get(i + 1).map(|e| e.key).or(high);
                    self.verify_subtree(
                        entry.child,
                        Some(entry.key),
                        child_high,
                        depth + 1,
                        leaf_depth,
                        leaves,
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn violation(message: String) -> Error {
    Error::TreeInvariant(message)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::buffer::BufferPool;
    use crate::common::RecordId;
    use crate::index::btree::BTreeConfig;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    fn rid(key: Key) -> RecordId {
        RecordId::new(PageId::new(key as u32), key as u16 + 1)
    }

    fn create_test_tree() -> (BTreeIndex, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("report.db")).unwrap();
        let pool = Arc::new(BufferPool::new(16, dm));
        let tree = BTreeIndex::create(pool, "report", BTreeConfig::default()).unwrap();
        (tree, dir)
    }

    #[test]
    fn test_statistics_single_leaf() {
        let (mut tree, _dir) = create_test_tree();
        tree.insert(1, rid(1)).unwrap();
        tree.insert(2, rid(2)).unwrap();

        let stats = tree.statistics().unwrap();
        assert_eq!(stats.height, 1);
        assert_eq!(stats.leaf_nodes, 1);
        assert_eq!(stats.index_nodes, 0);
        assert_eq!(stats.leaf_entries, 2);
        assert_eq!(stats.leaf_fill.mean, 0.5);
        assert_eq!(stats.index_fill, FillFactor::default());
    }

    #[test]
    fn test_statistics_after_split() {
        let (mut tree, _dir) = create_test_tree();
        for key in 1..=5 {
            tree.insert(key, rid(key)).unwrap();
        }

        let stats = tree.statistics().unwrap();
        assert_eq!(stats.height, 2);
        assert_eq!(stats.node_count(), 3);
        assert_eq!(stats.leaf_entries, 5);
        assert_eq!(stats.index_entries, 1);
        assert_eq!(stats.leaf_fill.min, 0.5);
        assert_eq!(stats.leaf_fill.max, 0.75);

        let text = stats.to_string();
        assert!(text.contains("leaf nodes:    2"));
        assert!(text.contains("height:        2"));
    }

    #[test]
    fn test_print_lists_every_node() {
        let (mut tree, _dir) = create_test_tree();
        for key in 1..=5 {
            tree.insert(key, rid(key)).unwrap();
        }

        let mut out = Vec::new();
        tree.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.matches("leaf node").count(), 2);
        assert_eq!(text.matches("index node").count(), 1);
        assert!(text.contains("rid: [pg,slot]=[3,4]"));
        assert_eq!(tree.pool().pinned_frame_count(), 0);
    }

    #[test]
    fn test_verify_accepts_valid_trees() {
        let (mut tree, _dir) = create_test_tree();
        tree.verify().unwrap();
        for key in (0..300).map(|k| (k * 37) % 300) {
            tree.insert(key, rid(key)).unwrap();
        }
        tree.verify().unwrap();
        for key in (0..300).filter(|k| k % 4 != 0) {
            tree.delete(key, rid(key)).unwrap();
        }
        tree.verify().unwrap();
    }

    #[test]
    fn test_verify_detects_broken_leaf_link() {
        let (mut tree, _dir) = create_test_tree();
        for key in 1..=5 {
            tree.insert(key, rid(key)).unwrap();
        }

        let NodeSnapshot::Internal { leftmost, .. } = tree.snapshot(tree.root_page_id()).unwrap()
        else {
            panic!("root should be internal");
        };
        {
            let mut guard = tree.pool().fetch_page_write(leftmost).unwrap();
            let mut leaf = crate::index::btree::node::LeafNode::view(guard.as_mut_slice()).unwrap();
            leaf.set_next(PageId::INVALID);
        }

        assert!(matches!(tree.verify(), Err(Error::TreeInvariant(_))));
    }
}
