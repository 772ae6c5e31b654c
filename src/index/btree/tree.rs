//! The B+ tree engine: create/open, search, insert, delete.
//!
//! Every operation descends from the root holding at most the current
//! node pinned; a parent is re-pinned after its child's recursive call
//! returns. Structural change travels back up as a [`Change`].

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::buffer::BufferPool;
use crate::common::{Error, Key, PageId, RecordId, Result};
use crate::storage::page::PageType;

use super::node::{node_type, IndexEntry, InternalNode, LeafEntry, LeafNode};
use super::scan::ScanCursor;
use super::BTreeConfig;

/// Outcome of a recursive insert or delete at one node, as seen by its
/// parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    /// Nothing for the parent to do.
    Unchanged,
    /// The child split; the parent must insert `(split_key, page_id)`.
    Promoted { split_key: Key, page_id: PageId },
    /// A child was merged away; the parent must drop separator `key`.
    Discarded { key: Key },
}

/// Contents of one node, copied out so the page can be unpinned.
#[derive(Debug, Clone)]
pub(crate) enum NodeSnapshot {
    Leaf {
        entries: Vec<LeafEntry>,
        prev: PageId,
        next: PageId,
    },
    Internal {
        leftmost: PageId,
        entries: Vec<IndexEntry>,
    },
}

/// A disk-resident B+ tree mapping unique `i32` keys to record ids.
///
/// The tree owns its root page id; the name → root mapping is persisted
/// in the page store's registry on [`close`](Self::close) (or, best
/// effort, on drop).
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use pagetree::{BTreeConfig, BTreeIndex, BufferPool, DiskManager, PageId, RecordId};
///
/// let dm = DiskManager::create("index.db").unwrap();
/// let pool = Arc::new(BufferPool::new(64, dm));
/// let mut tree = BTreeIndex::create(pool, "orders", BTreeConfig::default()).unwrap();
///
/// tree.insert(42, RecordId::new(PageId::new(7), 3)).unwrap();
/// assert_eq!(tree.search(42).unwrap(), Some(RecordId::new(PageId::new(7), 3)));
/// tree.close().unwrap();
/// ```
pub struct BTreeIndex {
    pool: Arc<BufferPool>,
    name: String,
    root: PageId,
    config: BTreeConfig,
    /// Registry already up to date; skip the write-back in `Drop`.
    closed: bool,
}

impl BTreeIndex {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a new index with an empty leaf as root and register it
    /// under `name`.
    ///
    /// # Errors
    /// - `Error::InvalidOrder` if the order does not fit a page
    /// - `Error::FileEntryExists` if `name` is taken
    /// - buffer pool errors while allocating the root
    pub fn create(pool: Arc<BufferPool>, name: &str, config: BTreeConfig) -> Result<Self> {
        config.validate()?;
        if pool.file_entry(name).is_some() {
            return Err(Error::FileEntryExists(name.to_string()));
        }

        let root = {
            let mut guard = pool.new_page(1)?;
            LeafNode::init(guard.as_mut_slice());
            guard.page_id()
        };

        if let Err(err) = pool.add_file_entry(name, root) {
            if let Err(free_err) = pool.free_page(root) {
                warn!(page = root.0, error = %free_err, "could not release root of failed index");
            }
            return Err(err);
        }

        debug!(name, root = root.0, order = config.order, "created index");
        Ok(Self {
            pool,
            name: name.to_string(),
            root,
            config,
            closed: false,
        })
    }

    /// Open the index registered under `name`.
    ///
    /// # Errors
    /// - `Error::InvalidOrder` if the order does not fit a page
    /// - `Error::FileEntryNotFound` if no such index exists
    /// - `Error::WrongPageType` if the registered root is not a tree node
    pub fn open(pool: Arc<BufferPool>, name: &str, config: BTreeConfig) -> Result<Self> {
        config.validate()?;
        let root = pool
            .file_entry(name)
            .ok_or_else(|| Error::FileEntryNotFound(name.to_string()))?;

        {
            let guard = pool.fetch_page_read(root)?;
            let found = node_type(guard.as_slice());
            if found != PageType::BTreeLeaf && found != PageType::BTreeInternal {
                return Err(Error::WrongPageType {
                    expected: PageType::BTreeLeaf,
                    found,
                });
            }
        }

        debug!(name, root = root.0, "opened index");
        Ok(Self {
            pool,
            name: name.to_string(),
            root,
            config,
            closed: false,
        })
    }

    /// Open `name` if registered, otherwise create it.
    pub fn open_or_create(pool: Arc<BufferPool>, name: &str, config: BTreeConfig) -> Result<Self> {
        if pool.file_entry(name).is_some() {
            Self::open(pool, name, config)
        } else {
            Self::create(pool, name, config)
        }
    }

    /// Persist the root in the registry and flush the pool.
    ///
    /// # Errors
    /// Registry errors, or flush errors (including `Error::FlushIncomplete`
    /// when other pages are still pinned).
    pub fn close(mut self) -> Result<()> {
        self.pool.set_file_entry(&self.name, self.root)?;
        self.closed = true;
        self.pool.flush_all_pages()?;
        debug!(name = %self.name, root = self.root.0, "closed index");
        Ok(())
    }

    /// Free every page of the tree and remove its registry entry.
    pub fn destroy(mut self) -> Result<()> {
        let mut pages = Vec::new();
        self.collect_pages(self.root, &mut pages)?;
        for page_id in &pages {
            self.pool.free_page(*page_id)?;
        }
        self.pool.delete_file_entry(&self.name)?;
        self.closed = true;
        debug!(name = %self.name, pages = pages.len(), "destroyed index");
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current root page.
    #[inline]
    pub fn root_page_id(&self) -> PageId {
        self.root
    }

    /// Name the index is registered under.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn config(&self) -> BTreeConfig {
        self.config
    }

    /// The buffer pool backing this index.
    #[inline]
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    // ========================================================================
    // Search and scan
    // ========================================================================

    /// Record id stored under `key`, if any.
    pub fn search(&self, key: Key) -> Result<Option<RecordId>> {
        let leaf_id = self.find_leaf(Some(key))?;
        let guard = self.pool.fetch_page_read(leaf_id)?;
        let leaf = LeafNode::view(guard.as_slice())?;
        match leaf.search(key) {
            Ok(slot) => Ok(Some(leaf.entry(slot)?.rid)),
            Err(_) => Ok(None),
        }
    }

    /// Open a cursor over keys in `[low, high]`; `None` leaves that side
    /// unbounded.
    ///
    /// The cursor borrows the index, so the tree cannot be modified while
    /// it is alive.
    pub fn open_scan(&self, low: Option<Key>, high: Option<Key>) -> Result<ScanCursor<'_>> {
        let leaf_id = self.find_leaf(low)?;
        ScanCursor::open(&self.pool, leaf_id, low, high)
    }

    /// Descend to the leaf covering `key`, or the leftmost leaf for `None`.
    fn find_leaf(&self, key: Option<Key>) -> Result<PageId> {
        let mut page_id = self.root;
        loop {
            let guard = self.pool.fetch_page_read(page_id)?;
            match node_type(guard.as_slice()) {
                PageType::BTreeLeaf => return Ok(page_id),
                PageType::BTreeInternal => {
                    let node = InternalNode::view(guard.as_slice())?;
                    page_id = match key {
                        Some(key) => node.child_for(key)?,
                        None => node.leftmost(),
                    };
                }
                found => {
                    return Err(Error::WrongPageType {
                        expected: PageType::BTreeInternal,
                        found,
                    })
                }
            }
        }
    }

    /// Child of `page_id` covering `key`, or `None` if `page_id` is a leaf.
    fn route(&self, page_id: PageId, key: Key) -> Result<Option<PageId>> {
        let guard = self.pool.fetch_page_read(page_id)?;
        match node_type(guard.as_slice()) {
            PageType::BTreeLeaf => Ok(None),
            PageType::BTreeInternal => InternalNode::view(guard.as_slice())?
                .child_for(key)
                .map(Some),
            found => Err(Error::WrongPageType {
                expected: PageType::BTreeInternal,
                found,
            }),
        }
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert `key → rid`.
    ///
    /// # Errors
    /// - `Error::DuplicateKey` if `key` is already present (tree unchanged)
    /// - `Error::PoolExhausted` if a split cannot get a frame
    pub fn insert(&mut self, key: Key, rid: RecordId) -> Result<()> {
        let change = self.insert_into(self.root, LeafEntry::new(key, rid))?;

        if let Change::Promoted { split_key, page_id } = change {
            let old_root = self.root;
            let new_root = {
                let mut guard = self.pool.new_page(1)?;
                let mut root = InternalNode::init(guard.as_mut_slice());
                root.set_leftmost(old_root);
                root.insert_at(0, IndexEntry::new(split_key, page_id))?;
                guard.page_id()
            };
            self.root = new_root;
            trace!(old_root = old_root.0, new_root = new_root.0, split_key, "root split");
        }
        Ok(())
    }

    fn insert_into(&self, page_id: PageId, entry: LeafEntry) -> Result<Change> {
        let Some(child) = self.route(page_id, entry.key)? else {
            return self.insert_into_leaf(page_id, entry);
        };

        match self.insert_into(child, entry)? {
            Change::Promoted { split_key, page_id: sibling } => {
                self.insert_into_internal(page_id, IndexEntry::new(split_key, sibling))
            }
            other => Ok(other),
        }
    }

    fn insert_into_leaf(&self, page_id: PageId, entry: LeafEntry) -> Result<Change> {
        let mut guard = self.pool.fetch_page_write(page_id)?;

        let (slot, split) = {
            let leaf = LeafNode::view(guard.as_slice())?;
            let slot = match leaf.search(entry.key) {
                Ok(_) => return Err(Error::DuplicateKey(entry.key)),
                Err(slot) => slot,
            };
            if leaf.len() < self.config.max_entries() {
                (slot, None)
            } else {
                (slot, Some((leaf.entries(), leaf.next())))
            }
        };

        let Some((mut entries, old_next)) = split else {
            LeafNode::view(guard.as_mut_slice())?.insert_at(slot, entry)?;
            return Ok(Change::Unchanged);
        };

        // Secure every page the split touches before changing any of them.
        let mut next_guard = if old_next.is_valid() {
            Some(self.pool.fetch_page_write(old_next)?)
        } else {
            None
        };
        let mut new_guard = self.pool.new_page(1)?;
        let new_id = new_guard.page_id();

        entries.insert(slot, entry);
        let upper = entries.split_off(self.config.order);
        let split_key = upper[0].key;

        {
            let mut leaf = LeafNode::view(guard.as_mut_slice())?;
            leaf.replace_all(&entries)?;
            leaf.set_next(new_id);
        }
        {
            let mut sibling = LeafNode::init(new_guard.as_mut_slice());
            sibling.replace_all(&upper)?;
            sibling.set_prev(page_id);
            sibling.set_next(old_next);
        }
        if let Some(next_guard) = next_guard.as_mut() {
            LeafNode::view(next_guard.as_mut_slice())?.set_prev(new_id);
        }

        trace!(leaf = page_id.0, sibling = new_id.0, split_key, "leaf split");
        Ok(Change::Promoted {
            split_key,
            page_id: new_id,
        })
    }

    fn insert_into_internal(&self, page_id: PageId, entry: IndexEntry) -> Result<Change> {
        let mut guard = self.pool.fetch_page_write(page_id)?;

        let (slot, full) = {
            let node = InternalNode::view(guard.as_slice())?;
            (
                node.lower_bound(entry.key),
                node.len() >= self.config.max_entries(),
            )
        };

        if !full {
            InternalNode::view(guard.as_mut_slice())?.insert_at(slot, entry)?;
            return Ok(Change::Unchanged);
        }

        let mut new_guard = self.pool.new_page(1)?;
        let new_id = new_guard.page_id();

        let mut entries = InternalNode::view(guard.as_slice())?.entries();
        entries.insert(slot, entry);
        let upper = entries.split_off(self.config.order + 1);
        let middle = entries[self.config.order];
        entries.truncate(self.config.order);

        InternalNode::view(guard.as_mut_slice())?.replace_all(&entries)?;
        {
            let mut sibling = InternalNode::init(new_guard.as_mut_slice());
            sibling.set_leftmost(middle.child);
            sibling.replace_all(&upper)?;
        }

        trace!(node = page_id.0, sibling = new_id.0, split_key = middle.key, "internal split");
        Ok(Change::Promoted {
            split_key: middle.key,
            page_id: new_id,
        })
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Remove the entry `key → rid`.
    ///
    /// A removal that would leave a non-root node under-full first pins
    /// the parent and both siblings; a failure to pin any of them leaves
    /// the tree untouched.
    ///
    /// # Errors
    /// - `Error::KeyNotFound` if no entry matches both key and record id
    /// - `Error::PoolExhausted` if rebalancing cannot get a frame
    pub fn delete(&mut self, key: Key, rid: RecordId) -> Result<()> {
        self.delete_from(self.root, None, key, rid)?;
        self.collapse_root()
    }

    fn delete_from(
        &self,
        page_id: PageId,
        parent: Option<PageId>,
        key: Key,
        rid: RecordId,
    ) -> Result<Change> {
        let Some(child) = self.route(page_id, key)? else {
            return self.delete_from_leaf(page_id, parent, key, rid);
        };

        let Change::Discarded { key: separator } =
            self.delete_from(child, Some(page_id), key, rid)?
        else {
            return Ok(Change::Unchanged);
        };

        if let Some(parent) = parent {
            let len = InternalNode::view(self.pool.fetch_page_read(page_id)?.as_slice())?.len();
            if len <= self.config.order {
                return self.rebalance_internal(parent, page_id, separator);
            }
        }

        let mut guard = self.pool.fetch_page_write(page_id)?;
        let mut node = InternalNode::view(guard.as_mut_slice())?;
        let slot = Self::separator_slot(&node, page_id, separator)?;
        node.remove(slot)?;
        Ok(Change::Unchanged)
    }

    fn delete_from_leaf(
        &self,
        page_id: PageId,
        parent: Option<PageId>,
        key: Key,
        rid: RecordId,
    ) -> Result<Change> {
        let mut guard = self.pool.fetch_page_write(page_id)?;
        let (slot, len) = {
            let leaf = LeafNode::view(guard.as_slice())?;
            match leaf.search(key) {
                Ok(slot) if leaf.entry(slot)?.rid == rid => (slot, leaf.len()),
                _ => return Err(Error::KeyNotFound { key, rid }),
            }
        };

        match parent {
            Some(parent) if len <= self.config.order => {
                // Unmodified; the rebalance re-pins it with its siblings.
                drop(guard);
                self.rebalance_leaf(parent, page_id, slot)
            }
            _ => {
                LeafNode::view(guard.as_mut_slice())?.remove(slot)?;
                Ok(Change::Unchanged)
            }
        }
    }

    fn separator_slot<B: AsRef<[u8]>>(
        node: &InternalNode<B>,
        page_id: PageId,
        separator: Key,
    ) -> Result<usize> {
        node.search(separator).map_err(|_| {
            Error::TreeInvariant(format!("separator {separator} missing from {page_id}"))
        })
    }

    /// Neighbours around the separator next to `page_id` in `parent`:
    /// `(left, right, separator_slot)`.
    ///
    /// The leftmost child pairs with its right sibling, every other child
    /// with its left sibling.
    fn sibling_pair(
        parent: &InternalNode<&[u8]>,
        parent_id: PageId,
        page_id: PageId,
    ) -> Result<(PageId, PageId, usize)> {
        let pos = parent.position_of(page_id).ok_or_else(|| {
            Error::TreeInvariant(format!("{page_id} is not a child of {parent_id}"))
        })?;
        if pos == 0 {
            Ok((page_id, parent.child_at(1)?, 0))
        } else {
            Ok((parent.child_at(pos - 1)?, page_id, pos - 1))
        }
    }

    /// Remove `slot` from leaf `page_id` and restore its fill with a
    /// sibling.
    ///
    /// Nothing is written until the parent, both siblings and (for a
    /// merge) the right sibling's successor are pinned.
    fn rebalance_leaf(&self, parent_id: PageId, page_id: PageId, slot: usize) -> Result<Change> {
        let mut parent = self.pool.fetch_page_write(parent_id)?;
        let (left_id, right_id, sep_slot) = Self::sibling_pair(
            &InternalNode::view(parent.as_slice())?,
            parent_id,
            page_id,
        )?;
        let mut left = self.pool.fetch_page_write(left_id)?;
        let mut right = self.pool.fetch_page_write(right_id)?;

        let sibling_len = if page_id == left_id {
            LeafNode::view(right.as_slice())?.len()
        } else {
            LeafNode::view(left.as_slice())?.len()
        };

        if sibling_len > self.config.order {
            let separator = if page_id == left_id {
                LeafNode::view(left.as_mut_slice())?.remove(slot)?;
                let mut right_node = LeafNode::view(right.as_mut_slice())?;
                let moved = right_node.remove(0)?;
                let separator = right_node.first_key()?;
                let mut left_node = LeafNode::view(left.as_mut_slice())?;
                let end = left_node.len();
                left_node.insert_at(end, moved)?;
                separator
            } else {
                let mut right_node = LeafNode::view(right.as_mut_slice())?;
                right_node.remove(slot)?;
                let mut left_node = LeafNode::view(left.as_mut_slice())?;
                let last = left_node.len() - 1;
                let moved = left_node.remove(last)?;
                LeafNode::view(right.as_mut_slice())?.insert_at(0, moved)?;
                moved.key
            };
            InternalNode::view(parent.as_mut_slice())?.set_key(sep_slot, separator)?;

            trace!(left = left_id.0, right = right_id.0, separator, "leaf redistribute");
            return Ok(Change::Unchanged);
        }

        // The parent only loses the separator, which its own level does.
        let separator = InternalNode::view(parent.as_slice())?.key_at(sep_slot)?;
        drop(parent);

        let right_next = LeafNode::view(right.as_slice())?.next();
        let mut next_guard = if right_next.is_valid() {
            Some(self.pool.fetch_page_write(right_next)?)
        } else {
            None
        };

        let target = if page_id == left_id { &mut left } else { &mut right };
        LeafNode::view(target.as_mut_slice())?.remove(slot)?;

        {
            let moved = LeafNode::view(right.as_slice())?.entries();
            let mut left_node = LeafNode::view(left.as_mut_slice())?;
            let mut merged = left_node.entries();
            merged.extend(moved);
            left_node.replace_all(&merged)?;
            left_node.set_next(right_next);
        }
        if let Some(next_guard) = next_guard.as_mut() {
            LeafNode::view(next_guard.as_mut_slice())?.set_prev(left_id);
        }
        drop(next_guard);
        drop(left);
        right.free()?;

        trace!(left = left_id.0, right = right_id.0, separator, "leaf merge");
        Ok(Change::Discarded { key: separator })
    }

    /// Remove `removed` from internal node `page_id` and restore its fill
    /// by rotating through, or merging across, the parent separator.
    fn rebalance_internal(
        &self,
        parent_id: PageId,
        page_id: PageId,
        removed: Key,
    ) -> Result<Change> {
        let mut parent = self.pool.fetch_page_write(parent_id)?;
        let (left_id, right_id, sep_slot) = Self::sibling_pair(
            &InternalNode::view(parent.as_slice())?,
            parent_id,
            page_id,
        )?;
        let separator = InternalNode::view(parent.as_slice())?.key_at(sep_slot)?;
        let mut left = self.pool.fetch_page_write(left_id)?;
        let mut right = self.pool.fetch_page_write(right_id)?;

        let (sibling_len, slot) = if page_id == left_id {
            let slot = Self::separator_slot(&InternalNode::view(left.as_slice())?, page_id, removed)?;
            (InternalNode::view(right.as_slice())?.len(), slot)
        } else {
            let slot = Self::separator_slot(&InternalNode::view(right.as_slice())?, page_id, removed)?;
            (InternalNode::view(left.as_slice())?.len(), slot)
        };

        let target = if page_id == left_id { &mut left } else { &mut right };
        InternalNode::view(target.as_mut_slice())?.remove(slot)?;

        if sibling_len > self.config.order {
            // Rotate one entry through the parent.
            let new_separator = if page_id == left_id {
                let mut right_node = InternalNode::view(right.as_mut_slice())?;
                let first = right_node.remove(0)?;
                let pulled = IndexEntry::new(separator, right_node.leftmost());
                right_node.set_leftmost(first.child);
                let mut left_node = InternalNode::view(left.as_mut_slice())?;
                let end = left_node.len();
                left_node.insert_at(end, pulled)?;
                first.key
            } else {
                let mut left_node = InternalNode::view(left.as_mut_slice())?;
                let last_slot = left_node.len() - 1;
                let last = left_node.remove(last_slot)?;
                let mut right_node = InternalNode::view(right.as_mut_slice())?;
                let pulled = IndexEntry::new(separator, right_node.leftmost());
                right_node.insert_at(0, pulled)?;
                right_node.set_leftmost(last.child);
                last.key
            };
            InternalNode::view(parent.as_mut_slice())?.set_key(sep_slot, new_separator)?;

            trace!(left = left_id.0, right = right_id.0, separator = new_separator, "internal redistribute");
            return Ok(Change::Unchanged);
        }

        drop(parent);
        {
            let right_node = InternalNode::view(right.as_slice())?;
            let mut merged = InternalNode::view(left.as_slice())?.entries();
            merged.push(IndexEntry::new(separator, right_node.leftmost()));
            merged.extend(right_node.entries());
            InternalNode::view(left.as_mut_slice())?.replace_all(&merged)?;
        }
        drop(left);
        right.free()?;

        trace!(left = left_id.0, right = right_id.0, separator, "internal merge");
        Ok(Change::Discarded { key: separator })
    }

    /// Replace an internal root left with no entries by its only child.
    fn collapse_root(&mut self) -> Result<()> {
        let old_root = self.root;
        let new_root = {
            let guard = self.pool.fetch_page_write(old_root)?;
            if node_type(guard.as_slice()) != PageType::BTreeInternal {
                return Ok(());
            }
            let node = InternalNode::view(guard.as_slice())?;
            if !node.is_empty() {
                return Ok(());
            }
            let child = node.leftmost();
            guard.free()?;
            child
        };

        self.root = new_root;
        trace!(old_root = old_root.0, new_root = new_root.0, "root collapse");
        Ok(())
    }

    // ========================================================================
    // Walking
    // ========================================================================

    /// Copy out the contents of `page_id`, pinning it only for the copy.
    pub(crate) fn snapshot(&self, page_id: PageId) -> Result<NodeSnapshot> {
        let guard = self.pool.fetch_page_read(page_id)?;
        match node_type(guard.as_slice()) {
            PageType::BTreeLeaf => {
                let leaf = LeafNode::view(guard.as_slice())?;
                Ok(NodeSnapshot::Leaf {
                    entries: leaf.entries(),
                    prev: leaf.prev(),
                    next: leaf.next(),
                })
            }
            PageType::BTreeInternal => {
                let node = InternalNode::view(guard.as_slice())?;
                Ok(NodeSnapshot::Internal {
                    leftmost: node.leftmost(),
                    entries: node.entries(),
                })
            }
            found => Err(Error::WrongPageType {
                expected: PageType::BTreeLeaf,
                found,
            }),
        }
    }

    /// Every page of the subtree at `page_id`, children before parents.
    fn collect_pages(&self, page_id: PageId, out: &mut Vec<PageId>) -> Result<()> {
        if let NodeSnapshot::Internal { leftmost, entries } = self.snapshot(page_id)? {
            self.collect_pages(leftmost, out)?;
            for entry in entries {
                self.collect_pages(entry.child, out)?;
            }
        }
        out.push(page_id);
        Ok(())
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.pool.set_file_entry(&self.name, self.root) {
            warn!(name = %self.name, error = %err, "could not persist index root");
        }
    }
}
