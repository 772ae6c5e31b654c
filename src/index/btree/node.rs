//! Typed views over B+ tree node pages.
//!
//! # Layout
//! ```text
//! ┌────────────┬───────────┬──────────┬──────────┬─────┬─────────────────┐
//! │ PageHeader │ count u16 │ link A   │ link B   │ pad │ entries ...     │
//! │ 0..5       │ 5..7      │ 7..11    │ 11..15   │ 15  │ 16..            │
//! └────────────┴───────────┴──────────┴──────────┴─────┴─────────────────┘
//! ```
//! Leaves use link A / link B as `prev` / `next`; internal nodes keep their
//! leftmost child in link A and leave link B unused.
//!
//! Entries are packed little-endian and kept sorted by key:
//! - [`LeafEntry`]: `key i32 | RecordId` (10 bytes)
//! - [`IndexEntry`]: `key i32 | child PageId` (8 bytes)

use std::fmt;
use std::marker::PhantomData;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, Key, PageId, RecordId, Result};
use crate::storage::page::{PageHeader, PageType};

const OFFSET_COUNT: usize = PageHeader::SIZE;
const OFFSET_LINK_A: usize = OFFSET_COUNT + 2;
const OFFSET_LINK_B: usize = OFFSET_LINK_A + PageId::SIZE;
const ENTRIES_START: usize = 16;

/// A fixed-size record stored in a node's entry array.
pub trait Entry: Copy + fmt::Debug {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Page type of nodes holding this entry kind.
    const PAGE_TYPE: PageType;

    /// Sort key.
    fn key(&self) -> Key;

    /// Decode from the first `SIZE` bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Encode into the first `SIZE` bytes.
    fn encode(&self, out: &mut [u8]);
}

/// Leaf payload: a key and the record it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    pub key: Key,
    pub rid: RecordId,
}

impl LeafEntry {
    pub fn new(key: Key, rid: RecordId) -> Self {
        Self { key, rid }
    }
}

impl Entry for LeafEntry {
    const SIZE: usize = 4 + RecordId::SIZE;
    const PAGE_TYPE: PageType = PageType::BTreeLeaf;

    #[inline]
    fn key(&self) -> Key {
        self.key
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            key: Key::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            rid: RecordId::from_le_bytes(&bytes[4..]),
        }
    }

    fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.key.to_le_bytes());
        self.rid.write_le_bytes(&mut out[4..]);
    }
}

/// Internal payload: a separator key and the child holding keys `>= key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Key,
    pub child: PageId,
}

impl IndexEntry {
    pub fn new(key: Key, child: PageId) -> Self {
        Self { key, child }
    }
}

impl Entry for IndexEntry {
    const SIZE: usize = 4 + PageId::SIZE;
    const PAGE_TYPE: PageType = PageType::BTreeInternal;

    #[inline]
    fn key(&self) -> Key {
        self.key
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            key: Key::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            child: PageId::from_le_bytes(&bytes[4..]),
        }
    }

    fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.key.to_le_bytes());
        self.child.write_le_bytes(&mut out[4..]);
    }
}

/// Node of any kind, interpreted over borrowed page bytes.
///
/// `B` is `&[u8]` for a read-only view or `&mut [u8]` for a mutable one.
pub struct Node<B, E> {
    data: B,
    _entry: PhantomData<E>,
}

/// Leaf node view.
pub type LeafNode<B> = Node<B, LeafEntry>;

/// Internal node view.
pub type InternalNode<B> = Node<B, IndexEntry>;

/// Largest number of entries of kind `E` a page holds.
pub const fn node_capacity(entry_size: usize) -> usize {
    (PAGE_SIZE - ENTRIES_START) / entry_size
}

impl<B: AsRef<[u8]>, E: Entry> Node<B, E> {
    /// Interpret `data` as a node of this kind.
    ///
    /// # Errors
    /// `Error::WrongPageType` if the header names another page type.
    pub fn view(data: B) -> Result<Self> {
        let found = PageType::from_u8(data.as_ref()[PageHeader::OFFSET_PAGE_TYPE]);
        if found != E::PAGE_TYPE {
            return Err(Error::WrongPageType {
                expected: E::PAGE_TYPE,
                found,
            });
        }
        Ok(Self {
            data,
            _entry: PhantomData,
        })
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    #[inline]
    fn link(&self, offset: usize) -> PageId {
        PageId::from_le_bytes(&self.bytes()[offset..])
    }

    #[inline]
    fn offset_of(slot: usize) -> usize {
        ENTRIES_START + slot * E::SIZE
    }

    /// Number of entries in the node.
    #[inline]
    pub fn len(&self) -> usize {
        u16::from_le_bytes([self.bytes()[OFFSET_COUNT], self.bytes()[OFFSET_COUNT + 1]]) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most entries the page can physically hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        node_capacity(E::SIZE)
    }

    /// Entry at `slot`.
    ///
    /// # Errors
    /// `Error::InvalidSlot` if `slot >= len()`.
    pub fn entry(&self, slot: usize) -> Result<E> {
        let len = self.len();
        if slot >= len {
            return Err(Error::InvalidSlot { slot, len });
        }
        let offset = Self::offset_of(slot);
        Ok(E::decode(&self.bytes()[offset..offset + E::SIZE]))
    }

    /// Key at `slot`.
    pub fn key_at(&self, slot: usize) -> Result<Key> {
        self.entry(slot).map(|e| e.key())
    }

    /// All entries, in key order.
    pub fn entries(&self) -> Vec<E> {
        let bytes = self.bytes();
        (0..self.len())
            .map(|slot| {
                let offset = Self::offset_of(slot);
                E::decode(&bytes[offset..offset + E::SIZE])
            })
            .collect()
    }

    /// Key of the first entry.
    ///
    /// # Errors
    /// `Error::EmptyEntry` if the node has no entries.
    pub fn first_key(&self) -> Result<Key> {
        if self.is_empty() {
            return Err(Error::EmptyEntry);
        }
        self.key_at(0)
    }

    /// Binary search for `key`: `Ok(slot)` on a match, otherwise
    /// `Err(slot)` where it would be inserted.
    pub fn search(&self, key: Key) -> std::result::Result<usize, usize> {
        let bytes = self.bytes();
        let key_at = |slot: usize| {
            let offset = Self::offset_of(slot);
            Key::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };

        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match key_at(mid).cmp(&key) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }

    /// First slot whose key is `>= key` (may equal `len()`).
    pub fn lower_bound(&self, key: Key) -> usize {
        match self.search(key) {
            Ok(slot) | Err(slot) => slot,
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, E: Entry> Node<B, E> {
    /// Format `data` as an empty node of this kind with both links unset.
    pub fn init(mut data: B) -> Self {
        let bytes = data.as_mut();
        PageHeader::new(E::PAGE_TYPE).write_to(bytes);
        bytes[OFFSET_COUNT..OFFSET_COUNT + 2].copy_from_slice(&0u16.to_le_bytes());
        PageId::INVALID.write_le_bytes(&mut bytes[OFFSET_LINK_A..]);
        PageId::INVALID.write_le_bytes(&mut bytes[OFFSET_LINK_B..]);
        Self {
            data,
            _entry: PhantomData,
        }
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    #[inline]
    fn set_link(&mut self, offset: usize, page_id: PageId) {
        page_id.write_le_bytes(&mut self.bytes_mut()[offset..]);
    }

    fn set_len(&mut self, len: usize) {
        self.bytes_mut()[OFFSET_COUNT..OFFSET_COUNT + 2]
            .copy_from_slice(&(len as u16).to_le_bytes());
    }

    fn write_entry(&mut self, slot: usize, entry: &E) {
        let offset = Self::offset_of(slot);
        entry.encode(&mut self.bytes_mut()[offset..offset + E::SIZE]);
    }

    /// Insert `entry` at its sorted position and return the slot.
    ///
    /// # Errors
    /// - `Error::DuplicateKey` if the key is already present
    /// - `Error::InvalidSlot` if the page is physically full
    pub fn insert(&mut self, entry: E) -> Result<usize> {
        match self.search(entry.key()) {
            Ok(_) => Err(Error::DuplicateKey(entry.key())),
            Err(slot) => {
                self.insert_at(slot, entry)?;
                Ok(slot)
            }
        }
    }

    /// Insert `entry` at `slot`, shifting later entries right.
    ///
    /// The caller keeps the key order intact.
    pub fn insert_at(&mut self, slot: usize, entry: E) -> Result<()> {
        let len = self.len();
        if slot > len || len >= self.capacity() {
            return Err(Error::InvalidSlot { slot, len });
        }
        let start = Self::offset_of(slot);
        let end = Self::offset_of(len);
        self.bytes_mut().copy_within(start..end, start + E::SIZE);
        self.write_entry(slot, &entry);
        self.set_len(len + 1);
        Ok(())
    }

    /// Remove and return the entry at `slot`, shifting later entries left.
    pub fn remove(&mut self, slot: usize) -> Result<E> {
        let entry = self.entry(slot)?;
        let len = self.len();
        let start = Self::offset_of(slot + 1);
        let end = Self::offset_of(len);
        self.bytes_mut().copy_within(start..end, start - E::SIZE);
        self.set_len(len - 1);
        Ok(entry)
    }

    /// Overwrite the entry at `slot`.
    pub fn set_entry(&mut self, slot: usize, entry: E) -> Result<()> {
        let len = self.len();
        if slot >= len {
            return Err(Error::InvalidSlot { slot, len });
        }
        self.write_entry(slot, &entry);
        Ok(())
    }

    /// Replace the key at `slot`, keeping its payload.
    pub fn set_key(&mut self, slot: usize, key: Key) -> Result<()> {
        self.entry(slot)?;
        let offset = Self::offset_of(slot);
        self.bytes_mut()[offset..offset + 4].copy_from_slice(&key.to_le_bytes());
        Ok(())
    }

    /// Replace the whole entry array with `entries` (already sorted).
    pub fn replace_all(&mut self, entries: &[E]) -> Result<()> {
        if entries.len() > self.capacity() {
            return Err(Error::InvalidSlot {
                slot: entries.len(),
                len: self.capacity(),
            });
        }
        for (slot, entry) in entries.iter().enumerate() {
            self.write_entry(slot, entry);
        }
        self.set_len(entries.len());
        Ok(())
    }
}

// ============================================================================
// Leaf links
// ============================================================================

impl<B: AsRef<[u8]>> Node<B, LeafEntry> {
    /// Left sibling, or `PageId::INVALID` for the leftmost leaf.
    #[inline]
    pub fn prev(&self) -> PageId {
        self.link(OFFSET_LINK_A)
    }

    /// Right sibling, or `PageId::INVALID` for the rightmost leaf.
    #[inline]
    pub fn next(&self) -> PageId {
        self.link(OFFSET_LINK_B)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Node<B, LeafEntry> {
    #[inline]
    pub fn set_prev(&mut self, page_id: PageId) {
        self.set_link(OFFSET_LINK_A, page_id);
    }

    #[inline]
    pub fn set_next(&mut self, page_id: PageId) {
        self.set_link(OFFSET_LINK_B, page_id);
    }
}

// ============================================================================
// Internal children
// ============================================================================

impl<B: AsRef<[u8]>> Node<B, IndexEntry> {
    /// Child holding keys below the first separator.
    #[inline]
    pub fn leftmost(&self) -> PageId {
        self.link(OFFSET_LINK_A)
    }

    /// Number of children (`len() + 1`).
    #[inline]
    pub fn child_count(&self) -> usize {
        self.len() + 1
    }

    /// Child at position `pos`, where position 0 is the leftmost child and
    /// position `i > 0` is the child of entry `i - 1`.
    pub fn child_at(&self, pos: usize) -> Result<PageId> {
        if pos == 0 {
            Ok(self.leftmost())
        } else {
            self.entry(pos - 1).map(|e| e.child)
        }
    }

    /// Position of the child whose subtree covers `key`.
    pub fn child_pos_for(&self, key: Key) -> usize {
        match self.search(key) {
            Ok(slot) => slot + 1,
            Err(slot) => slot,
        }
    }

    /// Child whose subtree covers `key`.
    pub fn child_for(&self, key: Key) -> Result<PageId> {
        self.child_at(self.child_pos_for(key))
    }

    /// Position of `child` among this node's children.
    pub fn position_of(&self, child: PageId) -> Option<usize> {
        if self.leftmost() == child {
            return Some(0);
        }
        self.entries()
            .iter()
            .position(|e| e.child == child)
            .map(|slot| slot + 1)
    }

    /// Every child, leftmost first.
    pub fn children(&self) -> Vec<PageId> {
        std::iter::once(self.leftmost())
            .chain(self.entries().into_iter().map(|e| e.child))
            .collect()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Node<B, IndexEntry> {
    #[inline]
    pub fn set_leftmost(&mut self, page_id: PageId) {
        self.set_link(OFFSET_LINK_A, page_id);
    }
}

/// Page type of raw node bytes.
pub fn node_type(data: &[u8]) -> PageType {
    PageType::from_u8(data[PageHeader::OFFSET_PAGE_TYPE])
}
