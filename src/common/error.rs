//! Error types.

use thiserror::Error;

use super::{Key, PageId, RecordId};
use crate::storage::page::PageType;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the storage, buffer and index layers.
///
/// "No more data" is not an error: iteration ends with `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page was never allocated.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// The page id cannot be used for this operation (sentinel, directory
    /// page, or a page that is already free).
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    /// Stored checksum does not match the page contents.
    #[error("{0} failed checksum verification")]
    Corrupted(PageId),

    /// Every frame is pinned; nothing can be evicted.
    #[error("No evictable frame available in buffer pool")]
    PoolExhausted,

    /// The page is not resident in the buffer pool.
    ///
    /// Indicates a pin-discipline bug in the caller.
    #[error("{0} is not in the buffer pool")]
    NotInPool(PageId),

    /// Unpin of a page whose pin count is already zero.
    ///
    /// Indicates a pin-discipline bug in the caller.
    #[error("{0} is not pinned")]
    OverUnpin(PageId),

    /// Attempt to free a page that is pinned more than once.
    #[error("{page_id} is still pinned {pin_count} times")]
    StillPinned { page_id: PageId, pin_count: u32 },

    /// Attempt to flush a page while it is pinned.
    #[error("cannot flush {0} while it is pinned")]
    PagePinned(PageId),

    /// `flush_all_pages` wrote every unpinned frame but skipped pinned ones.
    #[error("flush skipped {0} pinned pages")]
    FlushIncomplete(usize),

    /// The page bytes are already borrowed in a conflicting mode.
    #[error("{0} is already latched")]
    PageLatched(PageId),

    /// Reading a page into a frame failed.
    #[error("failed to read {page_id} into the buffer pool")]
    FrameRead {
        page_id: PageId,
        #[source]
        source: Box<Error>,
    },

    /// Writing a frame back to disk failed.
    #[error("failed to write {page_id} back to disk")]
    FrameWrite {
        page_id: PageId,
        #[source]
        source: Box<Error>,
    },

    /// Entry position outside a node's entry sequence.
    #[error("slot {slot} out of range for node with {len} entries")]
    InvalidSlot { slot: usize, len: usize },

    /// Access to the first/last entry of an empty node.
    #[error("node has no entries")]
    EmptyEntry,

    /// Page bytes are not the expected node kind.
    #[error("expected {expected:?} page, found {found:?}")]
    WrongPageType { expected: PageType, found: PageType },

    /// Keys are unique; the key is already indexed.
    #[error("key {0} already exists")]
    DuplicateKey(Key),

    /// No leaf entry matches both key and record id.
    #[error("no entry for key {key} at {rid}")]
    KeyNotFound { key: Key, rid: RecordId },

    /// Tree order outside the range a page can hold.
    #[error("tree order {order} is outside 1..={max}")]
    InvalidOrder { order: usize, max: usize },

    /// An index with this name is already registered.
    #[error("index '{0}' already exists")]
    FileEntryExists(String),

    /// No index with this name is registered.
    #[error("index '{0}' not found")]
    FileEntryNotFound(String),

    /// Index name does not fit the registry.
    #[error("index name '{0}' is too long")]
    NameTooLong(String),

    /// The directory page has no room for another entry.
    #[error("directory page is full")]
    DirectoryFull,

    /// The page store cannot grow past the largest addressable page id.
    #[error("page store is full")]
    StoreFull,

    /// Structural check of the tree failed.
    #[error("tree invariant violated: {0}")]
    TreeInvariant(String),
}

impl Error {
    /// Wrap a page-store failure raised while loading a frame.
    pub(crate) fn frame_read(page_id: PageId, source: Error) -> Self {
        Error::FrameRead {
            page_id,
            source: Box::new(source),
        }
    }

    /// Wrap a page-store failure raised while writing a frame back.
    pub(crate) fn frame_write(page_id: PageId, source: Error) -> Self {
        Error::FrameWrite {
            page_id,
            source: Box::new(source),
        }
    }
}
