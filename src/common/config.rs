//! Configuration constants.

/// Size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems, so a page is also the unit
/// of I/O between the buffer pool and the database file.
///
/// # Memory Layout
/// With 4KB pages and 32-bit PageIds:
/// - Max pages: 2^32 - 1 (`u32::MAX` is reserved for `PageId::INVALID`)
/// - Max database size: just under 16TB
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of addressable pages (`PageId::INVALID` excluded).
pub const MAX_PAGES: u64 = u32::MAX as u64;

/// Number of frames a buffer pool gets when the caller has no preference.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Default minimum fanout of a B+ tree node.
///
/// Non-root nodes hold between `order` and `2 * order` entries.
pub const DEFAULT_TREE_ORDER: usize = 2;

/// Longest index name the file-entry registry accepts, in bytes.
pub const MAX_FILE_NAME_LEN: usize = 64;
