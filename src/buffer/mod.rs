//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between the B+ tree and
//! the page store. It manages a fixed pool of frames, each holding one
//! page.
//!
//! # Components
//! - [`BufferPool`] - The main page cache
//! - [`Frame`] - A slot in the buffer pool holding a page + metadata
//! - [`PageIndex`] - Resident page to frame mapping
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards for page access
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod buffer_pool;
mod frame;
mod page_guard;
mod page_index;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use page_index::PageIndex;
pub use stats::{BufferPoolStats, StatsSnapshot};
