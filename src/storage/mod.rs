//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`PageStore`] - The interface the buffer pool consumes
//! - [`DiskManager`] - Single-file implementation of [`PageStore`]
//! - [`page`] - Page types and layouts

mod directory;
mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;

use crate::common::{PageId, Result};
use page::Page;

/// Durable fixed-size page storage plus the index-name registry.
///
/// The buffer pool is the only caller of the page operations. The
/// registry maps an index name to its root page and is consulted when an
/// index is created, opened, closed or destroyed.
pub trait PageStore: Send {
    /// Allocate `count` contiguous pages and return the first id.
    ///
    /// Fails with `Error::StoreFull` when the ids would run past the
    /// largest addressable page.
    fn allocate_page(&mut self, count: u32) -> Result<PageId>;

    /// Return a page to the store for reuse.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;

    /// Read a page into `page`.
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Write `page` to its slot on disk.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// Make all completed writes durable.
    fn sync(&mut self) -> Result<()>;

    /// Pages currently handed out to callers and not yet deallocated.
    fn live_page_count(&self) -> usize;

    /// Root page registered under `name`, if any.
    fn file_entry(&self, name: &str) -> Option<PageId>;

    /// Register a new index name.
    fn add_file_entry(&mut self, name: &str, root: PageId) -> Result<()>;

    /// Point an existing index name at a new root.
    fn set_file_entry(&mut self, name: &str, root: PageId) -> Result<()>;

    /// Remove an index name from the registry.
    fn delete_file_entry(&mut self, name: &str) -> Result<()>;
}
