//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Allocating and deallocating pages
//! - The file-entry registry on the directory page

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::common::config::{MAX_PAGES, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::directory::Directory;
use crate::storage::page::{Page, PageHeader, PageType};
use crate::storage::PageStore;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌───────────┬─────────┬─────────┬─────────┬─────────┐
/// │  Page 0   │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ directory │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └───────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page 0 holds the index-name registry and is never handed out by
/// [`allocate_page`](PageStore::allocate_page). Deallocated pages are
/// stamped `PageType::Free` and reused by single-page allocations.
///
/// # Durability
/// Writes are not individually synced; call [`sync`](PageStore::sync)
/// (the buffer pool does on `flush_all_pages`).
pub struct DiskManager {
    file: File,
    /// Number of pages in the file, directory page included.
    page_count: u32,
    /// Deallocated pages available for reuse, lowest first.
    free_pages: BTreeSet<PageId>,
    directory: Directory,
}

impl DiskManager {
    /// Page id of the directory page.
    pub const DIRECTORY_PAGE: PageId = PageId(0);

    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut dm = Self {
            file,
            page_count: 1,
            free_pages: BTreeSet::new(),
            directory: Directory::default(),
        };
        dm.persist_directory()?;
        Ok(dm)
    }

    /// Open an existing database file.
    ///
    /// Rebuilds the free list by scanning page headers.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or its
    /// directory page is damaged.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;
        if page_count == 0 {
            return Err(Error::PageNotFound(Self::DIRECTORY_PAGE));
        }

        let mut dm = Self {
            file,
            page_count,
            free_pages: BTreeSet::new(),
            directory: Directory::default(),
        };

        let mut page = Page::new();
        dm.read_page(Self::DIRECTORY_PAGE, &mut page)?;
        dm.directory = Directory::decode(&page)?;

        let mut type_byte = [0u8; 1];
        for id in 1..page_count {
            dm.file.seek(SeekFrom::Start(Self::offset_of(PageId(id))))?;
            dm.file.read_exact(&mut type_byte)?;
            if PageType::from_u8(type_byte[0]) == PageType::Free {
                dm.free_pages.insert(PageId(id));
            }
        }

        debug!(
            pages = page_count,
            free = dm.free_pages.len(),
            "disk_manager.open"
        );
        Ok(dm)
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Number of pages in the file, directory page included.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of deallocated pages awaiting reuse.
    #[inline]
    pub fn free_page_count(&self) -> usize {
        self.free_pages.len()
    }

    /// Total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    #[inline]
    fn offset_of(page_id: PageId) -> u64 {
        (page_id.0 as u64) * (PAGE_SIZE as u64)
    }

    fn check_allocated(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }

    fn persist_directory(&mut self) -> Result<()> {
        let mut page = Page::new();
        self.directory.encode(&mut page);
        self.file
            .seek(SeekFrom::Start(Self::offset_of(Self::DIRECTORY_PAGE)))?;
        self.file.write_all(page.as_slice())?;
        Ok(())
    }
}

impl PageStore for DiskManager {
    /// Allocate `count` contiguous pages (at least one).
    ///
    /// Single-page requests reuse a deallocated page when one exists;
    /// multi-page runs always extend the file.
    fn allocate_page(&mut self, count: u32) -> Result<PageId> {
        let count = count.max(1);

        if count == 1 {
            if let Some(page_id) = self.free_pages.pop_first() {
                return Ok(page_id);
            }
        }

        let first = PageId::new(self.page_count);
        let new_count = self.page_count as u64 + count as u64;
        if new_count > MAX_PAGES {
            return Err(Error::StoreFull);
        }

        // set_len zero-fills the extension.
        self.file.set_len(new_count * PAGE_SIZE as u64)?;
        self.page_count = new_count as u32;
        Ok(first)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.check_allocated(page_id)?;
        if page_id == Self::DIRECTORY_PAGE || self.free_pages.contains(&page_id) {
            return Err(Error::InvalidPageId(page_id));
        }

        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::Free));
        page.update_checksum();
        self.write_page(page_id, &page)?;
        self.free_pages.insert(page_id);
        Ok(())
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page was never allocated
    /// - `Error::Corrupted` if the stored checksum does not match
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.check_allocated(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        self.file.read_exact(page.as_mut_slice())?;

        if !page.verify_checksum() {
            return Err(Error::Corrupted(page_id));
        }
        Ok(())
    }

    /// Write a page to disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_allocated(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        self.file.write_all(page.as_slice())?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn live_page_count(&self) -> usize {
        self.page_count as usize - 1 - self.free_pages.len()
    }

    fn file_entry(&self, name: &str) -> Option<PageId> {
        self.directory.get(name)
    }

    fn add_file_entry(&mut self, name: &str, root: PageId) -> Result<()> {
        self.directory.add(name, root)?;
        self.persist_directory()
    }

    fn set_file_entry(&mut self, name: &str, root: PageId) -> Result<()> {
        self.directory.set(name, root)?;
        self.persist_directory()
    }

    fn delete_file_entry(&mut self, name: &str) -> Result<()> {
        self.directory.remove(name)?;
        self.persist_directory()
    }
}
