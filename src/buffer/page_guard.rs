//! RAII guards for page access.
//!
//! These guards provide safe access to pinned pages:
//! - [`PageReadGuard`] - Shared read access (multiple allowed)
//! - [`PageWriteGuard`] - Exclusive access, dirty once mutably borrowed
//!
//! Both guards unpin the page when dropped, so every early return through
//! `?` releases its pins.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::common::{FrameId, PageId, Result};
use crate::storage::page::Page;

use super::buffer_pool::BufferPool;

/// Guard for read-only page access.
///
/// # Example
/// ```ignore
/// let guard = pool.fetch_page_read(page_id)?;
/// let data = guard.as_slice();  // Deref to &Page
/// // guard drops here, page unpinned clean
/// ```
pub struct PageReadGuard<'a> {
    /// Reference back to the pool for unpin on drop.
    pool: &'a BufferPool,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        pool: &'a BufferPool,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            pool,
            frame_id,
            page_id,
            lock,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.pool.unpin_frame(self.frame_id, self.page_id, false) {
            warn!(page = self.page_id.0, error = %err, "read guard unpin failed");
        }
    }
}

/// Guard for exclusive page access.
///
/// The frame is marked dirty on unpin only if the page was mutably
/// dereferenced (or the guard was created for a brand-new page).
///
/// # Example
/// ```ignore
/// let mut guard = pool.fetch_page_write(page_id)?;
/// guard.as_mut_slice()[0] = 0xFF;  // DerefMut marks the guard dirty
/// // guard drops here, page unpinned dirty
/// ```
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPool,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
    dirty: bool,
    /// Set once the pin has been handed back by [`free`](Self::free).
    released: bool,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        pool: &'a BufferPool,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
        dirty: bool,
    ) -> Self {
        Self {
            pool,
            frame_id,
            page_id,
            lock,
            dirty,
            released: false,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Whether the page will be marked dirty when the guard drops.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Release this guard's pin and deallocate the page.
    ///
    /// # Errors
    /// - `Error::StillPinned` if someone else also holds a pin
    /// - page-store errors from deallocation; the guard then unpins
    ///   normally
    pub fn free(mut self) -> Result<()> {
        self.pool.free_latched(self.frame_id, self.page_id)?;
        self.released = true;
        Ok(())
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.dirty = true;
        &mut self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self
            .pool
            .unpin_frame(self.frame_id, self.page_id, self.dirty)
        {
            warn!(page = self.page_id.0, error = %err, "write guard unpin failed");
        }
    }
}

impl std::fmt::Debug for PageReadGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReadGuard")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for PageWriteGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWriteGuard")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
