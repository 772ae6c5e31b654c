//! Buffer Pool - the page caching layer.
//!
//! The [`BufferPool`] provides:
//! - Page caching between a [`PageStore`] and memory
//! - Pin-based reference counting, explicit or through guards
//! - Dirty page write-back on eviction and flush
//! - Clock (second-chance) replacement

use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::buffer::page_index::PageIndex;
use crate::buffer::replacer::{ClockReplacer, Replacer};
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::PageStore;

/// Manages a fixed pool of frames caching pages of a [`PageStore`].
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                        BufferPool                           │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │  page_index  │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐                        │
/// │  │   replacer   │  │    store     │                        │
/// │  │    Clock     │  │    Mutex     │                        │
/// │  └──────────────┘  └──────────────┘                        │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// Empty frames carry no pin and a clear reference bit, so the clock
/// hands them out before any resident page is considered.
///
/// # Locking
/// - `page_index`: `RwLock`
/// - `replacer`, `store`: `Mutex`
/// - `frames`: no lock, each Frame has internal locks
/// - `stats`: all atomic counters
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("test.db")?;
/// let pool = BufferPool::new(10, dm);
///
/// let mut guard = pool.new_page(1)?;
/// guard.as_mut_slice()[100] = 0xAB;
/// let page_id = guard.page_id();
/// drop(guard);  // unpinned dirty
///
/// let guard = pool.fetch_page_read(page_id)?;
/// assert_eq!(guard.as_slice()[100], 0xAB);
/// ```
pub struct BufferPool {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps resident page IDs to frame IDs.
    page_index: RwLock<PageIndex>,

    /// Eviction policy for selecting victim frames.
    replacer: Mutex<Box<dyn Replacer>>,

    /// Handles all page I/O.
    store: Mutex<Box<dyn PageStore>>,

    stats: BufferPoolStats,

    pool_size: usize,
}

impl BufferPool {
    /// Create a buffer pool of `pool_size` frames with a clock replacer.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, store: impl PageStore + 'static) -> Self {
        Self::with_replacer(pool_size, store, Box::new(ClockReplacer::new(pool_size)))
    }

    /// Create a buffer pool with a custom replacement policy.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn with_replacer(
        pool_size: usize,
        store: impl PageStore + 'static,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        Self {
            frames: (0..pool_size).map(|_| Frame::new()).collect(),
            page_index: RwLock::new(PageIndex::with_capacity(pool_size)),
            replacer: Mutex::new(replacer),
            store: Mutex::new(Box::new(store)),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: Pin and unpin
    // ========================================================================

    /// Pin `page_id` into a frame and return the frame.
    ///
    /// A resident page just gains a pin. Otherwise a victim frame is
    /// chosen, its dirty contents written back, and the page read from the
    /// store. With `is_new` the read is skipped and the frame zeroed: the
    /// caller is about to initialize the page itself.
    ///
    /// The returned [`FrameId`] is a handle, not access. Page bytes are
    /// only reachable through [`fetch_page_read`](Self::fetch_page_read),
    /// [`fetch_page_write`](Self::fetch_page_write) or
    /// [`new_page`](Self::new_page), which latch the frame. A page pinned
    /// here is initialized by fetching a write guard while the pin is held;
    /// the fetch is a cache hit and the explicit pin keeps the frame
    /// resident after the guard drops.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for the sentinel id
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - `Error::FrameWrite` if the victim could not be written back
    /// - `Error::FrameRead` if the page could not be read
    pub fn pin_page(&self, page_id: PageId, is_new: bool) -> Result<FrameId> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }

        if let Some(frame_id) = self.page_index.read().lookup(page_id) {
            self.frames[frame_id.0].pin();
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            self.stats.pins.fetch_add(1, Ordering::Relaxed);
            return Ok(frame_id);
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame()?;
        let frame = &self.frames[frame_id.0];

        {
            let mut page = frame.page_mut();
            if is_new {
                page.reset();
            } else {
                // The frame was cleared by acquire_frame, so a failed read
                // leaves it empty.
                self.store
                    .lock()
                    .read_page(page_id, &mut page)
                    .map_err(|err| Error::frame_read(page_id, err))?;
                self.stats.pages_read.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.install(frame_id, page_id);
        trace!(page = page_id.0, frame = frame_id.0, is_new, "page pinned from store");
        Ok(frame_id)
    }

    /// Release one pin on `page_id`, marking the frame dirty if `is_dirty`.
    ///
    /// # Errors
    /// - `Error::NotInPool` if the page is not resident
    /// - `Error::OverUnpin` if the page holds no pins
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let frame_id = self
            .page_index
            .read()
            .lookup(page_id)
            .ok_or(Error::NotInPool(page_id))?;
        self.unpin_frame(frame_id, page_id, is_dirty)
    }

    // ========================================================================
    // Public API: Guarded access
    // ========================================================================

    /// Pin a page and take a shared latch on it.
    ///
    /// # Errors
    /// Everything [`pin_page`](Self::pin_page) returns, plus
    /// `Error::PageLatched` if a write guard for the page is alive.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.pin_page(page_id, false)?;
        match self.frames[frame_id.0].try_page() {
            Some(lock) => Ok(PageReadGuard::new(self, frame_id, page_id, lock)),
            None => {
                self.unpin_frame(frame_id, page_id, false)?;
                Err(Error::PageLatched(page_id))
            }
        }
    }

    /// Pin a page and take an exclusive latch on it.
    ///
    /// The page is marked dirty on release only if it was mutably
    /// dereferenced through the guard.
    ///
    /// # Errors
    /// Everything [`pin_page`](Self::pin_page) returns, plus
    /// `Error::PageLatched` if any other guard for the page is alive.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.pin_page(page_id, false)?;
        match self.frames[frame_id.0].try_page_mut() {
            Some(lock) => Ok(PageWriteGuard::new(self, frame_id, page_id, lock, false)),
            None => {
                self.unpin_frame(frame_id, page_id, false)?;
                Err(Error::PageLatched(page_id))
            }
        }
    }

    // ========================================================================
    // Public API: Create and free pages
    // ========================================================================

    /// Allocate `how_many` contiguous pages and pin the first as a zeroed,
    /// dirty page.
    ///
    /// The frame is secured before the store allocates, so a full pool
    /// never leaks a store page.
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - `Error::FrameWrite` if the victim could not be written back
    /// - errors from store allocation
    pub fn new_page(&self, how_many: u32) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.acquire_frame()?;
        let page_id = self.store.lock().allocate_page(how_many)?;

        let frame = &self.frames[frame_id.0];
        let mut lock = frame.page_mut();
        lock.reset();
        self.install(frame_id, page_id);

        trace!(page = page_id.0, frame = frame_id.0, how_many, "new page");
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock, true))
    }

    /// Deallocate `page_id` in the store and drop it from the pool.
    ///
    /// A resident page may carry at most one pin (the caller's own, taken
    /// with [`pin_page`](Self::pin_page)); that pin is consumed. A page
    /// behind a live guard is refused: free it with
    /// [`PageWriteGuard::free`] instead. The
    /// cached bytes are discarded without a write.
    ///
    /// # Errors
    /// - `Error::StillPinned` if the page holds more than one pin
    /// - `Error::PageLatched` if a guard for the page is alive
    /// - errors from store deallocation, in which case nothing changes
    pub fn free_page(&self, page_id: PageId) -> Result<()> {
        let resident = self.page_index.read().lookup(page_id);

        // Held until the frame is cleared so no guard can latch it meanwhile.
        let _latch = match resident {
            Some(frame_id) => {
                let frame = &self.frames[frame_id.0];
                Self::check_single_pin(frame, page_id)?;
                Some(frame.try_page_mut().ok_or(Error::PageLatched(page_id))?)
            }
            None => None,
        };

        self.discard(page_id, resident)
    }

    /// Free a page whose latch and single pin belong to the calling guard.
    pub(crate) fn free_latched(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        Self::check_single_pin(&self.frames[frame_id.0], page_id)?;
        self.discard(page_id, Some(frame_id))
    }

    fn check_single_pin(frame: &Frame, page_id: PageId) -> Result<()> {
        let pin_count = frame.pin_count();
        if pin_count > 1 {
            return Err(Error::StillPinned {
                page_id,
                pin_count,
            });
        }
        Ok(())
    }

    fn discard(&self, page_id: PageId, resident: Option<FrameId>) -> Result<()> {
        self.store.lock().deallocate_page(page_id)?;

        if let Some(frame_id) = resident {
            let frame = &self.frames[frame_id.0];
            if frame.is_pinned() {
                self.stats.unpins.fetch_add(1, Ordering::Relaxed);
            }
            self.page_index.write().delete(page_id);
            frame.clear();
        }

        trace!(page = page_id.0, "page freed");
        Ok(())
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write `page_id` back if dirty. The page stays resident.
    ///
    /// # Errors
    /// - `Error::NotInPool` if the page is not resident
    /// - `Error::PagePinned` if the page is pinned
    /// - `Error::FrameWrite` if the write fails
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = self
            .page_index
            .read()
            .lookup(page_id)
            .ok_or(Error::NotInPool(page_id))?;

        let frame = &self.frames[frame_id.0];
        if frame.is_pinned() {
            return Err(Error::PagePinned(page_id));
        }
        if frame.is_dirty() {
            self.write_back(frame_id, page_id)?;
        }
        Ok(())
    }

    /// Write back and evict every unpinned page, then sync the store.
    ///
    /// Every unpinned frame is attempted even if an earlier one fails.
    ///
    /// # Errors
    /// - the first write-back error encountered
    /// - `Error::FlushIncomplete` if any pages were skipped while pinned
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut pinned = 0;
        let mut first_err = None;

        for (i, frame) in self.frames.iter().enumerate() {
            let Some(page_id) = frame.page_id() else {
                continue;
            };
            if frame.is_pinned() {
                pinned += 1;
                continue;
            }
            if frame.is_dirty() {
                if let Err(err) = self.write_back(FrameId::new(i), page_id) {
                    first_err.get_or_insert(err);
                    continue;
                }
            }
            self.page_index.write().delete(page_id);
            frame.clear();
        }

        self.store.lock().sync()?;
        debug!(pinned, "flushed buffer pool");

        if let Some(err) = first_err {
            return Err(err);
        }
        if pinned > 0 {
            return Err(Error::FlushIncomplete(pinned));
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Registry
    // ========================================================================

    /// Root page registered under `name`.
    pub fn file_entry(&self, name: &str) -> Option<PageId> {
        self.store.lock().file_entry(name)
    }

    /// Register `name` with root `root`.
    pub fn add_file_entry(&self, name: &str, root: PageId) -> Result<()> {
        self.store.lock().add_file_entry(name, root)
    }

    /// Re-point `name` at `root`.
    pub fn set_file_entry(&self, name: &str, root: PageId) -> Result<()> {
        self.store.lock().set_file_entry(name, root)
    }

    /// Remove `name` from the registry.
    pub fn delete_file_entry(&self, name: &str) -> Result<()> {
        self.store.lock().delete_file_entry(name)
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of pages resident in the pool.
    pub fn page_count(&self) -> usize {
        self.page_index.read().len()
    }

    /// Pin count of `page_id`, or `None` if it is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.page_index
            .read()
            .lookup(page_id)
            .map(|frame_id| self.frames[frame_id.0].pin_count())
    }

    /// Whether `page_id` is resident and dirty.
    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.page_index
            .read()
            .lookup(page_id)
            .is_some_and(|frame_id| self.frames[frame_id.0].is_dirty())
    }

    /// Number of frames holding at least one pin.
    pub fn pinned_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_pinned()).count()
    }

    /// Number of frames holding no pin, empty frames included.
    pub fn unpinned_frame_count(&self) -> usize {
        self.pool_size - self.pinned_frame_count()
    }

    /// Pages allocated in the underlying store and not yet freed.
    pub fn live_page_count(&self) -> usize {
        self.store.lock().live_page_count()
    }

    // ========================================================================
    // Internal: Called by page guards on drop
    // ========================================================================

    /// Release one pin on a frame known to hold `page_id`.
    pub(crate) fn unpin_frame(
        &self,
        frame_id: FrameId,
        page_id: PageId,
        is_dirty: bool,
    ) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        if frame.page_id() != Some(page_id) {
            return Err(Error::NotInPool(page_id));
        }
        if !frame.is_pinned() {
            return Err(Error::OverUnpin(page_id));
        }

        if is_dirty {
            frame.mark_dirty();
        }
        frame.unpin();
        self.stats.unpins.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Pick a victim frame and empty it, writing back a dirty page first.
    fn acquire_frame(&self) -> Result<FrameId> {
        let frame_id = self
            .replacer
            .lock()
            .pick_victim(&self.frames)
            .ok_or(Error::PoolExhausted)?;

        let frame = &self.frames[frame_id.0];
        if let Some(old_page_id) = frame.page_id() {
            if frame.is_dirty() {
                self.write_back(frame_id, old_page_id)?;
            }
            self.page_index.write().delete(old_page_id);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(page = old_page_id.0, frame = frame_id.0, "evicted page");
        }

        frame.clear();
        Ok(frame_id)
    }

    /// Stamp the checksum and write an unpinned frame's page to the store.
    fn write_back(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        let mut page = frame.page_mut();
        page.update_checksum();
        self.store
            .lock()
            .write_page(page_id, &page)
            .map_err(|err| Error::frame_write(page_id, err))?;
        drop(page);

        frame.clear_dirty();
        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Record `page_id` as resident in an empty frame with one pin.
    fn install(&self, frame_id: FrameId, page_id: PageId) {
        let frame = &self.frames[frame_id.0];
        frame.set_page_id(Some(page_id));
        frame.pin();
        self.page_index.write().insert(page_id, frame_id);
        self.stats.pins.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    /// Helper to create a pool over a temporary database file.
    fn create_test_pool(pool_size: usize) -> (BufferPool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let dm = DiskManager::create(&path).unwrap();
        (BufferPool::new(pool_size, dm), dir)
    }

    #[test]
    fn test_new_page_skips_directory() {
        let (pool, _dir) = create_test_pool(10);

        let guard = pool.new_page(1).unwrap();
        assert_eq!(guard.page_id(), PageId::new(1));
        assert!(guard.is_dirty());
        drop(guard);

        let guard = pool.new_page(1).unwrap();
        assert_eq!(guard.page_id(), PageId::new(2));
    }

    #[test]
    fn test_fetch_page_read_write() {
        let (pool, _dir) = create_test_pool(10);

        let page_id = {
            let mut guard = pool.new_page(1).unwrap();
            guard.as_mut_slice()[100] = 0xAB;
            guard.page_id()
        };

        {
            let mut guard = pool.fetch_page_write(page_id).unwrap();
            assert_eq!(guard.as_slice()[100], 0xAB);
            guard.as_mut_slice()[101] = 0xCD;
        }

        let guard = pool.fetch_page_read(page_id).unwrap();
        assert_eq!(guard.as_slice()[101], 0xCD);
    }

    #[test]
    fn test_cache_hit() {
        let (pool, _dir) = create_test_pool(10);
        let page_id = pool.new_page(1).unwrap().page_id();

        drop(pool.fetch_page_read(page_id).unwrap());
        drop(pool.fetch_page_read(page_id).unwrap());

        let snapshot = pool.stats().snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 0);
    }

    #[test]
    fn test_eviction() {
        let (pool, _dir) = create_test_pool(3);

        for _ in 0..3 {
            let _guard = pool.new_page(1).unwrap();
        }
        assert_eq!(pool.page_count(), 3);

        let guard = pool.new_page(1).unwrap();
        assert_eq!(guard.page_id(), PageId::new(4));
        assert_eq!(pool.page_count(), 3);
        assert_eq!(pool.stats().snapshot().evictions, 1);
    }

    #[test]
    fn test_dirty_page_written_on_eviction() {
        let (pool, _dir) = create_test_pool(1);

        let first = {
            let mut guard = pool.new_page(1).unwrap();
            guard.as_mut_slice()[200] = 0x42;
            guard.page_id()
        };

        // Only one frame: the next page evicts the first.
        drop(pool.new_page(1).unwrap());
        assert_eq!(pool.pin_count(first), None);

        let guard = pool.fetch_page_read(first).unwrap();
        assert_eq!(guard.as_slice()[200], 0x42);
        assert!(pool.stats().snapshot().pages_written >= 1);
    }

    #[test]
    fn test_explicit_pin_unpin() {
        let (pool, _dir) = create_test_pool(4);
        let page_id = pool.new_page(1).unwrap().page_id();

        pool.pin_page(page_id, false).unwrap();
        pool.pin_page(page_id, false).unwrap();
        assert_eq!(pool.pin_count(page_id), Some(2));

        pool.unpin_page(page_id, false).unwrap();
        pool.unpin_page(page_id, true).unwrap();
        assert_eq!(pool.pin_count(page_id), Some(0));
        assert!(pool.is_dirty(page_id));

        assert!(matches!(
            pool.unpin_page(page_id, false),
            Err(Error::OverUnpin(_))
        ));
        assert!(matches!(
            pool.unpin_page(PageId::new(77), false),
            Err(Error::NotInPool(_))
        ));
    }

    #[test]
    fn test_pin_new_then_initialize_through_guard() {
        let (pool, _dir) = create_test_pool(2);
        let page_id = {
            let mut guard = pool.new_page(1).unwrap();
            guard.as_mut_slice()[300] = 0x11;
            guard.page_id()
        };
        pool.flush_all_pages().unwrap();
        assert_eq!(pool.pin_count(page_id), None);
        pool.stats().reset();

        pool.pin_page(page_id, true).unwrap();
        assert_eq!(pool.stats().snapshot().pages_read, 0);
        {
            let mut guard = pool.fetch_page_write(page_id).unwrap();
            assert_eq!(guard.as_slice()[300], 0);
            guard.as_mut_slice()[300] = 0x22;
        }
        assert_eq!(pool.pin_count(page_id), Some(1));
        pool.unpin_page(page_id, false).unwrap();
        assert!(pool.is_dirty(page_id));

        pool.flush_all_pages().unwrap();
        let guard = pool.fetch_page_read(page_id).unwrap();
        assert_eq!(guard.as_slice()[300], 0x22);
        assert_eq!(pool.stats().snapshot().pages_read, 1);
    }

    #[test]
    fn test_pin_invalid_page_id() {
        let (pool, _dir) = create_test_pool(2);
        assert!(matches!(
            pool.pin_page(PageId::INVALID, false),
            Err(Error::InvalidPageId(_))
        ));
    }

    #[test]
    fn test_pool_exhausted() {
        let (pool, _dir) = create_test_pool(2);

        let _guard1 = pool.new_page(1).unwrap();
        let _guard2 = pool.new_page(1).unwrap();

        assert!(matches!(pool.new_page(1), Err(Error::PoolExhausted)));
        // The failed attempt must not have allocated a store page.
        assert_eq!(pool.live_page_count(), 2);
    }

    #[test]
    fn test_read_of_unallocated_page_leaves_frame_empty() {
        let (pool, _dir) = create_test_pool(2);

        let err = pool.fetch_page_read(PageId::new(999)).unwrap_err();
        assert!(matches!(err, Error::FrameRead { .. }));
        assert_eq!(pool.page_count(), 0);
        assert_eq!(pool.pinned_frame_count(), 0);
    }

    #[test]
    fn test_latch_conflicts() {
        let (pool, _dir) = create_test_pool(4);
        let page_id = pool.new_page(1).unwrap().page_id();

        let read1 = pool.fetch_page_read(page_id).unwrap();
        let read2 = pool.fetch_page_read(page_id).unwrap();
        assert_eq!(pool.pin_count(page_id), Some(2));

        assert!(matches!(
            pool.fetch_page_write(page_id),
            Err(Error::PageLatched(_))
        ));
        // The failed latch gave its pin back.
        assert_eq!(pool.pin_count(page_id), Some(2));

        drop(read1);
        drop(read2);

        let _write = pool.fetch_page_write(page_id).unwrap();
        assert!(matches!(
            pool.fetch_page_read(page_id),
            Err(Error::PageLatched(_))
        ));
    }

    #[test]
    fn test_write_guard_clean_unless_mutated() {
        let (pool, _dir) = create_test_pool(4);
        let page_id = pool.new_page(1).unwrap().page_id();
        pool.flush_page(page_id).unwrap();
        assert!(!pool.is_dirty(page_id));

        {
            let guard = pool.fetch_page_write(page_id).unwrap();
            let _ = guard.as_slice()[0];
        }
        assert!(!pool.is_dirty(page_id));

        {
            let mut guard = pool.fetch_page_write(page_id).unwrap();
            guard.as_mut_slice()[300] = 1;
        }
        assert!(pool.is_dirty(page_id));
    }

    #[test]
    fn test_free_page() {
        let (pool, _dir) = create_test_pool(4);
        let page_id = pool.new_page(1).unwrap().page_id();
        assert_eq!(pool.live_page_count(), 1);

        pool.free_page(page_id).unwrap();
        assert_eq!(pool.pin_count(page_id), None);
        assert_eq!(pool.live_page_count(), 0);

        // The freed id is handed out again.
        let guard = pool.new_page(1).unwrap();
        assert_eq!(guard.page_id(), page_id);
    }

    #[test]
    fn test_free_page_through_guard() {
        let (pool, _dir) = create_test_pool(4);
        let guard = pool.new_page(1).unwrap();
        let page_id = guard.page_id();

        guard.free().unwrap();

        assert_eq!(pool.pin_count(page_id), None);
        assert_eq!(pool.pinned_frame_count(), 0);
        let snapshot = pool.stats().snapshot();
        assert_eq!(snapshot.pins, snapshot.unpins);
    }

    #[test]
    fn test_free_page_still_pinned() {
        let (pool, _dir) = create_test_pool(4);
        let guard = pool.new_page(1).unwrap();
        let page_id = guard.page_id();
        pool.pin_page(page_id, false).unwrap();

        assert!(matches!(
            pool.free_page(page_id),
            Err(Error::StillPinned { pin_count: 2, .. })
        ));
        pool.unpin_page(page_id, false).unwrap();
        guard.free().unwrap();
    }

    #[test]
    fn test_free_page_refuses_latched_frame() {
        let (pool, _dir) = create_test_pool(1);
        let page_id = pool.new_page(1).unwrap().page_id();

        let guard = pool.fetch_page_read(page_id).unwrap();
        assert!(matches!(
            pool.free_page(page_id),
            Err(Error::PageLatched(_))
        ));
        assert_eq!(pool.pin_count(page_id), Some(1));
        assert_eq!(pool.live_page_count(), 1);
        drop(guard);

        pool.free_page(page_id).unwrap();
        assert_eq!(pool.pinned_frame_count(), 0);

        // The single frame is usable again.
        let guard = pool.new_page(1).unwrap();
        assert_eq!(guard.page_id(), page_id);
    }

    #[test]
    fn test_free_page_with_explicit_pin() {
        let (pool, _dir) = create_test_pool(2);
        let page_id = pool.new_page(1).unwrap().page_id();
        pool.pin_page(page_id, false).unwrap();

        pool.free_page(page_id).unwrap();
        assert_eq!(pool.pin_count(page_id), None);
        let snapshot = pool.stats().snapshot();
        assert_eq!(snapshot.pins, snapshot.unpins);
    }

    #[test]
    fn test_flush_page() {
        let (pool, _dir) = create_test_pool(10);
        let mut guard = pool.new_page(1).unwrap();
        guard.as_mut_slice()[100] = 0xFF;
        let page_id = guard.page_id();

        assert!(matches!(
            pool.flush_page(page_id),
            Err(Error::PagePinned(_))
        ));
        drop(guard);

        pool.flush_page(page_id).unwrap();
        assert!(!pool.is_dirty(page_id));
        assert_eq!(pool.pin_count(page_id), Some(0));
        assert_eq!(pool.stats().snapshot().pages_written, 1);

        assert!(matches!(
            pool.flush_page(PageId::new(55)),
            Err(Error::NotInPool(_))
        ));
    }

    #[test]
    fn test_flush_all_pages() {
        let (pool, _dir) = create_test_pool(10);

        for i in 0..5 {
            let mut guard = pool.new_page(1).unwrap();
            guard.as_mut_slice()[100] = i;
        }

        pool.flush_all_pages().unwrap();

        assert_eq!(pool.page_count(), 0);
        assert_eq!(pool.stats().snapshot().pages_written, 5);
    }

    #[test]
    fn test_flush_all_pages_reports_pinned() {
        let (pool, _dir) = create_test_pool(10);
        let _held = pool.new_page(1).unwrap();
        drop(pool.new_page(1).unwrap());

        assert!(matches!(
            pool.flush_all_pages(),
            Err(Error::FlushIncomplete(1))
        ));
        assert_eq!(pool.page_count(), 1);
    }

    #[test]
    fn test_frame_counts() {
        let (pool, _dir) = create_test_pool(4);
        let _a = pool.new_page(1).unwrap();
        let _b = pool.new_page(1).unwrap();
        drop(pool.new_page(1).unwrap());

        assert_eq!(pool.pool_size(), 4);
        assert_eq!(pool.pinned_frame_count(), 2);
        assert_eq!(pool.unpinned_frame_count(), 2);
    }

    #[test]
    fn test_registry_pass_through() {
        let (pool, _dir) = create_test_pool(4);

        assert_eq!(pool.file_entry("idx"), None);
        pool.add_file_entry("idx", PageId::new(3)).unwrap();
        pool.set_file_entry("idx", PageId::new(9)).unwrap();
        assert_eq!(pool.file_entry("idx"), Some(PageId::new(9)));
        pool.delete_file_entry("idx").unwrap();
        assert_eq!(pool.file_entry("idx"), None);
    }
}
