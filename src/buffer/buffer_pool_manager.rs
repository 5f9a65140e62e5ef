use std::collections::{HashMap, LinkedList};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use log::{debug, error, trace};
use parking_lot::Mutex;

use crate::common::{BedrockError, FrameId, PageId, Result, PAGE_SIZE};
use crate::recovery::LogManager;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{BasicPageGuard, FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Metadata behind the pool's coarse mutex.
struct PoolInner {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames currently holding no page
    free_list: LinkedList<FrameId>,
}

/// Pool state shared between the manager and its page guards.
pub(crate) struct BufferPoolState {
    /// The buffer pool frames
    frames: Vec<Arc<FrameHeader>>,
    /// Page table and free list, guarded by the one pool mutex
    inner: Mutex<PoolInner>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
}

impl BufferPoolState {
    /// Decrements the pin count of `page_id`, sticky-ORs the dirty flag and
    /// marks the frame evictable when the count reaches zero. Returns false
    /// for an unknown page or a pin count already at zero, with no side
    /// effects.
    pub(crate) fn unpin(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };
        let frame = &self.frames[frame_id.as_usize()];
        match frame.unpin() {
            None => false,
            Some(remaining) => {
                if is_dirty {
                    frame.set_dirty(true);
                }
                if remaining == 0 {
                    self.replacer.set_evictable(frame_id, true);
                }
                true
            }
        }
    }
}

/// BufferPoolManager is responsible for fetching database pages from disk
/// and caching them in a fixed number of in-memory frames, using the LRU-K
/// replacement policy to decide which pages to evict.
///
/// A single coarse mutex guards the page table and free list; the replacer,
/// page table and free list are too intertwined for anything finer in this
/// core. Disk I/O on the fetch and eviction paths runs with that mutex
/// held.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Next page ID to allocate, monotonic from zero
    next_page_id: AtomicI32,
    /// Shared state
    state: Arc<BufferPoolState>,
    /// Disk scheduler for I/O
    disk_scheduler: DiskScheduler,
    /// Write-ahead-log sink, held for future integration
    log_manager: Option<Arc<LogManager>>,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value
    /// for LRU-K replacement, disk manager and optional log manager.
    pub fn new(
        pool_size: usize,
        replacer_k: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(BufferPoolState {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruKReplacer::new(pool_size, replacer_k),
        });

        Self {
            pool_size,
            next_page_id: AtomicI32::new(0),
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
            log_manager,
        }
    }

    /// Allocates a fresh page in the buffer pool and returns its frame,
    /// pinned once. The frame's memory is zeroed and the page is published
    /// in the page table. Fails with `BufferPoolFull` when every frame is
    /// pinned.
    pub fn new_page(&self) -> Result<Arc<FrameHeader>> {
        let mut inner = self.state.inner.lock();
        let frame_id = self.find_available_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let page_id = self.allocate_page();
        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();

        inner.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(Arc::clone(frame))
    }

    /// Fetches a page into the buffer pool and returns its frame, pinned.
    ///
    /// A page-table hit pins the resident frame; otherwise a frame is taken
    /// from the free list or evicted, and the page is read from disk.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        if !page_id.is_valid() {
            return Err(BedrockError::InvalidPageId(page_id));
        }

        let mut inner = self.state.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id);
            self.state.replacer.set_evictable(frame_id, false);
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.find_available_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let data = match self.disk_scheduler.read_page_sync(page_id) {
            Ok(data) => data,
            Err(e) => {
                // The frame goes back to the free list; no page was
                // published in it.
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        frame.set_page_id(page_id);
        frame.copy_from(&data[..]);
        frame.set_dirty(false);
        frame.pin();

        inner.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(Arc::clone(frame))
    }

    /// Decrements the pin count of `page_id`. `is_dirty` is sticky-ORed
    /// into the frame's dirty flag. Returns false for an unknown page or a
    /// pin count already at zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin(page_id, is_dirty)
    }

    /// Writes `page_id` to disk, dirty or not, and clears its dirty flag.
    /// Returns `Ok(false)` for invalid or non-resident pages.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Ok(false);
        }

        let inner = self.state.inner.lock();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.write_page_sync(page_id, &data)?;
        frame.set_dirty(false);

        Ok(true)
    }

    /// Flushes every page in the page table.
    pub fn flush_all_pages(&self) -> Result<()> {
        let inner = self.state.inner.lock();
        debug!("flushing {} buffered pages", inner.page_table.len());

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];

            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.write_page_sync(page_id, &data)?;
            frame.set_dirty(false);
        }

        Ok(())
    }

    /// Drops `page_id` from the buffer pool and deallocates it on disk.
    /// Returns `Ok(false)` for a pinned or non-resident page, with no side
    /// effects.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.state.inner.lock();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Ok(false);
        }

        inner.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);

        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;
        trace!("deleted {page_id} from frame {frame_id}");

        Ok(true)
    }

    /// Allocates a fresh page and wraps it in a pin-holding guard.
    pub fn new_page_guarded(&self) -> Result<BasicPageGuard> {
        let frame = self.new_page()?;
        let page_id = frame.page_id();
        Ok(BasicPageGuard::new(page_id, frame, Arc::clone(&self.state)))
    }

    /// Fetches a page behind a pin-holding guard, no latch taken.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        let frame = self.fetch_page(page_id)?;
        Ok(BasicPageGuard::new(page_id, frame, Arc::clone(&self.state)))
    }

    /// Fetches a page behind a guard holding its read latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame = self.fetch_page(page_id)?;
        Ok(ReadPageGuard::new(page_id, &frame, Arc::clone(&self.state)))
    }

    /// Fetches a page behind a guard holding its write latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame = self.fetch_page(page_id)?;
        Ok(WritePageGuard::new(page_id, &frame, Arc::clone(&self.state)))
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    /// Returns the dirty flag for a resident page.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].is_dirty())
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    /// Returns the log manager handle, if one was attached.
    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    fn allocate_page(&self) -> PageId {
        PageId::new(self.next_page_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Gets a usable frame, either from the free list or by evicting a
    /// page. An evicted dirty page is written back first.
    fn find_available_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = match self.state.replacer.evict() {
            Some(frame_id) => frame_id,
            None => return Err(BedrockError::BufferPoolFull),
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            trace!("evicting dirty {old_page_id} from frame {frame_id}");
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            if let Err(e) = self.disk_scheduler.write_page_sync(old_page_id, &data) {
                // The frame is recycled even when write-back fails; the
                // error aborts the caller's operation.
                error!("write-back of {old_page_id} failed during eviction: {e}");
                inner.page_table.remove(&old_page_id);
                frame.reset();
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
            frame.set_dirty(false);
        }

        inner.page_table.remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }
}
