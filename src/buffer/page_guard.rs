use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::common::PageId;

use super::buffer_pool_manager::BufferPoolState;
use super::frame_header::{FrameHeader, PageData};

type PageDataReadGuard = ArcRwLockReadGuard<RawRwLock, PageData>;
type PageDataWriteGuard = ArcRwLockWriteGuard<RawRwLock, PageData>;

/// RAII guard holding a pin on a page, without touching its latch.
///
/// Dropping the guard unpins the page. For data access, upgrade into a
/// [`ReadPageGuard`] or [`WritePageGuard`], which add the page latch.
/// Guards are movable but not copyable; a moved-from guard performs no
/// release.
pub struct BasicPageGuard {
    page_id: PageId,
    frame: Arc<FrameHeader>,
    state: Option<Arc<BufferPoolState>>,
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>, state: Arc<BufferPoolState>) -> Self {
        Self {
            page_id,
            frame,
            state: Some(state),
            is_dirty: false,
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Marks the page dirty when the guard releases.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Takes the page's read latch, keeping the pin.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        ReadPageGuard {
            page_id: self.page_id,
            state: self.state.take(),
            data: Some(self.frame.data_lock().read_arc()),
            mark_dirty: self.is_dirty,
        }
    }

    /// Takes the page's write latch, keeping the pin.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        WritePageGuard {
            page_id: self.page_id,
            state: self.state.take(),
            data: Some(self.frame.data_lock().write_arc()),
        }
    }

    /// Drops this guard, releasing the page.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.unpin(self.page_id, self.is_dirty);
        }
    }
}

/// RAII guard for read-only access to a page.
///
/// Holds the page's read latch and a pin for its whole lifetime; both are
/// released on drop, latch first.
pub struct ReadPageGuard {
    page_id: PageId,
    state: Option<Arc<BufferPoolState>>,
    data: Option<PageDataReadGuard>,
    mark_dirty: bool,
}

impl ReadPageGuard {
    pub(crate) fn new(page_id: PageId, frame: &FrameHeader, state: Arc<BufferPoolState>) -> Self {
        Self {
            page_id,
            state: Some(state),
            data: Some(frame.data_lock().read_arc()),
            mark_dirty: false,
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns a reference to the page data.
    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().expect("read guard already released")[..]
    }

    /// Drops this guard, releasing the page.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Latch first: a flusher blocked on this latch may already hold
        // the pool mutex that unpin is about to take.
        self.data.take();
        if let Some(state) = self.state.take() {
            state.unpin(self.page_id, self.mark_dirty);
        }
    }
}

/// RAII guard for read-write access to a page.
///
/// Holds the page's write latch and a pin for its whole lifetime. Releasing
/// the guard marks the page dirty; [`downgrade`](Self::downgrade) is the
/// explicit way out for a guard that wrote nothing.
pub struct WritePageGuard {
    page_id: PageId,
    state: Option<Arc<BufferPoolState>>,
    data: Option<PageDataWriteGuard>,
}

impl WritePageGuard {
    pub(crate) fn new(page_id: PageId, frame: &FrameHeader, state: Arc<BufferPoolState>) -> Self {
        Self {
            page_id,
            state: Some(state),
            data: Some(frame.data_lock().write_arc()),
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns a reference to the page data.
    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().expect("write guard already released")[..]
    }

    /// Returns a mutable reference to the page data.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data.as_mut().expect("write guard already released")[..]
    }

    /// Atomically trades the write latch for the read latch and gives up
    /// marking the page dirty. For guards that did not modify the page.
    pub fn downgrade(mut self) -> ReadPageGuard {
        let write = self.data.take().expect("write guard already released");
        ReadPageGuard {
            page_id: self.page_id,
            state: self.state.take(),
            data: Some(ArcRwLockWriteGuard::downgrade(write)),
            mark_dirty: false,
        }
    }

    /// Drops this guard, releasing the page.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Latch first, then bookkeeping; see ReadPageGuard::drop.
        self.data.take();
        if let Some(state) = self.state.take() {
            state.unpin(self.page_id, true);
        }
    }
}
