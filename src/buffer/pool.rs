//! # Buffer Pool
//!
//! A fixed array of page frames cached in memory, coordinated by one mutex.
//! Every page access in the system goes through here; the pool is the only
//! component that talks to the disk layer.
//!
//! ## State
//!
//! ```text
//! BufferPool
//! ├── frames:     Vec<Frame>            (page_id, pin_count, dirty, 4KiB buffer)
//! ├── page_table: HashMap<PageId, FrameId>
//! ├── free_list:  VecDeque<FrameId>     (FIFO of unoccupied frames)
//! └── replacer:   LruReplacer           (eviction order of unpinned frames)
//! ```
//!
//! A frame is in exactly one of three states:
//!
//! - **free**: `page_id == -1`, on the free list, in neither the page table
//!   nor the replacer
//! - **pinned**: holds a page, `pin_count > 0`, in the page table only
//! - **evictable**: holds a page, `pin_count == 0`, in the page table and
//!   the replacer
//!
//! ## Pin Discipline
//!
//! Every successful [`BufferPool::fetch_page`] / [`BufferPool::new_page`]
//! increments the pin count and hands back a [`PageRef`], whose `Drop`
//! performs exactly one matching unpin. Callers must hold the guard for the
//! entire span over which they touch the page's bytes; eviction is impossible
//! while any pin is outstanding.
//!
//! The dirty flag is sticky upward: [`BufferPool::unpin_page`] can set it but
//! never clears it. Only a flush clears dirty, after the bytes reach disk.
//!
//! ## Eviction
//!
//! `find_free_frame` prefers the free list (FIFO) and otherwise asks the
//! replacer for a victim. A dirty victim is written out before its frame is
//! reused; a clean victim is dropped silently.
//!
//! ## Concurrency
//!
//! All public operations take the single mutex; there are no per-frame
//! latches. Disk I/O happens while the mutex is held — a deliberate
//! simplification that trades throughput for an easily-audited ordering: the
//! mutex gives a total order over all pool transitions. Page *contents* are
//! read and written by callers through [`PageRef`] without the mutex; the pin
//! count is what keeps those bytes stable.

use std::collections::VecDeque;
use std::sync::Arc;

use eyre::Result;
use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::buffer::LruReplacer;
use crate::config::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::DiskManager;

struct Frame {
    page_id: PageId,
    pin_count: u32,
    dirty: bool,
    data: Box<[u8; PAGE_SIZE]>,
}

impl Frame {
    fn new() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            dirty: false,
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }
}

struct PoolInner {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LruReplacer,
}

pub struct BufferPool {
    disk: Arc<DiskManager>,
    inner: Mutex<PoolInner>,
}

impl BufferPool {
    pub fn new(pool_size: usize, disk: Arc<DiskManager>) -> Self {
        let frames = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list = (0..pool_size).collect();

        Self {
            disk,
            inner: Mutex::new(PoolInner {
                frames,
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                replacer: LruReplacer::new(pool_size),
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Pin count of a resident page, for tests and assertions.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.inner.lock();
        let frame_id = *inner.page_table.get(&page_id)?;
        Some(inner.frames[frame_id].pin_count)
    }

    /// Takes a frame from the free list, or evicts an unpinned victim,
    /// writing it out first when dirty. `None` when every frame is pinned.
    fn find_free_frame(&self, inner: &mut PoolInner) -> Result<Option<FrameId>> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = inner.replacer.victim() else {
            return Ok(None);
        };

        let frame = &mut inner.frames[frame_id];
        if frame.page_id != INVALID_PAGE_ID {
            if frame.dirty {
                self.disk.write_page(frame.page_id, frame.data.as_slice())?;
            }
            let old = frame.page_id;
            inner.page_table.remove(&old);
        }

        Ok(Some(frame_id))
    }

    fn install(inner: &mut PoolInner, frame_id: FrameId, page_id: PageId) {
        let frame = &mut inner.frames[frame_id];
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.dirty = false;
        inner.page_table.insert(page_id, frame_id);
        inner.replacer.pin(frame_id);
    }

    // SAFETY: the returned pointer addresses the frame's boxed buffer, whose
    // heap allocation never moves for the lifetime of the pool. The caller
    // must only build a PageRef from it while the frame's pin count accounts
    // for that guard, which prevents the frame from being evicted or handed
    // to another page.
    fn frame_ptr(inner: &mut PoolInner, frame_id: FrameId) -> *mut u8 {
        inner.frames[frame_id].data.as_mut_ptr()
    }

    /// Returns a pinned reference to a resident or disk-resident page.
    /// `Ok(None)` when the page lies past EOF or every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<PageRef<'_>>> {
        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            inner.frames[frame_id].pin_count += 1;
            inner.replacer.pin(frame_id);
            let ptr = Self::frame_ptr(&mut inner, frame_id);
            return Ok(Some(PageRef::new(self, page_id, ptr)));
        }

        let Some(frame_id) = self.find_free_frame(&mut inner)? else {
            return Ok(None);
        };

        let frame = &mut inner.frames[frame_id];
        frame.page_id = INVALID_PAGE_ID;
        if !self.disk.read_page(page_id, frame.data.as_mut_slice())? {
            inner.free_list.push_back(frame_id);
            return Ok(None);
        }

        Self::install(&mut inner, frame_id, page_id);
        let ptr = Self::frame_ptr(&mut inner, frame_id);
        Ok(Some(PageRef::new(self, page_id, ptr)))
    }

    /// Like `fetch_page`, but zero-initializes the frame instead of reading
    /// from disk. The caller supplies the page id, obtained from the
    /// free-space manager — the pool itself never allocates ids.
    pub fn new_page(&self, page_id: PageId) -> Result<Option<PageRef<'_>>> {
        let mut inner = self.inner.lock();

        // A deallocated page can still be resident from its previous life;
        // reuse its frame and wipe it.
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &mut inner.frames[frame_id];
            frame.pin_count += 1;
            frame.data.fill(0);
            inner.replacer.pin(frame_id);
            let ptr = Self::frame_ptr(&mut inner, frame_id);
            return Ok(Some(PageRef::new(self, page_id, ptr)));
        }

        let Some(frame_id) = self.find_free_frame(&mut inner)? else {
            return Ok(None);
        };

        inner.frames[frame_id].data.fill(0);
        Self::install(&mut inner, frame_id, page_id);
        let ptr = Self::frame_ptr(&mut inner, frame_id);
        Ok(Some(PageRef::new(self, page_id, ptr)))
    }

    /// Drops one pin. `mark_dirty` is sticky: it can set the dirty flag but
    /// never clears it. Returns `false` for a non-resident page or a pin
    /// count already at zero — both caller-contract violations.
    pub fn unpin_page(&self, page_id: PageId, mark_dirty: bool) -> bool {
        let mut inner = self.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };

        let frame = &mut inner.frames[frame_id];
        if frame.pin_count == 0 {
            return false;
        }

        frame.pin_count -= 1;
        if mark_dirty {
            frame.dirty = true;
        }
        if frame.pin_count == 0 {
            inner.replacer.unpin(frame_id);
        }

        true
    }

    /// Writes a resident page to disk and clears its dirty flag. Does not
    /// unpin. `Ok(false)` when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();
        self.flush_locked(&mut inner, page_id)
    }

    fn flush_locked(&self, inner: &mut PoolInner, page_id: PageId) -> Result<bool> {
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };

        let frame = &mut inner.frames[frame_id];
        self.disk.write_page(page_id, frame.data.as_slice())?;
        frame.dirty = false;

        Ok(true)
    }

    /// Flushes every resident page. Invoked at shutdown; without a WAL this
    /// is the only durability point.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let resident: Vec<PageId> = inner.page_table.keys().copied().collect();
        for page_id in resident {
            self.flush_locked(&mut inner, page_id)?;
        }
        Ok(())
    }

    /// Evicts a page from the pool without writing it back, returning its
    /// frame to the free list. `false` when the page is still pinned; `true`
    /// when it was removed or was not resident at all. The on-disk
    /// deallocation (the free-space bit) is the caller's coordination.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut inner = self.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return true;
        };

        if inner.frames[frame_id].pin_count > 0 {
            return false;
        }

        inner.page_table.remove(&page_id);
        inner.replacer.pin(frame_id);
        inner.free_list.push_back(frame_id);

        let frame = &mut inner.frames[frame_id];
        frame.page_id = INVALID_PAGE_ID;
        frame.pin_count = 0;
        frame.dirty = false;

        true
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Best effort: shutdown durability is flush-all; an I/O error here
        // has no caller left to handle it.
        let _ = self.flush_all_pages();
    }
}

/// RAII pin guard over one page's bytes.
///
/// The guard's existence keeps the frame's pin count positive, so the buffer
/// cannot be evicted or rebound to another page. `Drop` performs exactly one
/// `unpin_page`, carrying the dirty intent recorded by `data_mut` /
/// `mark_dirty`.
pub struct PageRef<'a> {
    pool: &'a BufferPool,
    page_id: PageId,
    data: *mut u8,
    dirty: std::cell::Cell<bool>,
}

impl<'a> PageRef<'a> {
    fn new(pool: &'a BufferPool, page_id: PageId, data: *mut u8) -> Self {
        Self {
            pool,
            page_id,
            data,
            dirty: std::cell::Cell::new(false),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        // SAFETY: `data` points at the frame's PAGE_SIZE buffer. The frame
        // stays bound to `page_id` while this guard holds a pin, and the
        // boxed buffer never moves.
        unsafe { std::slice::from_raw_parts(self.data, PAGE_SIZE) }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty.set(true);
        // SAFETY: as in `data`, plus `&mut self` guarantees this is the only
        // live view handed out through this guard.
        unsafe { std::slice::from_raw_parts_mut(self.data, PAGE_SIZE) }
    }

    /// Records dirty intent without taking a mutable view.
    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }
}

impl Drop for PageRef<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, self.dirty.get());
    }
}
