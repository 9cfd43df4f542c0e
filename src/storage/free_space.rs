//! # Free-Space Manager
//!
//! Owns the page allocation policy. Allocation state lives in two places:
//!
//! - **Page 1**: a packed bitmap, one bit per page. Bit `i` of byte `i / 8`
//!   (LSB-first within the byte) is `1` iff page `i` is allocated. Bits 0
//!   and 1 are always set — the superblock and the map itself are immortal.
//! - **Page 0**: the superblock's `page_count`, the high watermark of page
//!   ids ever handed out.
//!
//! ## Allocation Policy
//!
//! 1. **Reuse pass**: scan bits `2 .. page_count` for the first clear bit.
//!    A hit means a previously deallocated page; set its bit and return it.
//! 2. **Grow pass**: take `page_count` itself as the new id, advance the
//!    watermark, set the bit.
//!
//! The watermark never decreases, so the reuse scan can never return an id
//! the file has not seen — the bitmap prefix and the file extent stay in
//! one-to-one correspondence. Capacity is `PAGE_SIZE * 8 = 32768` pages;
//! beyond that `allocate_page` reports exhaustion.
//!
//! ## Concurrency
//!
//! No mutex of its own. Every step is "pin page, mutate, unpin dirty", and
//! each of those steps serializes on the buffer pool's mutex. The manager
//! does not verify that a deallocated page is unlinked from any heap chain;
//! that coordination belongs to the caller.

use std::sync::Arc;

use eyre::Result;

use crate::buffer::BufferPool;
use crate::config::{
    PageId, FIRST_DATA_PAGE_ID, FS_MAP_PAGE_ID, MAX_PAGES, SUPERBLOCK_PAGE_ID,
};
use crate::storage::Superblock;

pub struct FreeSpaceManager {
    pool: Arc<BufferPool>,
}

impl FreeSpaceManager {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self { pool }
    }

    /// Creates pages 0 and 1 on a fresh file; leaves an existing database
    /// untouched. Must run before any allocation.
    pub fn initialize(&self) -> Result<()> {
        match self.pool.fetch_page(SUPERBLOCK_PAGE_ID)? {
            Some(_page) => {}
            None => {
                let mut page = self
                    .pool
                    .new_page(SUPERBLOCK_PAGE_ID)?
                    .ok_or_else(|| eyre::eyre!("buffer pool exhausted creating superblock"))?;
                Superblock::init(page.data_mut())?;
            }
        }

        match self.pool.fetch_page(FS_MAP_PAGE_ID)? {
            Some(_page) => {}
            None => {
                let mut page = self
                    .pool
                    .new_page(FS_MAP_PAGE_ID)?
                    .ok_or_else(|| eyre::eyre!("buffer pool exhausted creating free-space map"))?;
                // Pages 0 and 1 are born allocated.
                page.data_mut()[0] |= 0b0000_0011;
            }
        }

        Ok(())
    }

    /// Hands out a page id, preferring reuse of deallocated ids below the
    /// watermark. `Ok(None)` when the bitmap is at capacity or the pool
    /// cannot pin the system pages.
    pub fn allocate_page(&self) -> Result<Option<PageId>> {
        if let Some(page_id) = self.find_free_page_in_range()? {
            if self.set_bit(page_id, true)? {
                return Ok(Some(page_id));
            }
            return Ok(None);
        }

        let Some(mut sb_page) = self.pool.fetch_page(SUPERBLOCK_PAGE_ID)? else {
            return Ok(None);
        };

        let new_page_id = {
            let sb = Superblock::from_bytes_mut(sb_page.data_mut())?;
            let watermark = sb.page_count();
            if watermark as usize >= MAX_PAGES {
                return Ok(None);
            }
            sb.set_page_count(watermark + 1);
            watermark as PageId
        };
        drop(sb_page);

        if !self.set_bit(new_page_id, true)? {
            return Ok(None);
        }

        Ok(Some(new_page_id))
    }

    /// Clears a page's bit, making the id reusable. `Ok(false)` for the
    /// immortal system pages and out-of-range ids. No liveness check: a
    /// caller that deallocates a page still referenced by a chain corrupts
    /// the file.
    pub fn deallocate_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == SUPERBLOCK_PAGE_ID || page_id == FS_MAP_PAGE_ID {
            return Ok(false);
        }
        if page_id < 0 || page_id as usize >= MAX_PAGES {
            return Ok(false);
        }

        self.set_bit(page_id, false)
    }

    pub fn is_page_allocated(&self, page_id: PageId) -> Result<bool> {
        self.get_bit(page_id)
    }

    fn get_bit(&self, page_id: PageId) -> Result<bool> {
        if page_id < 0 || page_id as usize >= MAX_PAGES {
            return Ok(false);
        }

        let Some(page) = self.pool.fetch_page(FS_MAP_PAGE_ID)? else {
            return Ok(false);
        };

        let byte = page.data()[page_id as usize / 8];
        Ok(byte & (1 << (page_id as usize % 8)) != 0)
    }

    fn set_bit(&self, page_id: PageId, value: bool) -> Result<bool> {
        if page_id < 0 || page_id as usize >= MAX_PAGES {
            return Ok(false);
        }

        let Some(mut page) = self.pool.fetch_page(FS_MAP_PAGE_ID)? else {
            return Ok(false);
        };

        let data = page.data_mut();
        let byte_index = page_id as usize / 8;
        let mask = 1u8 << (page_id as usize % 8);
        if value {
            data[byte_index] |= mask;
        } else {
            data[byte_index] &= !mask;
        }

        Ok(true)
    }

    /// First clear bit in `[2, page_count)`, i.e. a previously deallocated
    /// page below the watermark.
    fn find_free_page_in_range(&self) -> Result<Option<PageId>> {
        let Some(sb_page) = self.pool.fetch_page(SUPERBLOCK_PAGE_ID)? else {
            return Ok(None);
        };
        let page_count = Superblock::from_bytes(sb_page.data())?.page_count();
        drop(sb_page);

        let Some(page) = self.pool.fetch_page(FS_MAP_PAGE_ID)? else {
            return Ok(None);
        };
        let bitmap = page.data();

        for page_id in FIRST_DATA_PAGE_ID..page_count as PageId {
            let byte = bitmap[page_id as usize / 8];
            if byte & (1 << (page_id as usize % 8)) == 0 {
                return Ok(Some(page_id));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BUFFER_POOL_SIZE;
    use crate::storage::DiskManager;

    fn temp_fsm() -> (tempfile::TempDir, Arc<BufferPool>, FreeSpaceManager) {
        let dir = tempfile::tempdir().unwrap();
        let disk = Arc::new(DiskManager::open(dir.path().join("test.db")).unwrap());
        let pool = Arc::new(BufferPool::new(DEFAULT_BUFFER_POOL_SIZE, disk));
        let fsm = FreeSpaceManager::new(Arc::clone(&pool));
        fsm.initialize().unwrap();
        (dir, pool, fsm)
    }

    #[test]
    fn initialize_creates_superblock_and_map() {
        let (_dir, pool, fsm) = temp_fsm();

        let sb_page = pool.fetch_page(SUPERBLOCK_PAGE_ID).unwrap().unwrap();
        let sb = Superblock::from_bytes(sb_page.data()).unwrap();
        assert_eq!(sb.page_count(), 2);
        drop(sb_page);

        assert!(fsm.is_page_allocated(0).unwrap());
        assert!(fsm.is_page_allocated(1).unwrap());
        assert!(!fsm.is_page_allocated(2).unwrap());
    }

    #[test]
    fn initialize_is_idempotent_on_existing_database() {
        let (_dir, _pool, fsm) = temp_fsm();

        let p = fsm.allocate_page().unwrap().unwrap();
        assert_eq!(p, 2);

        fsm.initialize().unwrap();
        assert!(fsm.is_page_allocated(2).unwrap());
    }

    #[test]
    fn allocation_starts_at_first_data_page() {
        let (_dir, _pool, fsm) = temp_fsm();

        assert_eq!(fsm.allocate_page().unwrap(), Some(2));
        assert_eq!(fsm.allocate_page().unwrap(), Some(3));
        assert_eq!(fsm.allocate_page().unwrap(), Some(4));
    }

    #[test]
    fn deallocated_page_is_reused_before_watermark_grows() {
        let (_dir, _pool, fsm) = temp_fsm();

        let p1 = fsm.allocate_page().unwrap().unwrap();
        let p2 = fsm.allocate_page().unwrap().unwrap();
        let p3 = fsm.allocate_page().unwrap().unwrap();
        assert_eq!((p1, p2, p3), (2, 3, 4));

        assert!(fsm.deallocate_page(p2).unwrap());

        assert_eq!(fsm.allocate_page().unwrap(), Some(3));
        assert_eq!(fsm.allocate_page().unwrap(), Some(5));
    }

    #[test]
    fn smallest_deallocated_id_wins_the_reuse_scan() {
        let (_dir, _pool, fsm) = temp_fsm();

        for _ in 0..5 {
            fsm.allocate_page().unwrap().unwrap();
        }
        fsm.deallocate_page(5).unwrap();
        fsm.deallocate_page(3).unwrap();

        assert_eq!(fsm.allocate_page().unwrap(), Some(3));
        assert_eq!(fsm.allocate_page().unwrap(), Some(5));
    }

    #[test]
    fn system_pages_cannot_be_deallocated() {
        let (_dir, _pool, fsm) = temp_fsm();

        assert!(!fsm.deallocate_page(0).unwrap());
        assert!(!fsm.deallocate_page(1).unwrap());
        assert!(fsm.is_page_allocated(0).unwrap());
        assert!(fsm.is_page_allocated(1).unwrap());
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        let (_dir, _pool, fsm) = temp_fsm();

        assert!(!fsm.deallocate_page(-5).unwrap());
        assert!(!fsm.deallocate_page(MAX_PAGES as PageId).unwrap());
        assert!(!fsm.is_page_allocated(MAX_PAGES as PageId).unwrap());
    }

    #[test]
    fn watermark_survives_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let disk = Arc::new(DiskManager::open(&path).unwrap());
            let pool = Arc::new(BufferPool::new(DEFAULT_BUFFER_POOL_SIZE, disk));
            let fsm = FreeSpaceManager::new(Arc::clone(&pool));
            fsm.initialize().unwrap();
            for _ in 0..4 {
                fsm.allocate_page().unwrap().unwrap();
            }
            pool.flush_all_pages().unwrap();
        }

        let disk = Arc::new(DiskManager::open(&path).unwrap());
        let pool = Arc::new(BufferPool::new(DEFAULT_BUFFER_POOL_SIZE, disk));
        let fsm = FreeSpaceManager::new(Arc::clone(&pool));
        fsm.initialize().unwrap();

        assert!(fsm.is_page_allocated(5).unwrap());
        assert_eq!(fsm.allocate_page().unwrap(), Some(6));
    }
}
