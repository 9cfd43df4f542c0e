//! # Table Heap
//!
//! An unordered record store: a singly-linked chain of slotted pages, walked
//! front to back. Records are addressed by [`RecordId`] — `(page_id,
//! slot_num)` — which stays valid for the lifetime of the row because slot
//! numbers are never recycled, even across deletes.
//!
//! ## Insert Path
//!
//! Insert walks the chain pinning one page at a time, asking each page for
//! room. Pages that refuse are unpinned clean and the walk follows
//! `next_page_id`. When the chain is exhausted the heap allocates a fresh
//! page from the free-space manager, formats it, inserts there (any record up
//! to [`MAX_RECORD_SIZE`] must fit a fresh page), and links it behind the old
//! tail. First-insert into an empty heap records the new page as the chain
//! head instead.
//!
//! ## Update Path
//!
//! In-place update is attempted first: shrink into the old slot, or grow
//! within the same page's free space. If the page cannot host the new copy,
//! the heap falls back to tombstone-and-reinsert, which yields a **new**
//! record id; callers that need id stability must not grow records past
//! their page's capacity.
//!
//! ## Iteration
//!
//! [`HeapIter`] advances `(page_id, slot_num)` over the chain, skipping
//! tombstones, copying each live record out while the page is pinned. A page
//! is pinned only for the duration of a single advance step. The iterator is
//! not isolated from concurrent mutation of the heap; the buffer pool mutex
//! is the only serialization.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use eyre::{bail, Result};

use crate::buffer::BufferPool;
use crate::config::{PageId, SlotNum, INVALID_PAGE_ID, MAX_RECORD_SIZE, SLOT_SIZE};
use crate::storage::free_space::FreeSpaceManager;
use crate::storage::slotted::{SlottedPage, SlottedPageMut};

/// Stable address of a record: page id plus slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_num: SlotNum,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_num: SlotNum) -> Self {
        Self { page_id, slot_num }
    }
}

pub struct TableHeap {
    pool: Arc<BufferPool>,
    free_space: Arc<FreeSpaceManager>,
    first_page_id: AtomicI32,
}

impl TableHeap {
    /// Wraps an existing chain (or `INVALID_PAGE_ID` for an empty heap whose
    /// first page will be allocated on first insert).
    pub fn new(
        pool: Arc<BufferPool>,
        free_space: Arc<FreeSpaceManager>,
        first_page_id: PageId,
    ) -> Self {
        Self {
            pool,
            free_space,
            first_page_id: AtomicI32::new(first_page_id),
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id.load(Ordering::Acquire)
    }

    /// Inserts a record and returns its address.
    pub fn insert(&self, record: &[u8]) -> Result<RecordId> {
        if record.len() > MAX_RECORD_SIZE {
            bail!(
                "record of {} bytes exceeds page capacity of {}",
                record.len(),
                MAX_RECORD_SIZE
            );
        }

        let mut current = self.first_page_id();
        let mut tail = INVALID_PAGE_ID;

        while current != INVALID_PAGE_ID {
            let mut page = self
                .pool
                .fetch_page(current)?
                .ok_or_else(|| eyre::eyre!("heap chain page {current} could not be pinned"))?;

            let (fits, next) = {
                let view = SlottedPage::new(page.data());
                (
                    view.free_space() >= record.len() + SLOT_SIZE,
                    view.next_page_id(),
                )
            };

            if fits {
                let slot = SlottedPageMut::new(page.data_mut())
                    .insert(record)
                    .ok_or_else(|| eyre::eyre!("page {current} refused insert after capacity check"))?;
                return Ok(RecordId::new(current, slot));
            }

            tail = current;
            drop(page);
            current = next;
        }

        // Chain exhausted (or empty): grow it by one page.
        let Some(new_page_id) = self.free_space.allocate_page()? else {
            bail!("database is out of pages");
        };

        let Some(mut page) = self.pool.new_page(new_page_id)? else {
            self.free_space.deallocate_page(new_page_id)?;
            bail!("buffer pool exhausted while growing heap");
        };

        let slot = {
            let mut slotted = SlottedPageMut::new(page.data_mut());
            slotted.init();
            slotted
                .insert(record)
                .ok_or_else(|| eyre::eyre!("fresh page refused record of {} bytes", record.len()))?
        };
        drop(page);

        if tail == INVALID_PAGE_ID {
            self.first_page_id.store(new_page_id, Ordering::Release);
        } else {
            let mut tail_page = self
                .pool
                .fetch_page(tail)?
                .ok_or_else(|| eyre::eyre!("heap tail page {tail} could not be pinned"))?;
            SlottedPageMut::new(tail_page.data_mut()).set_next_page_id(new_page_id);
        }

        Ok(RecordId::new(new_page_id, slot))
    }

    /// Tombstones a record. `Ok(false)` for out-of-range or already-deleted
    /// slots; the page is unpinned clean in that case.
    pub fn delete(&self, rid: RecordId) -> Result<bool> {
        let Some(mut page) = self.pool.fetch_page(rid.page_id)? else {
            return Ok(false);
        };

        if !SlottedPage::new(page.data()).is_live(rid.slot_num) {
            return Ok(false);
        }

        Ok(SlottedPageMut::new(page.data_mut()).delete(rid.slot_num))
    }

    /// Rewrites a record, in place when the page allows it, otherwise by
    /// tombstone-and-reinsert. Returns the record's address after the update
    /// — a new id on the fallback path. `Ok(None)` when the record does not
    /// exist (deleted or out of range).
    pub fn update(&self, rid: RecordId, record: &[u8]) -> Result<Option<RecordId>> {
        let in_place = {
            let Some(mut page) = self.pool.fetch_page(rid.page_id)? else {
                return Ok(None);
            };

            let feasible = {
                let view = SlottedPage::new(page.data());
                match view.get(rid.slot_num) {
                    None => return Ok(None),
                    Some(old) => {
                        record.len() <= old.len() || view.free_space() >= record.len()
                    }
                }
            };

            if feasible {
                SlottedPageMut::new(page.data_mut()).update(rid.slot_num, record)
            } else {
                false
            }
        };

        if in_place {
            return Ok(Some(rid));
        }

        // The page cannot host the grown copy: the old id becomes a
        // tombstone and the record moves.
        if !self.delete(rid)? {
            return Ok(None);
        }
        let new_rid = self.insert(record)?;
        Ok(Some(new_rid))
    }

    /// Copies out a record's bytes. `Ok(None)` for tombstoned or
    /// out-of-range slots.
    pub fn get(&self, rid: RecordId) -> Result<Option<Vec<u8>>> {
        let Some(page) = self.pool.fetch_page(rid.page_id)? else {
            return Ok(None);
        };

        Ok(SlottedPage::new(page.data())
            .get(rid.slot_num)
            .map(|bytes| bytes.to_vec()))
    }

    /// Forward scan over live records.
    pub fn iter(&self) -> HeapIter<'_> {
        HeapIter {
            pool: &self.pool,
            page_id: self.first_page_id(),
            slot_num: 0,
        }
    }
}

pub struct HeapIter<'a> {
    pool: &'a BufferPool,
    page_id: PageId,
    slot_num: SlotNum,
}

impl Iterator for HeapIter<'_> {
    type Item = Result<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.page_id == INVALID_PAGE_ID {
                return None;
            }

            let page = match self.pool.fetch_page(self.page_id) {
                Err(e) => return Some(Err(e)),
                Ok(None) => {
                    return Some(Err(eyre::eyre!(
                        "heap chain page {} could not be pinned",
                        self.page_id
                    )))
                }
                Ok(Some(page)) => page,
            };

            let view = SlottedPage::new(page.data());
            while self.slot_num < view.num_slots() {
                let slot = self.slot_num;
                self.slot_num += 1;
                if let Some(bytes) = view.get(slot) {
                    return Some(Ok((RecordId::new(self.page_id, slot), bytes.to_vec())));
                }
            }

            self.page_id = view.next_page_id();
            self.slot_num = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BUFFER_POOL_SIZE;
    use crate::storage::DiskManager;

    fn temp_heap() -> (tempfile::TempDir, TableHeap) {
        let dir = tempfile::tempdir().unwrap();
        let disk = Arc::new(DiskManager::open(dir.path().join("test.db")).unwrap());
        let pool = Arc::new(BufferPool::new(DEFAULT_BUFFER_POOL_SIZE, disk));
        let fsm = Arc::new(FreeSpaceManager::new(Arc::clone(&pool)));
        fsm.initialize().unwrap();
        let heap = TableHeap::new(pool, fsm, INVALID_PAGE_ID);
        (dir, heap)
    }

    #[test]
    fn insert_into_empty_heap_creates_first_page() {
        let (_dir, heap) = temp_heap();
        assert_eq!(heap.first_page_id(), INVALID_PAGE_ID);

        let rid = heap.insert(b"first").unwrap();

        assert_eq!(heap.first_page_id(), rid.page_id);
        assert_eq!(rid.slot_num, 0);
        assert_eq!(heap.get(rid).unwrap().unwrap(), b"first");
    }

    #[test]
    fn records_round_trip_bytes() {
        let (_dir, heap) = temp_heap();

        let rows: Vec<_> = (0u32..50)
            .map(|i| {
                let record = i.to_le_bytes().repeat(8);
                (heap.insert(&record).unwrap(), record)
            })
            .collect();

        for (rid, expected) in rows {
            assert_eq!(heap.get(rid).unwrap().unwrap(), expected);
        }
    }

    #[test]
    fn oversized_record_is_rejected_without_allocating() {
        let (_dir, heap) = temp_heap();

        let err = heap.insert(&vec![0u8; MAX_RECORD_SIZE + 1]).unwrap_err();
        assert!(err.to_string().contains("exceeds page capacity"));
        assert_eq!(heap.first_page_id(), INVALID_PAGE_ID);
    }

    #[test]
    fn max_size_record_fits_exactly() {
        let (_dir, heap) = temp_heap();

        let rid = heap.insert(&vec![7u8; MAX_RECORD_SIZE]).unwrap();
        assert_eq!(heap.get(rid).unwrap().unwrap().len(), MAX_RECORD_SIZE);
    }

    #[test]
    fn full_pages_chain_to_new_ones() {
        let (_dir, heap) = temp_heap();

        // ~500-byte records: a handful per page, so 40 spills across pages.
        let rids: Vec<_> = (0..40)
            .map(|i| heap.insert(&[i as u8; 500]).unwrap())
            .collect();

        let pages: std::collections::HashSet<_> = rids.iter().map(|r| r.page_id).collect();
        assert!(pages.len() >= 2);

        for (i, rid) in rids.iter().enumerate() {
            assert_eq!(heap.get(*rid).unwrap().unwrap(), [i as u8; 500]);
        }
    }

    #[test]
    fn delete_tombstones_and_get_sees_nothing() {
        let (_dir, heap) = temp_heap();
        let rid = heap.insert(b"doomed").unwrap();

        assert!(heap.delete(rid).unwrap());
        assert_eq!(heap.get(rid).unwrap(), None);
        assert!(!heap.delete(rid).unwrap());
    }

    #[test]
    fn deleted_rid_is_never_handed_out_again() {
        let (_dir, heap) = temp_heap();
        let rid = heap.insert(b"gone").unwrap();
        heap.delete(rid).unwrap();

        for _ in 0..20 {
            let new_rid = heap.insert(b"fresh").unwrap();
            assert_ne!(new_rid, rid);
        }
    }

    #[test]
    fn update_in_place_keeps_rid() {
        let (_dir, heap) = temp_heap();
        let rid = heap.insert(&[1u8; 100]).unwrap();

        let out = heap.update(rid, &[2u8; 60]).unwrap().unwrap();

        assert_eq!(out, rid);
        assert_eq!(heap.get(rid).unwrap().unwrap(), [2u8; 60]);
    }

    #[test]
    fn update_growth_on_full_page_moves_the_record() {
        let (_dir, heap) = temp_heap();

        let rid = heap.insert(&[1u8; 40]).unwrap();
        // Stuff the page until less than 200 bytes remain.
        let mut filler = Vec::new();
        loop {
            let r = heap.insert(&[0xFFu8; 300]).unwrap();
            if r.page_id != rid.page_id {
                filler.push(r);
                break;
            }
            filler.push(r);
        }

        let new_rid = heap.update(rid, &[2u8; 3900]).unwrap().unwrap();

        assert_ne!(new_rid, rid);
        assert_eq!(heap.get(rid).unwrap(), None);
        assert_eq!(heap.get(new_rid).unwrap().unwrap(), [2u8; 3900]);
    }

    #[test]
    fn update_of_deleted_record_reports_missing() {
        let (_dir, heap) = temp_heap();
        let rid = heap.insert(b"x").unwrap();
        heap.delete(rid).unwrap();

        assert_eq!(heap.update(rid, b"y").unwrap(), None);
    }

    #[test]
    fn iterator_yields_live_records_in_chain_order() {
        let (_dir, heap) = temp_heap();

        let a = heap.insert(b"a").unwrap();
        let b = heap.insert(b"b").unwrap();
        let c = heap.insert(b"c").unwrap();
        heap.delete(b).unwrap();

        let rows: Vec<_> = heap.iter().map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], (a, b"a".to_vec()));
        assert_eq!(rows[1], (c, b"c".to_vec()));
    }

    #[test]
    fn iterator_crosses_page_boundaries_exactly_once_per_record() {
        let (_dir, heap) = temp_heap();

        let inserted: Vec<_> = (0..30)
            .map(|i| heap.insert(&[i as u8; 600]).unwrap())
            .collect();

        let seen: Vec<_> = heap.iter().map(|r| r.unwrap().0).collect();

        assert_eq!(seen, inserted);
    }

    #[test]
    fn iterator_over_empty_heap_is_empty() {
        let (_dir, heap) = temp_heap();
        assert_eq!(heap.iter().count(), 0);
    }
}
