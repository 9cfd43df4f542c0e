//! Allocation-policy tests over a real file: uniqueness, reuse ordering,
//! and watermark behavior across reopen.

use std::sync::Arc;

use tinydb::buffer::BufferPool;
use tinydb::config::{PageId, DEFAULT_BUFFER_POOL_SIZE, FIRST_DATA_PAGE_ID};
use tinydb::storage::{DiskManager, FreeSpaceManager};

fn open_fsm(path: &std::path::Path) -> (Arc<BufferPool>, FreeSpaceManager) {
    let disk = Arc::new(DiskManager::open(path).unwrap());
    let pool = Arc::new(BufferPool::new(DEFAULT_BUFFER_POOL_SIZE, disk));
    let fsm = FreeSpaceManager::new(Arc::clone(&pool));
    fsm.initialize().unwrap();
    (pool, fsm)
}

#[test]
fn reuse_after_delete_sequence() {
    // New file: three allocations yield 2, 3, 4. After deallocating the
    // middle one, the next allocation reuses 3 and the one after grows to 5.
    let dir = tempfile::tempdir().unwrap();
    let (_pool, fsm) = open_fsm(&dir.path().join("t.db"));

    let p1 = fsm.allocate_page().unwrap().unwrap();
    let p2 = fsm.allocate_page().unwrap().unwrap();
    let p3 = fsm.allocate_page().unwrap().unwrap();
    assert_eq!((p1, p2, p3), (2, 3, 4));

    assert!(fsm.deallocate_page(p2).unwrap());

    assert_eq!(fsm.allocate_page().unwrap(), Some(3));
    assert_eq!(fsm.allocate_page().unwrap(), Some(5));
}

#[test]
fn allocations_are_unique_and_within_the_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let (_pool, fsm) = open_fsm(&dir.path().join("t.db"));

    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        let page_id = fsm.allocate_page().unwrap().unwrap();
        assert!(page_id >= FIRST_DATA_PAGE_ID);
        assert!(seen.insert(page_id), "page id {page_id} handed out twice");
    }
}

#[test]
fn interleaved_alloc_dealloc_never_duplicates_live_ids() {
    let dir = tempfile::tempdir().unwrap();
    let (_pool, fsm) = open_fsm(&dir.path().join("t.db"));

    let mut live: Vec<PageId> = (0..32)
        .map(|_| fsm.allocate_page().unwrap().unwrap())
        .collect();

    // Free every third page, then reallocate; live set must stay duplicate
    // free throughout.
    let freed: Vec<PageId> = live.iter().copied().step_by(3).collect();
    for &page_id in &freed {
        assert!(fsm.deallocate_page(page_id).unwrap());
        live.retain(|&p| p != page_id);
    }
    for _ in 0..freed.len() {
        live.push(fsm.allocate_page().unwrap().unwrap());
    }

    let unique: std::collections::HashSet<_> = live.iter().copied().collect();
    assert_eq!(unique.len(), live.len());
}

#[test]
fn freed_pages_stay_free_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.db");

    {
        let (pool, fsm) = open_fsm(&path);
        for _ in 0..5 {
            fsm.allocate_page().unwrap().unwrap();
        }
        fsm.deallocate_page(4).unwrap();
        pool.flush_all_pages().unwrap();
    }

    let (_pool, fsm) = open_fsm(&path);
    assert!(!fsm.is_page_allocated(4).unwrap());
    assert_eq!(fsm.allocate_page().unwrap(), Some(4));
}
