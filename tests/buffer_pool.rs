//! Buffer pool integration tests: pin discipline, eviction ordering, and
//! write-back across the pool/disk boundary.

use std::sync::Arc;

use tinydb::buffer::{BufferPool, LruReplacer};
use tinydb::config::{PageId, PAGE_SIZE};
use tinydb::storage::DiskManager;

fn temp_pool(pool_size: usize) -> (tempfile::TempDir, Arc<DiskManager>, BufferPool) {
    let dir = tempfile::tempdir().unwrap();
    let disk = Arc::new(DiskManager::open(dir.path().join("test.db")).unwrap());
    let pool = BufferPool::new(pool_size, Arc::clone(&disk));
    (dir, disk, pool)
}

#[test]
fn lru_victim_selection_sequence() {
    // Capacity 7; unpin 1,2,3,4,5,6,1. Victims must come back 2, 3, 4;
    // after pin(5), pin(6), unpin(2) the next victims are 1 then 2.
    let mut lru = LruReplacer::new(7);
    for frame in [1, 2, 3, 4, 5, 6, 1] {
        lru.unpin(frame);
    }

    assert_eq!(lru.victim(), Some(2));
    assert_eq!(lru.victim(), Some(3));
    assert_eq!(lru.victim(), Some(4));

    lru.pin(5);
    lru.pin(6);
    lru.unpin(2);

    assert_eq!(lru.victim(), Some(1));
    assert_eq!(lru.victim(), Some(2));
    assert_eq!(lru.victim(), None);
}

#[test]
fn eviction_follows_unpin_order_at_the_pool_level() {
    let (_dir, _disk, pool) = temp_pool(3);

    // Fill all three frames, then release in a known order.
    for page_id in 0..3 {
        let mut page = pool.new_page(page_id).unwrap().unwrap();
        page.data_mut()[0] = page_id as u8;
    }

    // Pool has no free frames; page 0 was unpinned first, so fetching a new
    // page must evict it while 1 and 2 stay resident.
    let _p3 = pool.new_page(3).unwrap().unwrap();
    assert_eq!(pool.pin_count(0), None);
    assert!(pool.pin_count(1).is_some());
    assert!(pool.pin_count(2).is_some());
}

#[test]
fn pin_conservation_leaves_every_frame_reclaimable() {
    let (_dir, _disk, pool) = temp_pool(4);

    // Balanced fetch/unpin traffic: at the end everything must be evictable
    // again, so 4 fresh pages can come in.
    for round in 0..3 {
        for page_id in 0..4 {
            let mut page = pool.new_page(round * 4 + page_id).unwrap().unwrap();
            page.data_mut()[0] = round as u8;
        }
    }

    for page_id in 100..104 {
        assert!(pool.new_page(page_id).unwrap().is_some());
    }
}

#[test]
fn page_round_trip_through_pool_and_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let disk = Arc::new(DiskManager::open(&path).unwrap());

    let patterns: Vec<(PageId, u8)> = vec![(0, 0xA1), (1, 0xB2), (2, 0xC3), (3, 0xD4)];

    {
        let pool = BufferPool::new(2, Arc::clone(&disk));
        for &(page_id, byte) in &patterns {
            let mut page = pool.new_page(page_id).unwrap().unwrap();
            page.data_mut().fill(byte);
        }
        pool.flush_all_pages().unwrap();
    }

    // Fresh pool over the same file: last write per page id wins.
    let pool = BufferPool::new(2, disk);
    for &(page_id, byte) in &patterns {
        let page = pool.fetch_page(page_id).unwrap().unwrap();
        assert_eq!(page.data(), &[byte; PAGE_SIZE][..]);
    }
}

#[test]
fn dirty_page_reaches_disk_via_eviction_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let disk = Arc::new(DiskManager::open(&path).unwrap());
    let pool = BufferPool::new(2, Arc::clone(&disk));

    {
        let mut page = pool.new_page(0).unwrap().unwrap();
        page.data_mut()[7] = 0x77;
    }

    // Force page 0 out without an explicit flush.
    let _a = pool.new_page(1).unwrap().unwrap();
    let _b = pool.new_page(2).unwrap().unwrap();

    let mut buf = [0u8; PAGE_SIZE];
    assert!(disk.read_page(0, &mut buf).unwrap());
    assert_eq!(buf[7], 0x77);
}

#[test]
fn explicit_unpin_interface_matches_guard_behavior() {
    let (_dir, _disk, pool) = temp_pool(4);

    let page = pool.new_page(0).unwrap().unwrap();
    // A second pin through the public interface, dropped via unpin_page.
    let again = pool.fetch_page(0).unwrap().unwrap();
    std::mem::forget(again);

    assert_eq!(pool.pin_count(0), Some(2));
    assert!(pool.unpin_page(0, true));
    assert_eq!(pool.pin_count(0), Some(1));

    drop(page);
    assert_eq!(pool.pin_count(0), Some(0));
    assert!(!pool.unpin_page(0, false));
}
