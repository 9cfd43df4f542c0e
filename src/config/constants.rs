//! # TinyDB Configuration Constants
//!
//! This module centralizes layout and tuning constants, grouping
//! interdependent values together. Constants that depend on each other are
//! co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> MAX_PAGES (derived: PAGE_SIZE * 8)
//!       │     One bitmap bit per page; the whole map lives on page 1.
//!       │
//!       ├─> SLOTTED_HEADER_SIZE (12 bytes, fixed)
//!       │
//!       └─> MAX_RECORD_SIZE (derived: PAGE_SIZE - header - one slot)
//!             The largest record a freshly initialized page can hold.
//!
//! DEFAULT_BUFFER_POOL_SIZE (10 frames)
//!       │
//!       └─> Callers that pin more than this many pages at once will see
//!           fetch_page return None (all frames pinned, no victim).
//! ```
//!
//! ## Well-Known Page Ids
//!
//! | Id | Contents |
//! |----|----------|
//! | 0  | Superblock: magic, page-count high watermark, catalog root |
//! | 1  | Free-space bitmap |
//! | 2+ | Slotted data pages |
//!
//! Pages 0 and 1 are created by `FreeSpaceManager::initialize` and are never
//! deallocated.

/// Page id type. Negative values are invalid; `-1` is the canonical sentinel.
pub type PageId = i32;

/// Zero-based index into the buffer pool's frame array. Never persisted.
pub type FrameId = usize;

/// Table id as persisted in the catalog. Meta-tables occupy 0 and 1.
pub type TableId = i32;

/// Slot index within a slotted page.
pub type SlotNum = u32;

/// Size of each database page in bytes. The fundamental unit of I/O,
/// caching, and addressing.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel for "no page".
pub const INVALID_PAGE_ID: PageId = -1;

/// Page 0: the superblock.
pub const SUPERBLOCK_PAGE_ID: PageId = 0;

/// Page 1: the free-space bitmap.
pub const FS_MAP_PAGE_ID: PageId = 1;

/// First page id the free-space manager will ever hand out.
pub const FIRST_DATA_PAGE_ID: PageId = 2;

/// Capacity of the single-page bitmap: one bit per page.
pub const MAX_PAGES: usize = PAGE_SIZE * 8;

/// Number of frames in the buffer pool unless the caller overrides it.
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 10;

/// Slotted page header: next_page_id (4) + num_slots (4) + free_space_ptr (4).
pub const SLOTTED_HEADER_SIZE: usize = 12;

/// One slot directory entry: offset (4) + size (4).
pub const SLOT_SIZE: usize = 8;

/// The largest record insertable into a freshly initialized page: the payload
/// plus one directory slot must fit under the header.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - SLOTTED_HEADER_SIZE - SLOT_SIZE;

/// Database file used when the shell is started without a path argument.
pub const DEFAULT_DB_FILE: &str = "tinydb.db";

const _: () = assert!(MAX_PAGES == 32768, "bitmap capacity derivation mismatch");

const _: () = assert!(
    MAX_RECORD_SIZE == 4076,
    "MAX_RECORD_SIZE must equal PAGE_SIZE - SLOTTED_HEADER_SIZE - SLOT_SIZE"
);

const _: () = assert!(
    DEFAULT_BUFFER_POOL_SIZE >= 3,
    "heap insert pins up to three pages (tail, new page, fs map) at once"
);
