//! # Storage Module
//!
//! The on-disk side of the engine: a single flat file of 4096-byte pages,
//! addressed by page id.
//!
//! ## File Layout
//!
//! ```text
//! tinydb.db
//! ├── page 0   superblock: magic, page-count watermark, catalog root
//! ├── page 1   free-space bitmap: one bit per page
//! └── page 2+  slotted pages, chained into table heaps
//! ```
//!
//! ## Layering
//!
//! ```text
//! TableHeap            chain of slotted pages; insert/delete/update/scan
//!     │
//! SlottedPage(Mut)     record directory + downward-growing record area
//!     │
//! BufferPool           (crate::buffer) pinned 4KiB frames over the file
//!     │
//! DiskManager          byte-offset page reads/writes, fsync per write
//! ```
//!
//! `FreeSpaceManager` sits beside the heap: it owns the allocation policy
//! (bitmap on page 1, high watermark in the superblock) and is the only
//! component that mints page ids. The disk layer performs no validation and
//! keeps no allocation state.
//!
//! ## Page References Are Ids
//!
//! Inter-page references (`next_page_id`, `first_page_id`, the catalog root)
//! are ids, never pointers. The bytes of a page are owned by its buffer-pool
//! frame while pinned; every structure here is a transient view over that
//! frame.

mod disk;
pub mod free_space;
mod heap;
pub mod slotted;
mod superblock;

pub use disk::DiskManager;
pub use free_space::FreeSpaceManager;
pub use heap::{HeapIter, RecordId, TableHeap};
pub use slotted::{SlottedPage, SlottedPageMut};
pub use superblock::{Superblock, SUPERBLOCK_MAGIC, SUPERBLOCK_SIZE};
