//! # Superblock (Page 0)
//!
//! The superblock is the master record of the database file. It names the
//! format, carries the page-count high watermark, and anchors the catalog so
//! recovery has somewhere to start.
//!
//! ## Layout
//!
//! ```text
//! Offset  Size  Field                   Description
//! ------  ----  ----------------------  -----------------------------------
//! 0       8     magic                   ASCII "TINYDB01"
//! 8       4     page_count              High watermark of page ids ever
//!                                       allocated (exclusive upper bound)
//! 12      4     catalog_tables_page_id  First page of __catalog_tables,
//!                                       or -1 before bootstrap completes
//! 16      4     fs_map_root_page_id     Always 1
//! 20      4076  reserved                Zero-initialized
//! ```
//!
//! All multi-byte fields are little-endian; the zerocopy `U32`/`I32` wrappers
//! make that a property of the type rather than of call sites.
//!
//! ## High Watermark
//!
//! `page_count` never decreases. The free-space manager's reuse scan covers
//! only `[2, page_count)`; growth allocates `page_count` itself and then
//! advances it. This keeps the bitmap prefix and the file extent in
//! one-to-one correspondence.

use eyre::{ensure, Result};
use zerocopy::little_endian::{I32, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{PageId, FS_MAP_PAGE_ID, INVALID_PAGE_ID};

pub const SUPERBLOCK_MAGIC: &[u8; 8] = b"TINYDB01";

/// Size of the meaningful superblock prefix; the rest of page 0 is reserved.
pub const SUPERBLOCK_SIZE: usize = 20;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Superblock {
    magic: [u8; 8],
    page_count: U32,
    catalog_tables_page_id: I32,
    fs_map_root_page_id: I32,
}

const _: () = assert!(std::mem::size_of::<Superblock>() == SUPERBLOCK_SIZE);

impl Superblock {
    /// Fresh superblock for a new database: pages 0 and 1 exist, the catalog
    /// does not yet.
    pub fn new() -> Self {
        Self {
            magic: *SUPERBLOCK_MAGIC,
            page_count: U32::new(2),
            catalog_tables_page_id: I32::new(INVALID_PAGE_ID),
            fs_map_root_page_id: I32::new(FS_MAP_PAGE_ID),
        }
    }

    /// Initializes the prefix of a zeroed page-0 buffer in place.
    pub fn init(page: &mut [u8]) -> Result<()> {
        ensure!(
            page.len() >= SUPERBLOCK_SIZE,
            "buffer too small for Superblock: {} < {}",
            page.len(),
            SUPERBLOCK_SIZE
        );
        page[..SUPERBLOCK_SIZE].copy_from_slice(Self::new().as_bytes());
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= SUPERBLOCK_SIZE,
            "buffer too small for Superblock: {} < {}",
            bytes.len(),
            SUPERBLOCK_SIZE
        );

        let sb = Self::ref_from_bytes(&bytes[..SUPERBLOCK_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse Superblock: {:?}", e))?;

        ensure!(
            &sb.magic == SUPERBLOCK_MAGIC,
            "invalid magic bytes in page 0: not a tinydb file"
        );

        Ok(sb)
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            bytes.len() >= SUPERBLOCK_SIZE,
            "buffer too small for Superblock: {} < {}",
            bytes.len(),
            SUPERBLOCK_SIZE
        );

        let sb = Self::mut_from_bytes(&mut bytes[..SUPERBLOCK_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse Superblock: {:?}", e))?;

        ensure!(
            &sb.magic == SUPERBLOCK_MAGIC,
            "invalid magic bytes in page 0: not a tinydb file"
        );

        Ok(sb)
    }

    pub fn is_valid(&self) -> bool {
        &self.magic == SUPERBLOCK_MAGIC
    }

    /// A database is initialized once the catalog root is recorded; before
    /// that, a crash leaves a file that open() treats as new.
    pub fn is_initialized(&self) -> bool {
        self.is_valid() && self.catalog_tables_page_id.get() != INVALID_PAGE_ID
    }

    pub fn page_count(&self) -> u32 {
        self.page_count.get()
    }

    pub fn set_page_count(&mut self, count: u32) {
        self.page_count = U32::new(count);
    }

    pub fn catalog_tables_page_id(&self) -> PageId {
        self.catalog_tables_page_id.get()
    }

    pub fn set_catalog_tables_page_id(&mut self, page_id: PageId) {
        self.catalog_tables_page_id = I32::new(page_id);
    }

    pub fn fs_map_root_page_id(&self) -> PageId {
        self.fs_map_root_page_id.get()
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}
