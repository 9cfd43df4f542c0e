//! # Disk Layer
//!
//! Byte-offset reads and writes of fixed-size pages against a single database
//! file. The disk layer owns the file handle and nothing else: it does not
//! allocate page ids, validate them, or track free pages — that policy lives
//! in [`FreeSpaceManager`](crate::storage::FreeSpaceManager).
//!
//! ## I/O Discipline
//!
//! Every `write_page` seeks to `page_id * PAGE_SIZE`, writes the full page,
//! and syncs. Writing past the current end of file extends it. There is no
//! write-behind: a returned `write_page` means the bytes were handed to the
//! OS and flushed.
//!
//! A `read_page` of a page beyond EOF is not an error; it returns `false` so
//! the buffer pool can report a missing page as a soft miss. All other I/O
//! failures are fatal and propagate as `Err`.
//!
//! ## Thread Safety
//!
//! The file handle sits behind a `parking_lot::Mutex`, so the struct is
//! `Send + Sync`. Each operation is a single lock-seek-transfer sequence.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use parking_lot::Mutex;

use crate::config::{PageId, PAGE_SIZE};

pub struct DiskManager {
    file: Mutex<File>,
    path: PathBuf,
}

impl DiskManager {
    /// Opens the database file, creating it if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .wrap_err_with(|| format!("failed to open database file {}", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one full page at `page_id * PAGE_SIZE` and syncs to disk.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        debug_assert!(page_id >= 0, "write_page called with invalid page id");

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.file.lock();

        file.seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("failed to seek to page {page_id}"))?;
        file.write_all(data)
            .wrap_err_with(|| format!("failed to write page {page_id}"))?;
        file.sync_data()
            .wrap_err_with(|| format!("failed to sync page {page_id}"))?;

        Ok(())
    }

    /// Reads one full page into `data`. Returns `false` when the page lies
    /// beyond the end of the file (fewer than `PAGE_SIZE` bytes available).
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<bool> {
        debug_assert_eq!(data.len(), PAGE_SIZE);

        if page_id < 0 {
            return Ok(false);
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.file.lock();

        let file_len = file
            .metadata()
            .wrap_err("failed to stat database file")?
            .len();
        if offset + PAGE_SIZE as u64 > file_len {
            return Ok(false);
        }

        file.seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("failed to seek to page {page_id}"))?;
        file.read_exact(data)
            .wrap_err_with(|| format!("failed to read page {page_id}"))?;

        Ok(true)
    }

    /// File length divided by the page size.
    pub fn size_in_pages(&self) -> Result<u32> {
        let file = self.file.lock();
        let len = file
            .metadata()
            .wrap_err("failed to stat database file")?
            .len();
        Ok((len / PAGE_SIZE as u64) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_disk() -> (tempfile::TempDir, DiskManager) {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskManager::open(dir.path().join("test.db")).unwrap();
        (dir, disk)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, disk) = temp_disk();
        let mut page = [0u8; PAGE_SIZE];
        page[0] = 0xAB;
        page[PAGE_SIZE - 1] = 0xCD;

        disk.write_page(0, &page).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        assert!(disk.read_page(0, &mut out).unwrap());
        assert_eq!(out[0], 0xAB);
        assert_eq!(out[PAGE_SIZE - 1], 0xCD);
    }

    #[test]
    fn read_past_eof_returns_false() {
        let (_dir, disk) = temp_disk();
        let mut out = [0u8; PAGE_SIZE];

        assert!(!disk.read_page(0, &mut out).unwrap());
        assert!(!disk.read_page(7, &mut out).unwrap());
    }

    #[test]
    fn write_beyond_eof_extends_file() {
        let (_dir, disk) = temp_disk();
        let page = [0x11u8; PAGE_SIZE];

        disk.write_page(3, &page).unwrap();

        assert_eq!(disk.size_in_pages().unwrap(), 4);

        // The gap pages exist but were never written; reading them succeeds
        // with whatever the filesystem zero-filled.
        let mut out = [0xFFu8; PAGE_SIZE];
        assert!(disk.read_page(1, &mut out).unwrap());
        assert_eq!(out, [0u8; PAGE_SIZE]);
    }

    #[test]
    fn interleaved_writes_do_not_clobber() {
        let (_dir, disk) = temp_disk();
        let a = [0xAAu8; PAGE_SIZE];
        let b = [0xBBu8; PAGE_SIZE];

        disk.write_page(0, &a).unwrap();
        disk.write_page(1, &b).unwrap();
        disk.write_page(0, &a).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        assert!(disk.read_page(1, &mut out).unwrap());
        assert_eq!(out, b);
    }

    #[test]
    fn size_in_pages_counts_whole_pages() {
        let (_dir, disk) = temp_disk();
        assert_eq!(disk.size_in_pages().unwrap(), 0);

        disk.write_page(0, &[0u8; PAGE_SIZE]).unwrap();
        assert_eq!(disk.size_in_pages().unwrap(), 1);
    }
}
