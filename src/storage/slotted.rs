//! # Slotted Page Layout
//!
//! Data pages store variable-length records through a slot directory that
//! grows upward from the header while record payloads grow downward from the
//! end of the page:
//!
//! ```text
//! +--------------------+--------------------+------------+----------------+
//! | Header (12 bytes)  | Slot directory     | Free space | Record area    |
//! +--------------------+--------------------+------------+----------------+
//! 0                    12                   ^            ^                4096
//!                                           |            |
//!                                           dir tail     free_space_ptr
//! ```
//!
//! ## Header (12 bytes)
//!
//! ```text
//! Offset  Size  Field           Description
//! ------  ----  --------------  --------------------------------------
//! 0       4     next_page_id    Next page in the heap chain, or -1
//! 4       4     num_slots       Allocated slots; monotonic, append-only
//! 8       4     free_space_ptr  Low byte of the record area
//! ```
//!
//! Each directory slot is `(offset: u32, size: u32)`. A slot whose size is
//! zero is a tombstone: the record is deleted but the slot number stays
//! reserved forever, so record ids held elsewhere never alias a new row.
//! Payload bytes of tombstoned or relocated records are left in place; this
//! layout has no compaction.
//!
//! ## Views
//!
//! The same 4096 bytes are read through [`SlottedPage`] (shared view) or
//! mutated through [`SlottedPageMut`] (exclusive view). Both are plain
//! borrows of a pinned frame's buffer — the page bytes have exactly one
//! owner, the buffer pool frame.
//!
//! ## Invariants
//!
//! - `free_space_ptr >= 12 + num_slots * 8` at all times.
//! - For every live slot, `offset >= free_space_ptr` and
//!   `offset + size <= PAGE_SIZE`.
//! - `num_slots` never decreases.

use zerocopy::little_endian::{I32, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    PageId, SlotNum, INVALID_PAGE_ID, PAGE_SIZE, SLOTTED_HEADER_SIZE, SLOT_SIZE,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct SlottedHeader {
    next_page_id: I32,
    num_slots: U32,
    free_space_ptr: U32,
}

const _: () = assert!(std::mem::size_of::<SlottedHeader>() == SLOTTED_HEADER_SIZE);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct RecordSlot {
    offset: U32,
    size: U32,
}

const _: () = assert!(std::mem::size_of::<RecordSlot>() == SLOT_SIZE);

fn slot_range(slot_num: SlotNum) -> std::ops::Range<usize> {
    let start = SLOTTED_HEADER_SIZE + slot_num as usize * SLOT_SIZE;
    start..start + SLOT_SIZE
}

/// Shared (read-only) view over a slotted page.
pub struct SlottedPage<'a> {
    data: &'a [u8],
}

impl<'a> SlottedPage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    fn header(&self) -> &SlottedHeader {
        SlottedHeader::ref_from_bytes(&self.data[..SLOTTED_HEADER_SIZE])
            .expect("page buffer shorter than slotted header") // INVARIANT: views are built over full PAGE_SIZE buffers
    }

    fn slot(&self, slot_num: SlotNum) -> Option<RecordSlot> {
        if slot_num >= self.num_slots() {
            return None;
        }
        let bytes = &self.data[slot_range(slot_num)];
        Some(RecordSlot::read_from_bytes(bytes).expect("slot entry out of bounds"))
    }

    pub fn next_page_id(&self) -> PageId {
        self.header().next_page_id.get()
    }

    pub fn num_slots(&self) -> SlotNum {
        self.header().num_slots.get()
    }

    pub fn free_space_ptr(&self) -> u32 {
        self.header().free_space_ptr.get()
    }

    /// Bytes between the slot directory tail and the record area: the page's
    /// insertion capacity.
    pub fn free_space(&self) -> usize {
        let dir_tail = SLOTTED_HEADER_SIZE + self.num_slots() as usize * SLOT_SIZE;
        self.free_space_ptr() as usize - dir_tail
    }

    /// Returns the payload of a live record, or `None` for out-of-range and
    /// tombstoned slots.
    pub fn get(&self, slot_num: SlotNum) -> Option<&'a [u8]> {
        let slot = self.slot(slot_num)?;
        if slot.size.get() == 0 {
            return None;
        }
        let offset = slot.offset.get() as usize;
        let size = slot.size.get() as usize;
        Some(&self.data[offset..offset + size])
    }

    /// True when the slot exists and has not been tombstoned.
    pub fn is_live(&self, slot_num: SlotNum) -> bool {
        self.slot(slot_num).is_some_and(|s| s.size.get() != 0)
    }
}

/// Exclusive (mutating) view over a slotted page.
pub struct SlottedPageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> SlottedPageMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Formats a freshly allocated page: empty chain link, empty directory,
    /// record area starting at the end of the page.
    pub fn init(&mut self) {
        let header = SlottedHeader {
            next_page_id: I32::new(INVALID_PAGE_ID),
            num_slots: U32::new(0),
            free_space_ptr: U32::new(PAGE_SIZE as u32),
        };
        self.data[..SLOTTED_HEADER_SIZE].copy_from_slice(header.as_bytes());
    }

    fn header_mut(&mut self) -> &mut SlottedHeader {
        SlottedHeader::mut_from_bytes(&mut self.data[..SLOTTED_HEADER_SIZE])
            .expect("page buffer shorter than slotted header") // INVARIANT: views are built over full PAGE_SIZE buffers
    }

    fn write_slot(&mut self, slot_num: SlotNum, slot: RecordSlot) {
        self.data[slot_range(slot_num)].copy_from_slice(slot.as_bytes());
    }

    pub fn as_read(&self) -> SlottedPage<'_> {
        SlottedPage::new(self.data)
    }

    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        self.header_mut().next_page_id = I32::new(next_page_id);
    }

    /// Appends a record, returning its slot number, or `None` when the page
    /// cannot hold the payload plus one directory slot.
    pub fn insert(&mut self, record: &[u8]) -> Option<SlotNum> {
        let view = self.as_read();
        if view.free_space() < record.len() + SLOT_SIZE {
            return None;
        }

        let slot_num = view.num_slots();
        let new_ptr = view.free_space_ptr() as usize - record.len();

        self.data[new_ptr..new_ptr + record.len()].copy_from_slice(record);
        self.write_slot(
            slot_num,
            RecordSlot {
                offset: U32::new(new_ptr as u32),
                size: U32::new(record.len() as u32),
            },
        );

        let header = self.header_mut();
        header.num_slots = U32::new(slot_num + 1);
        header.free_space_ptr = U32::new(new_ptr as u32);

        Some(slot_num)
    }

    /// Tombstones a slot in place. The payload bytes are not reclaimed and
    /// the slot number is never reused.
    pub fn delete(&mut self, slot_num: SlotNum) -> bool {
        let Some(slot) = self.as_read().slot(slot_num) else {
            return false;
        };
        if slot.size.get() == 0 {
            return false;
        }

        self.write_slot(
            slot_num,
            RecordSlot {
                offset: slot.offset,
                size: U32::new(0),
            },
        );
        true
    }

    /// Rewrites a live record. Shrinking overwrites in place; growing takes a
    /// fresh region from the record area and repoints the slot, leaving the
    /// old payload as garbage. Fails when the slot is dead or the page has no
    /// room for a full new copy.
    pub fn update(&mut self, slot_num: SlotNum, record: &[u8]) -> bool {
        let Some(slot) = self.as_read().slot(slot_num) else {
            return false;
        };
        if slot.size.get() == 0 {
            return false;
        }

        if record.len() <= slot.size.get() as usize {
            let offset = slot.offset.get() as usize;
            self.data[offset..offset + record.len()].copy_from_slice(record);
            self.write_slot(
                slot_num,
                RecordSlot {
                    offset: slot.offset,
                    size: U32::new(record.len() as u32),
                },
            );
            return true;
        }

        // Growing copy: no new slot is added, so only the payload must fit.
        let view = self.as_read();
        if view.free_space() < record.len() {
            return false;
        }

        let new_ptr = view.free_space_ptr() as usize - record.len();
        self.data[new_ptr..new_ptr + record.len()].copy_from_slice(record);
        self.write_slot(
            slot_num,
            RecordSlot {
                offset: U32::new(new_ptr as u32),
                size: U32::new(record.len() as u32),
            },
        );
        self.header_mut().free_space_ptr = U32::new(new_ptr as u32);

        true
    }
}
