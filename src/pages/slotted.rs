//! The slotted-page record layout: a fixed-size page carries a small header,
//! a slot directory that grows downward from just after the header, and a
//! record heap that grows upward from the end of the page. New records are
//! appended to the heap and get the next slot index in order — there is no
//! compaction and no slot reuse after a (not-yet-implemented) delete.

use crate::errors::Error;

use super::{PageId, SlotId, PAGE_SIZE};

/// `page_id(4) + object_type(4) + slot_count(2) + free_ptr(2)`.
pub const PAGE_HEADER_SIZE: usize = 12;

/// `offset(2) + size(2)`.
pub const SLOT_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_id: PageId,
    pub object_type: u32,
    pub slot_count: u16,
    pub free_ptr: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub offset: u16,
    pub size: u16,
}

/// A `PAGE_SIZE`-byte block of memory, read and written only through the
/// accessors below — nothing here ever reinterprets the buffer as a struct.
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Default for Page {
    fn default() -> Self {
        Page {
            data: [0u8; PAGE_SIZE],
        }
    }
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn raw_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    pub fn from_raw(data: [u8; PAGE_SIZE]) -> Self {
        Page { data }
    }

    /// Raw byte-range access for interpretations of the page other than the
    /// slotted layout (the B+Tree node views live entirely on top of this).
    pub fn read_bytes(&self, start: usize, end: usize) -> &[u8] {
        &self.data[start..end]
    }

    pub fn write_bytes(&mut self, start: usize, end: usize, bytes: &[u8]) {
        self.data[start..end].copy_from_slice(bytes);
    }

    /// Resets the page to an empty slotted page owned by `page_id`.
    pub fn init(&mut self, page_id: PageId, object_type: u32) {
        self.data = [0u8; PAGE_SIZE];
        self.write_header(&PageHeader {
            page_id,
            object_type,
            slot_count: 0,
            free_ptr: PAGE_SIZE as u16,
        });
    }

    /// Zeroes the page and writes only the `page_id`/`object_type` pair at
    /// its head. For page kinds whose own codec (the B+Tree node codec, in
    /// particular) writes a different header shape over the same bytes
    /// immediately afterward, so the full slotted header below would just
    /// be overwritten anyway.
    pub fn stamp(&mut self, page_id: PageId, object_type: u32) {
        self.data = [0u8; PAGE_SIZE];
        self.data[0..4].copy_from_slice(&page_id.to_le_bytes());
        self.data[4..8].copy_from_slice(&object_type.to_le_bytes());
    }

    pub fn header(&self) -> PageHeader {
        PageHeader {
            page_id: u32::from_le_bytes(self.data[0..4].try_into().unwrap()),
            object_type: u32::from_le_bytes(self.data[4..8].try_into().unwrap()),
            slot_count: u16::from_le_bytes(self.data[8..10].try_into().unwrap()),
            free_ptr: u16::from_le_bytes(self.data[10..12].try_into().unwrap()),
        }
    }

    fn write_header(&mut self, header: &PageHeader) {
        self.data[0..4].copy_from_slice(&header.page_id.to_le_bytes());
        self.data[4..8].copy_from_slice(&header.object_type.to_le_bytes());
        self.data[8..10].copy_from_slice(&header.slot_count.to_le_bytes());
        self.data[10..12].copy_from_slice(&header.free_ptr.to_le_bytes());
    }

    fn slot_at(&self, idx: u16) -> Slot {
        let off = PAGE_HEADER_SIZE + idx as usize * SLOT_SIZE;
        Slot {
            offset: u16::from_le_bytes(self.data[off..off + 2].try_into().unwrap()),
            size: u16::from_le_bytes(self.data[off + 2..off + 4].try_into().unwrap()),
        }
    }

    fn write_slot(&mut self, idx: u16, slot: Slot) {
        let off = PAGE_HEADER_SIZE + idx as usize * SLOT_SIZE;
        self.data[off..off + 2].copy_from_slice(&slot.offset.to_le_bytes());
        self.data[off + 2..off + 4].copy_from_slice(&slot.size.to_le_bytes());
    }

    /// Bytes available between the end of the slot directory and the start
    /// of the record heap.
    pub fn free_space(&self) -> usize {
        let header = self.header();
        let slots_end = PAGE_HEADER_SIZE + header.slot_count as usize * SLOT_SIZE;
        header.free_ptr as usize - slots_end
    }

    /// Appends `record` to the heap and allocates it the next slot index.
    pub fn insert_record(&mut self, record: &[u8]) -> Result<SlotId, Error> {
        if record.is_empty() {
            return Err(Error::CorruptPage("cannot insert an empty record".into()));
        }

        let needed = record.len() + SLOT_SIZE;
        if self.free_space() < needed {
            let capacity = self.free_space().saturating_sub(SLOT_SIZE);
            return Err(Error::RecordTooLarge {
                size: record.len(),
                capacity,
            });
        }

        let mut header = self.header();
        header.free_ptr -= record.len() as u16;
        let offset = header.free_ptr;
        self.data[offset as usize..offset as usize + record.len()].copy_from_slice(record);

        let slot_idx = header.slot_count;
        self.write_slot(
            slot_idx,
            Slot {
                offset,
                size: record.len() as u16,
            },
        );
        header.slot_count += 1;
        self.write_header(&header);
        Ok(slot_idx)
    }

    /// Returns the bytes for `slot_idx`, or `None` if the slot was never
    /// allocated (no delete support, so any index below `slot_count` is live).
    pub fn record(&self, slot_idx: SlotId) -> Option<&[u8]> {
        let header = self.header();
        if slot_idx >= header.slot_count {
            return None;
        }
        let slot = self.slot_at(slot_idx);
        Some(&self.data[slot.offset as usize..slot.offset as usize + slot.size as usize])
    }
}
