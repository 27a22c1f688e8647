//! Byte-level codec for B+Tree node pages. A node page is the same
//! `PAGE_SIZE` block a slotted data page uses, read under a different
//! interpretation: a 20-byte header, then a key array, then a value array
//! whose element width (and whose element *meaning*) depends on whether the
//! node is a leaf or an internal node. Every offset below is computed from
//! the page's own `max_size` field, never from a compile-time constant —
//! that's what lets different trees (or the same tree's tests) pick
//! different orders.

use crate::pages::{Page, PageId, RecordId};

/// `page_type(4) + parent_page_id(4) + current_size(4) + max_size(4) + next_page_id(4)`.
pub const HEADER_SIZE: usize = 20;
pub const KEY_SIZE: usize = 4;
pub const INTERNAL_VALUE_SIZE: usize = 4;
pub const LEAF_VALUE_SIZE: usize = RecordId::ENCODED_SIZE;

/// The largest `max_size` that leaves room for at least one key/value pair
/// of the widest kind this format stores (a leaf entry, at 4+6=10 bytes,
/// is the tight case) inside one `PAGE_SIZE` page alongside the header.
pub const MAX_ORDER: u32 = (crate::pages::PAGE_SIZE as u32 - HEADER_SIZE as u32)
    / (KEY_SIZE as u32 + LEAF_VALUE_SIZE as u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Internal,
    Leaf,
}

impl PageType {
    fn to_u32(self) -> u32 {
        match self {
            PageType::Internal => 0,
            PageType::Leaf => 1,
        }
    }

    fn from_u32(v: u32) -> Self {
        if v == 1 {
            PageType::Leaf
        } else {
            PageType::Internal
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub page_type: PageType,
    pub parent_page_id: PageId,
    pub current_size: u32,
    pub max_size: u32,
    /// Leaf-only: the next leaf to the right, 0 if this is the rightmost.
    /// Unused by internal nodes.
    pub next_page_id: PageId,
}

pub fn read_header(page: &Page) -> Header {
    let b = page.read_bytes(0, HEADER_SIZE);
    Header {
        page_type: PageType::from_u32(u32::from_le_bytes(b[0..4].try_into().unwrap())),
        parent_page_id: u32::from_le_bytes(b[4..8].try_into().unwrap()),
        current_size: u32::from_le_bytes(b[8..12].try_into().unwrap()),
        max_size: u32::from_le_bytes(b[12..16].try_into().unwrap()),
        next_page_id: u32::from_le_bytes(b[16..20].try_into().unwrap()),
    }
}

pub fn write_header(page: &mut Page, header: &Header) {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(&header.page_type.to_u32().to_le_bytes());
    buf[4..8].copy_from_slice(&header.parent_page_id.to_le_bytes());
    buf[8..12].copy_from_slice(&header.current_size.to_le_bytes());
    buf[12..16].copy_from_slice(&header.max_size.to_le_bytes());
    buf[16..20].copy_from_slice(&header.next_page_id.to_le_bytes());
    page.write_bytes(0, HEADER_SIZE, &buf);
}

pub fn init(page: &mut Page, page_type: PageType, parent_page_id: PageId, max_size: u32) {
    *page.raw_mut() = [0u8; crate::pages::PAGE_SIZE];
    write_header(
        page,
        &Header {
            page_type,
            parent_page_id,
            current_size: 0,
            max_size,
            next_page_id: 0,
        },
    );
}

fn key_offset(idx: u32) -> usize {
    HEADER_SIZE + idx as usize * KEY_SIZE
}

pub fn key_at(page: &Page, idx: u32) -> u32 {
    let off = key_offset(idx);
    u32::from_le_bytes(page.read_bytes(off, off + KEY_SIZE).try_into().unwrap())
}

pub fn set_key_at(page: &mut Page, idx: u32, key: u32) {
    let off = key_offset(idx);
    page.write_bytes(off, off + KEY_SIZE, &key.to_le_bytes());
}

/// Binary search for the first index whose key is `>= key`. Returns
/// `current_size` if every key is smaller (the "insert at the end" case).
pub fn lower_bound(page: &Page, header: &Header, key: u32) -> u32 {
    let mut low = 0i64;
    let mut high = header.current_size as i64 - 1;
    let mut index = header.current_size as i64;
    while low <= high {
        let mid = low + (high - low) / 2;
        if key_at(page, mid as u32) >= key {
            index = mid;
            high = mid - 1;
        } else {
            low = mid + 1;
        }
    }
    index as u32
}

fn leaf_values_offset(max_size: u32) -> usize {
    HEADER_SIZE + max_size as usize * KEY_SIZE
}

pub fn leaf_value_at(page: &Page, idx: u32, max_size: u32) -> RecordId {
    let off = leaf_values_offset(max_size) + idx as usize * LEAF_VALUE_SIZE;
    RecordId::from_bytes(page.read_bytes(off, off + LEAF_VALUE_SIZE))
}

pub fn set_leaf_value_at(page: &mut Page, idx: u32, value: RecordId, max_size: u32) {
    let off = leaf_values_offset(max_size) + idx as usize * LEAF_VALUE_SIZE;
    page.write_bytes(off, off + LEAF_VALUE_SIZE, &value.to_bytes());
}

/// Shifts `[from, current_size)` one slot to the right, making room at
/// `from` for both the key and value arrays. Used by insert and nowhere
/// else — a shrink (delete) is out of scope.
pub fn shift_leaf_right(page: &mut Page, header: &Header, from: u32) {
    for i in (from..header.current_size).rev() {
        let k = key_at(page, i);
        let v = leaf_value_at(page, i, header.max_size);
        set_key_at(page, i + 1, k);
        set_leaf_value_at(page, i + 1, v, header.max_size);
    }
}

fn internal_children_offset(max_size: u32) -> usize {
    HEADER_SIZE + max_size as usize * KEY_SIZE
}

pub fn internal_child_at(page: &Page, idx: u32, max_size: u32) -> PageId {
    let off = internal_children_offset(max_size) + idx as usize * INTERNAL_VALUE_SIZE;
    u32::from_le_bytes(page.read_bytes(off, off + INTERNAL_VALUE_SIZE).try_into().unwrap())
}

pub fn set_internal_child_at(page: &mut Page, idx: u32, child: PageId, max_size: u32) {
    let off = internal_children_offset(max_size) + idx as usize * INTERNAL_VALUE_SIZE;
    page.write_bytes(off, off + INTERNAL_VALUE_SIZE, &child.to_le_bytes());
}

/// An internal node with `n` keys carries `n + 1` children: `children[i]`
/// holds everything with a key `< keys[i]`, `children[n]` holds everything
/// `>= keys[n-1]`. Returns the child to follow for `key`.
pub fn internal_lookup(page: &Page, header: &Header, key: u32) -> PageId {
    let idx = lower_bound(page, header, key);
    let idx = if idx < header.current_size && key_at(page, idx) == key {
        idx + 1
    } else {
        idx
    };
    internal_child_at(page, idx, header.max_size)
}

/// Shifts keys `[from, current_size)` and children `[from + 1, current_size + 1)`
/// one slot to the right, making room to insert a separator key at `from`
/// and its right child at `from + 1`.
pub fn shift_internal_right(page: &mut Page, header: &Header, from: u32) {
    for i in (from..header.current_size).rev() {
        let k = key_at(page, i);
        set_key_at(page, i + 1, k);
    }
    for i in (from + 1..header.current_size + 1).rev() {
        let c = internal_child_at(page, i - 1, header.max_size);
        set_internal_child_at(page, i, c, header.max_size);
    }
}
