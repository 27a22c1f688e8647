//! A disk-backed B+Tree keyed by `u32`, storing `RecordId` values at its
//! leaves. The root always lives at page 0 — when the root splits, its
//! current contents are relocated to a freshly allocated page and page 0 is
//! re-initialized as the new internal root, so callers never need a
//! separate pointer to "wherever the root currently is."

pub mod node;

use anyhow::{anyhow, Result};

use crate::buffer_pool::{ArcBufferPool, BufferPoolManager};
use crate::errors::Error;
use crate::pages::{FrameId, PageId, RecordId};
use crate::printdbg;

use node::{Header, PageType, MAX_ORDER};

/// `object_type` used for every page this index owns (both the slotted-page
/// data pages and these B+Tree node pages share the page format, but never
/// the same page at once — this tag just distinguishes them on disk).
/// Defined in `pages` so `buffer_pool::new_page` can gate its header write
/// on it without depending on this module.
pub use crate::pages::OBJECT_TYPE_BTREE;

pub struct BPlusTree {
    root_page_id: PageId,
    max_size: u32,
    bpm: ArcBufferPool,
}

impl BPlusTree {
    /// Either adopts an already-valid B+Tree header at page 0, or allocates
    /// a fresh leaf there. `max_size` is only honored on first creation —
    /// reopening an existing file keeps whatever order it was built with.
    pub fn bootstrap(bpm: ArcBufferPool, max_size: u32) -> Result<Self> {
        if max_size == 0 || max_size > MAX_ORDER {
            return Err(anyhow!(
                "max_size must be between 1 and {MAX_ORDER}, got {max_size}"
            ));
        }

        let mut guard = bpm.lock();
        let root_max_size = match guard.fetch_page(0) {
            Ok(frame_id) => {
                let header = node::read_header(guard.page(frame_id));
                guard.unpin_page(0, false)?;
                if header.max_size == 0 || header.max_size > MAX_ORDER {
                    return Err(Error::CorruptPage(format!(
                        "page 0 has an invalid B+Tree header (max_size={})",
                        header.max_size
                    ))
                    .into());
                }
                printdbg!("[index] adopted existing root at page 0, max_size {}", header.max_size);
                header.max_size
            }
            Err(_) => {
                let page_id = guard.new_page(OBJECT_TYPE_BTREE)?;
                debug_assert_eq!(page_id, 0, "the B+Tree root must bootstrap at page 0");
                let frame_id = guard.frame_of(page_id).expect("page just created is resident");
                node::init(guard.page_mut(frame_id), PageType::Leaf, 0, max_size);
                guard.unpin_page(page_id, true)?;
                printdbg!("[index] bootstrapped a fresh leaf root, max_size {}", max_size);
                max_size
            }
        };
        drop(guard);

        Ok(Self {
            root_page_id: 0,
            max_size: root_max_size,
            bpm,
        })
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn get_value(&self, key: u32) -> Result<Option<RecordId>> {
        let mut guard = self.bpm.lock();
        let (leaf_page_id, frame_id) = Self::find_leaf(&mut guard, self.root_page_id, key)?;
        let header = node::read_header(guard.page(frame_id));
        let idx = node::lower_bound(guard.page(frame_id), &header, key);
        let found = if idx < header.current_size && node::key_at(guard.page(frame_id), idx) == key {
            Some(node::leaf_value_at(guard.page(frame_id), idx, header.max_size))
        } else {
            None
        };
        guard.unpin_page(leaf_page_id, false)?;
        Ok(found)
    }

    pub fn exists(&self, key: u32) -> Result<bool> {
        Ok(self.get_value(key)?.is_some())
    }

    /// Inserts `key -> value`. Returns `Ok(false)` without mutating the tree
    /// if `key` is already present.
    pub fn insert(&mut self, key: u32, value: RecordId) -> Result<bool> {
        let mut guard = self.bpm.lock();
        let root_page_id = self.root_page_id;
        self.insert_into_page(&mut guard, root_page_id, key, value)
    }

    fn find_leaf(bpm: &mut BufferPoolManager, start: PageId, key: u32) -> Result<(PageId, FrameId)> {
        let mut page_id = start;
        loop {
            let frame_id = bpm.fetch_page(page_id)?;
            let header = node::read_header(bpm.page(frame_id));
            if header.page_type == PageType::Leaf {
                return Ok((page_id, frame_id));
            }
            let child = node::internal_lookup(bpm.page(frame_id), &header, key);
            bpm.unpin_page(page_id, false)?;
            page_id = child;
        }
    }

    fn insert_into_page(
        &mut self,
        bpm: &mut BufferPoolManager,
        page_id: PageId,
        key: u32,
        value: RecordId,
    ) -> Result<bool> {
        let frame_id = bpm.fetch_page(page_id)?;
        let header = node::read_header(bpm.page(frame_id));

        if header.page_type != PageType::Leaf {
            let child = node::internal_lookup(bpm.page(frame_id), &header, key);
            bpm.unpin_page(page_id, false)?;
            return self.insert_into_page(bpm, child, key, value);
        }

        let idx = node::lower_bound(bpm.page(frame_id), &header, key);
        if idx < header.current_size && node::key_at(bpm.page(frame_id), idx) == key {
            bpm.unpin_page(page_id, false)?;
            return Ok(false);
        }

        if header.current_size < header.max_size {
            node::shift_leaf_right(bpm.page_mut(frame_id), &header, idx);
            node::set_key_at(bpm.page_mut(frame_id), idx, key);
            node::set_leaf_value_at(bpm.page_mut(frame_id), idx, value, header.max_size);
            let mut new_header = header;
            new_header.current_size += 1;
            node::write_header(bpm.page_mut(frame_id), &new_header);
            bpm.unpin_page(page_id, true)?;
            return Ok(true);
        }

        let (median_key, sibling_page_id) = self.split_leaf(bpm, page_id, frame_id, &header)?;
        let target_page_id = if key < median_key { page_id } else { sibling_page_id };
        self.insert_into_leaf_no_split(bpm, target_page_id, key, value)?;
        self.propagate_split(bpm, page_id, median_key, sibling_page_id, header.parent_page_id)?;
        Ok(true)
    }

    fn insert_into_leaf_no_split(
        &mut self,
        bpm: &mut BufferPoolManager,
        page_id: PageId,
        key: u32,
        value: RecordId,
    ) -> Result<()> {
        let frame_id = bpm.fetch_page(page_id)?;
        let header = node::read_header(bpm.page(frame_id));
        let idx = node::lower_bound(bpm.page(frame_id), &header, key);
        node::shift_leaf_right(bpm.page_mut(frame_id), &header, idx);
        node::set_key_at(bpm.page_mut(frame_id), idx, key);
        node::set_leaf_value_at(bpm.page_mut(frame_id), idx, value, header.max_size);
        let mut new_header = header;
        new_header.current_size += 1;
        node::write_header(bpm.page_mut(frame_id), &new_header);
        bpm.unpin_page(page_id, true)?;
        Ok(())
    }

    /// Moves the upper half of `left_page_id`'s entries to a freshly
    /// allocated sibling leaf, threading the leaf-chain `next_page_id`
    /// pointer through it. Returns the sibling's first key (the value that
    /// gets promoted to the parent) and the sibling's page id.
    fn split_leaf(
        &mut self,
        bpm: &mut BufferPoolManager,
        left_page_id: PageId,
        left_frame_id: FrameId,
        left_header: &Header,
    ) -> Result<(u32, PageId)> {
        let max_size = left_header.max_size;
        let mid = (max_size + 1) / 2;
        let move_count = max_size - mid;

        let sibling_page_id = bpm.new_page(OBJECT_TYPE_BTREE)?;
        let sibling_frame_id = bpm.frame_of(sibling_page_id).expect("page just created is resident");
        node::init(bpm.page_mut(sibling_frame_id), PageType::Leaf, left_header.parent_page_id, max_size);

        for i in 0..move_count {
            let k = node::key_at(bpm.page(left_frame_id), mid + i);
            let v = node::leaf_value_at(bpm.page(left_frame_id), mid + i, max_size);
            node::set_key_at(bpm.page_mut(sibling_frame_id), i, k);
            node::set_leaf_value_at(bpm.page_mut(sibling_frame_id), i, v, max_size);
        }

        let mut sibling_header = node::read_header(bpm.page(sibling_frame_id));
        sibling_header.current_size = move_count;
        sibling_header.next_page_id = left_header.next_page_id;
        node::write_header(bpm.page_mut(sibling_frame_id), &sibling_header);

        let mut new_left_header = *left_header;
        new_left_header.current_size = mid;
        new_left_header.next_page_id = sibling_page_id;
        node::write_header(bpm.page_mut(left_frame_id), &new_left_header);

        let median_key = node::key_at(bpm.page(sibling_frame_id), 0);

        bpm.unpin_page(sibling_page_id, true)?;
        bpm.unpin_page(left_page_id, true)?;

        printdbg!("[index] split leaf {} -> {}, median key {}", left_page_id, sibling_page_id, median_key);
        Ok((median_key, sibling_page_id))
    }

    /// Inserts a separator key and its right child into an internal node,
    /// splitting it first if it's already full.
    fn insert_into_internal(
        &mut self,
        bpm: &mut BufferPoolManager,
        page_id: PageId,
        key: u32,
        right_child: PageId,
    ) -> Result<()> {
        let frame_id = bpm.fetch_page(page_id)?;
        let header = node::read_header(bpm.page(frame_id));

        if header.current_size < header.max_size {
            let idx = node::lower_bound(bpm.page(frame_id), &header, key);
            node::shift_internal_right(bpm.page_mut(frame_id), &header, idx);
            node::set_key_at(bpm.page_mut(frame_id), idx, key);
            node::set_internal_child_at(bpm.page_mut(frame_id), idx + 1, right_child, header.max_size);
            let mut new_header = header;
            new_header.current_size += 1;
            node::write_header(bpm.page_mut(frame_id), &new_header);
            bpm.unpin_page(page_id, true)?;
            self.set_parent(bpm, right_child, page_id)?;
            return Ok(());
        }

        let (median_key, sibling_page_id) =
            self.split_internal(bpm, page_id, frame_id, &header, key, right_child)?;
        self.propagate_split(bpm, page_id, median_key, sibling_page_id, header.parent_page_id)
    }

    /// Builds the combined (existing + new) key/child arrays in memory,
    /// splits them around the middle key, writes the left half back in
    /// place and the right half to a new sibling page, and re-parents every
    /// child that ended up on the sibling side.
    fn split_internal(
        &mut self,
        bpm: &mut BufferPoolManager,
        left_page_id: PageId,
        left_frame_id: FrameId,
        left_header: &Header,
        new_key: u32,
        new_right_child: PageId,
    ) -> Result<(u32, PageId)> {
        let order = left_header.max_size;
        let n = left_header.current_size;

        let mut keys: Vec<u32> = (0..n).map(|i| node::key_at(bpm.page(left_frame_id), i)).collect();
        let mut children: Vec<PageId> = (0..=n)
            .map(|i| node::internal_child_at(bpm.page(left_frame_id), i, order))
            .collect();

        let idx = node::lower_bound(bpm.page(left_frame_id), left_header, new_key) as usize;
        keys.insert(idx, new_key);
        children.insert(idx + 1, new_right_child);

        let mid = keys.len() / 2;
        let median_key = keys[mid];

        let left_keys = keys[..mid].to_vec();
        let left_children = children[..=mid].to_vec();
        let right_keys = keys[mid + 1..].to_vec();
        let right_children = children[mid + 1..].to_vec();

        let sibling_page_id = bpm.new_page(OBJECT_TYPE_BTREE)?;
        let sibling_frame_id = bpm.frame_of(sibling_page_id).expect("page just created is resident");
        node::init(bpm.page_mut(sibling_frame_id), PageType::Internal, left_header.parent_page_id, order);
        for (i, &k) in right_keys.iter().enumerate() {
            node::set_key_at(bpm.page_mut(sibling_frame_id), i as u32, k);
        }
        for (i, &c) in right_children.iter().enumerate() {
            node::set_internal_child_at(bpm.page_mut(sibling_frame_id), i as u32, c, order);
        }
        let mut sibling_header = node::read_header(bpm.page(sibling_frame_id));
        sibling_header.current_size = right_keys.len() as u32;
        node::write_header(bpm.page_mut(sibling_frame_id), &sibling_header);

        for (i, &k) in left_keys.iter().enumerate() {
            node::set_key_at(bpm.page_mut(left_frame_id), i as u32, k);
        }
        for (i, &c) in left_children.iter().enumerate() {
            node::set_internal_child_at(bpm.page_mut(left_frame_id), i as u32, c, order);
        }
        let mut new_left_header = *left_header;
        new_left_header.current_size = left_keys.len() as u32;
        node::write_header(bpm.page_mut(left_frame_id), &new_left_header);

        bpm.unpin_page(sibling_page_id, true)?;
        bpm.unpin_page(left_page_id, true)?;

        for child_page_id in right_children {
            self.set_parent(bpm, child_page_id, sibling_page_id)?;
        }

        printdbg!("[index] split internal {} -> {}, median key {}", left_page_id, sibling_page_id, median_key);
        Ok((median_key, sibling_page_id))
    }

    /// Propagates a split result upward: into the parent if there is one,
    /// or into a brand-new root if `left_page_id` was the root.
    fn propagate_split(
        &mut self,
        bpm: &mut BufferPoolManager,
        left_page_id: PageId,
        median_key: u32,
        sibling_page_id: PageId,
        parent_page_id: PageId,
    ) -> Result<()> {
        if left_page_id == self.root_page_id {
            self.create_new_root(bpm, median_key, sibling_page_id)
        } else {
            self.insert_into_internal(bpm, parent_page_id, median_key, sibling_page_id)
        }
    }

    /// The root page id never changes — when the root splits, its current
    /// bytes are relocated to a fresh page and page 0 is rebuilt as the new
    /// internal root over `{relocated root, sibling}`.
    fn create_new_root(&mut self, bpm: &mut BufferPoolManager, median_key: u32, right_page_id: PageId) -> Result<()> {
        let root_frame_id = bpm.fetch_page(self.root_page_id)?;
        let root_bytes = *bpm.page(root_frame_id).raw();
        bpm.unpin_page(self.root_page_id, false)?;

        let left_page_id = bpm.new_page(OBJECT_TYPE_BTREE)?;
        let left_frame_id = bpm.frame_of(left_page_id).expect("page just created is resident");
        *bpm.page_mut(left_frame_id).raw_mut() = root_bytes;
        let mut left_header = node::read_header(bpm.page(left_frame_id));
        left_header.parent_page_id = self.root_page_id;
        node::write_header(bpm.page_mut(left_frame_id), &left_header);
        bpm.unpin_page(left_page_id, true)?;

        self.set_parent(bpm, right_page_id, self.root_page_id)?;

        let new_root_frame_id = bpm.fetch_page(self.root_page_id)?;
        node::init(bpm.page_mut(new_root_frame_id), PageType::Internal, 0, self.max_size);
        let mut new_root_header = node::read_header(bpm.page(new_root_frame_id));
        new_root_header.current_size = 1;
        node::write_header(bpm.page_mut(new_root_frame_id), &new_root_header);
        node::set_key_at(bpm.page_mut(new_root_frame_id), 0, median_key);
        node::set_internal_child_at(bpm.page_mut(new_root_frame_id), 0, left_page_id, self.max_size);
        node::set_internal_child_at(bpm.page_mut(new_root_frame_id), 1, right_page_id, self.max_size);
        bpm.unpin_page(self.root_page_id, true)?;

        printdbg!(
            "[index] grew a new root over relocated page {} and {}, median key {}",
            left_page_id,
            right_page_id,
            median_key
        );
        Ok(())
    }

    fn set_parent(&mut self, bpm: &mut BufferPoolManager, page_id: PageId, parent_page_id: PageId) -> Result<()> {
        let frame_id = bpm.fetch_page(page_id)?;
        let mut header = node::read_header(bpm.page(frame_id));
        header.parent_page_id = parent_page_id;
        node::write_header(bpm.page_mut(frame_id), &header);
        bpm.unpin_page(page_id, true)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPoolManager;
    use crate::disk_manager::test_path;

    fn tree(max_size: u32) -> BPlusTree {
        let bpm = BufferPoolManager::new(64, &test_path()).unwrap();
        BPlusTree::bootstrap(bpm, max_size).unwrap()
    }

    fn rid(page_id: u32, slot_num: u16) -> RecordId {
        RecordId { page_id, slot_num }
    }

    #[test]
    fn insert_and_find_a_single_key() {
        let mut t = tree(4);
        assert!(t.insert(10, rid(100, 0)).unwrap());
        assert_eq!(t.get_value(10).unwrap(), Some(rid(100, 0)));
    }

    #[test]
    fn insert_and_find_several_keys_out_of_order() {
        let mut t = tree(4);
        for (i, key) in [30u32, 10, 20, 5].into_iter().enumerate() {
            assert!(t.insert(key, rid(key, i as u16)).unwrap());
        }
        for key in [30u32, 10, 20, 5] {
            assert_eq!(t.get_value(key).unwrap().unwrap().page_id, key);
        }
    }

    #[test]
    fn search_for_a_missing_key_returns_none() {
        let mut t = tree(4);
        t.insert(1, rid(1, 0)).unwrap();
        assert_eq!(t.get_value(999).unwrap(), None);
    }

    #[test]
    fn duplicate_insert_is_rejected_and_leaves_the_tree_unchanged() {
        let mut t = tree(4);
        assert!(t.insert(7, rid(1, 0)).unwrap());
        assert!(!t.insert(7, rid(2, 0)).unwrap());
        assert_eq!(t.get_value(7).unwrap(), Some(rid(1, 0)));
    }

    #[test]
    fn root_splits_once_it_overflows() {
        // max_size 4: the 5th insert forces the leaf root to split and grow a new root
        let mut t = tree(4);
        for key in 1..=5u32 {
            t.insert(key, rid(key, 0)).unwrap();
        }
        for key in 1..=5u32 {
            assert_eq!(t.get_value(key).unwrap().unwrap().page_id, key);
        }
    }

    #[test]
    fn enough_inserts_grow_a_height_three_tree() {
        let mut t = tree(4);
        for key in 1..=40u32 {
            assert!(t.insert(key, rid(key, 0)).unwrap());
        }
        for key in 1..=40u32 {
            assert_eq!(t.get_value(key).unwrap().unwrap().page_id, key, "missing key {key}");
        }
        assert_eq!(t.get_value(41).unwrap(), None);
    }

    #[test]
    fn bootstrap_rejects_an_oversized_max_size() {
        let bpm = BufferPoolManager::new(4, &test_path()).unwrap();
        assert!(BPlusTree::bootstrap(bpm, MAX_ORDER + 1).is_err());
    }

    #[test]
    fn persistence_across_restart_at_literal_spec_scale() {
        // Scenario 6: pool_size=10, 260 keys k_i = 10*i for i in 1..=260,
        // value={1,i} — small enough a pool to force real eviction churn
        // across both data-page-sized index growth and the dirty flush on
        // close, not just a couple of splits.
        let path = test_path();
        {
            let bpm = BufferPoolManager::new(10, &path).unwrap();
            let mut t = BPlusTree::bootstrap(bpm, 4).unwrap();
            for i in 1..=260u32 {
                assert!(t.insert(10 * i, rid(1, i as u16)).unwrap());
            }
        }

        let bpm = BufferPoolManager::new(10, &path).unwrap();
        let t = BPlusTree::bootstrap(bpm, 4).unwrap();
        for i in 1..=260u32 {
            assert_eq!(t.get_value(10 * i).unwrap(), Some(rid(1, i as u16)), "missing key {}", 10 * i);
        }
        assert_eq!(t.get_value(5).unwrap(), None);
        assert_eq!(t.get_value(2605).unwrap(), None);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn reopening_keeps_the_inserted_keys() {
        let path = test_path();
        {
            let bpm = BufferPoolManager::new(16, &path).unwrap();
            let mut t = BPlusTree::bootstrap(bpm, 4).unwrap();
            for key in 1..=10u32 {
                t.insert(key, rid(key, 0)).unwrap();
            }
        }

        let bpm = BufferPoolManager::new(16, &path).unwrap();
        let t = BPlusTree::bootstrap(bpm, 4).unwrap();
        for key in 1..=10u32 {
            assert_eq!(t.get_value(key).unwrap().unwrap().page_id, key);
        }
        std::fs::remove_file(&path).ok();
    }
}
