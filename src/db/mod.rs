//! The typed key-value façade: combines the buffer pool, the B+Tree index,
//! and the slotted data pages into `open`/`insert`/`find`/`exists`/`remove`.
//! A record's storage is two-step — serialize it onto its own data page,
//! then index `key -> RecordId` pointing at that page/slot — and the two
//! steps are not transactional: a crash between them leaves an unindexed
//! page on disk, never a dangling index entry.

use anyhow::Result;

use crate::buffer_pool::{ArcBufferPool, BufferPoolManager};
use crate::errors::Error;
use crate::index::{node, BPlusTree};
use crate::model::{ModelType, Record, Storable};
use crate::pages::RecordId;
use crate::printdbg;

pub struct Database {
    bpm: ArcBufferPool,
    index: BPlusTree,
    path: String,
}

impl Database {
    /// Opens `path`, creating it if it doesn't exist. `buffer_pool_size` is
    /// the number of frames held in memory at once, shared by the index and
    /// every stored record's data pages.
    pub fn open(path: &str, buffer_pool_size: usize) -> Result<Self> {
        printdbg!("[db] opening database at {}", path);
        let bpm = BufferPoolManager::new(buffer_pool_size, path)?;
        let index = BPlusTree::bootstrap(bpm.clone(), node::MAX_ORDER)?;
        printdbg!("[db] ready, B+Tree order {}", index.max_size());
        Ok(Self {
            bpm,
            index,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stores `obj` under `key`. Returns `Ok(false)` without writing
    /// anything if `key` is already present — checked before any page is
    /// allocated, so a duplicate never leaves an orphaned data page behind.
    pub fn insert<T: Storable>(&mut self, key: u32, obj: &T) -> Result<bool> {
        if self.index.exists(key)? {
            return Ok(false);
        }

        let record_id = self.store_object(obj)?;
        let inserted = self.index.insert(key, record_id)?;
        debug_assert!(inserted, "key was checked absent just above, under the same lock holder");
        Ok(inserted)
    }

    /// Looks up `key` and deserializes its record as `T`. `T` must be the
    /// same type the value was inserted as — nothing on disk records which
    /// type a key holds.
    pub fn find<T: Storable>(&self, key: u32) -> Result<T> {
        let record_id = self.index.get_value(key)?.ok_or(Error::NotFound(key))?;
        let buffer = self.retrieve_object_buffer(record_id)?;
        Ok(T::deserialize(&buffer)?)
    }

    pub fn exists(&self, key: u32) -> Result<bool> {
        self.index.exists(key)
    }

    /// Looks up `key` without the caller naming its stored type ahead of
    /// time, dispatching on the data page's own `object_type` tag instead —
    /// the same job `original_source`'s `ModelFactory::create(ModelType)`
    /// does for a caller that only has a runtime type.
    pub fn find_any(&self, key: u32) -> Result<Record> {
        let record_id = self.index.get_value(key)?.ok_or(Error::NotFound(key))?;

        let mut guard = self.bpm.lock();
        let frame_id = guard.fetch_page(record_id.page_id)?;
        let object_type = guard.page(frame_id).header().object_type;
        let bytes = guard
            .page(frame_id)
            .record(record_id.slot_num)
            .ok_or_else(|| {
                Error::CorruptPage(format!(
                    "slot {} not found on page {}",
                    record_id.slot_num, record_id.page_id
                ))
            })?
            .to_vec();
        guard.unpin_page(record_id.page_id, false)?;

        let model_type = ModelType::from_u32(object_type)
            .ok_or_else(|| Error::CorruptPage(format!("page {} has unknown object_type {object_type}", record_id.page_id)))?;
        Ok(Record::create(model_type, &bytes)?)
    }

    /// Always returns `Ok(false)` — there is no B+Tree delete yet, so
    /// nothing can be removed from the index without leaving it corrupt.
    pub fn remove(&mut self, _key: u32) -> Result<bool> {
        Ok(false)
    }

    fn store_object<T: Storable>(&mut self, obj: &T) -> Result<RecordId> {
        let size = obj.serialized_size();
        let mut buffer = vec![0u8; size];
        obj.serialize(&mut buffer);

        let mut guard = self.bpm.lock();
        let page_id = guard.new_page(T::MODEL_TYPE as u32)?;
        let frame_id = guard.frame_of(page_id).expect("page just created is resident");
        let slot_num = guard.page_mut(frame_id).insert_record(&buffer)?;
        guard.unpin_page(page_id, true)?;
        printdbg!("[db] stored a {}-byte record at page {} slot {}", size, page_id, slot_num);

        Ok(RecordId { page_id, slot_num })
    }

    fn retrieve_object_buffer(&self, record_id: RecordId) -> Result<Vec<u8>> {
        let mut guard: parking_lot::FairMutexGuard<BufferPoolManager> = self.bpm.lock();
        let frame_id = guard.fetch_page(record_id.page_id)?;
        let bytes = guard
            .page(frame_id)
            .record(record_id.slot_num)
            .ok_or_else(|| {
                Error::CorruptPage(format!(
                    "slot {} not found on page {}",
                    record_id.slot_num, record_id.page_id
                ))
            })?
            .to_vec();
        guard.unpin_page(record_id.page_id, false)?;
        Ok(bytes)
    }
}
