//! A single seek-addressed backing file. Page `id` always lives at byte
//! offset `id * PAGE_SIZE`; there is no allocation bitmap, no free list on
//! disk — a page's offset is the whole of its address.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::pages::{Page, PageId, PAGE_SIZE};

#[cfg(test)]
pub fn test_path() -> String {
    use uuid::Uuid;
    format!("data/test/test_{}.db", Uuid::new_v4())
}

#[derive(Debug)]
pub struct DiskManager {
    file: File,
}

impl DiskManager {
    /// Opens `path`, creating an empty file if it doesn't exist yet.
    pub fn new(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .with_context(|| format!("opening database file {path}"))?;

        Ok(Self { file })
    }

    /// How many whole pages already exist in the file, used to recover
    /// `next_page_id` across restarts.
    pub fn existing_page_count(&self) -> Result<u32> {
        let len = self.file.metadata()?.len();
        Ok((len / PAGE_SIZE as u64) as u32)
    }

    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.raw())?;
        self.file.flush()?;
        Ok(())
    }

    /// Reads the page at `page_id`. A page entirely or partly beyond the
    /// current end of the file reads back as zeros rather than erroring —
    /// this is what lets a page allocated in memory but never flushed look
    /// like a freshly zeroed page the first time something reads it back
    /// from disk.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        let file_len = self.file.metadata()?.len();

        let mut buf = [0u8; PAGE_SIZE];
        if offset < file_len {
            self.file.seek(SeekFrom::Start(offset))?;
            let available = (file_len - offset).min(PAGE_SIZE as u64) as usize;
            self.file.read_exact(&mut buf[..available])?;
        }
        Ok(Page::from_raw(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() -> Result<()> {
        let path = test_path();
        let mut disk = DiskManager::new(&path)?;

        let mut page = Page::new();
        page.init(3, 1);
        page.insert_record(b"payload").unwrap();

        disk.write_page(3, &page)?;
        let read_back = disk.read_page(3)?;

        assert_eq!(read_back.header().page_id, 3);
        assert_eq!(read_back.record(0), Some(&b"payload"[..]));

        std::fs::remove_file(&path).ok();
        Ok(())
    }

    #[test]
    fn existing_page_count_reflects_file_length() -> Result<()> {
        let path = test_path();
        let mut disk = DiskManager::new(&path)?;
        assert_eq!(disk.existing_page_count()?, 0);

        let mut page = Page::new();
        page.init(0, 1);
        disk.write_page(0, &page)?;
        assert_eq!(disk.existing_page_count()?, 1);

        page.init(4, 1);
        disk.write_page(4, &page)?;
        assert_eq!(disk.existing_page_count()?, 5);

        std::fs::remove_file(&path).ok();
        Ok(())
    }

    #[test]
    fn reading_past_the_end_of_the_file_is_all_zeros() -> Result<()> {
        let path = test_path();
        let mut disk = DiskManager::new(&path)?;
        let page = disk.read_page(0)?;
        assert_eq!(page.raw(), &[0u8; PAGE_SIZE]);

        let mut page = Page::new();
        page.init(0, 1);
        disk.write_page(0, &page)?;
        // page 3 is still entirely beyond the one page written so far
        let page = disk.read_page(3)?;
        assert_eq!(page.raw(), &[0u8; PAGE_SIZE]);

        std::fs::remove_file(&path).ok();
        Ok(())
    }

    #[test]
    fn reopening_an_existing_file_preserves_its_pages() -> Result<()> {
        let path = test_path();
        {
            let mut disk = DiskManager::new(&path)?;
            let mut page = Page::new();
            page.init(0, 1);
            page.insert_record(b"hello").unwrap();
            disk.write_page(0, &page)?;
        }

        let mut disk = DiskManager::new(&path)?;
        let page = disk.read_page(0)?;
        assert_eq!(page.record(0), Some(&b"hello"[..]));

        std::fs::remove_file(&path).ok();
        Ok(())
    }
}
