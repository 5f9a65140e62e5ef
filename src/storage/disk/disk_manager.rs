use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::common::{BedrockError, PageId, Result, PAGE_SIZE};

/// DiskManager reads and writes pages to/from a single database file.
///
/// Pages live at `page_id * PAGE_SIZE`; the file grows as pages are
/// written. Reads past the end of the file (pages allocated but never
/// written) come back zero-filled.
pub struct DiskManager {
    /// The database file. The mutex serializes the seek+read/write pair.
    db_file: Mutex<File>,
    /// Path of the database file
    db_path: PathBuf,
    /// Number of disk reads performed
    num_reads: AtomicU32,
    /// Number of disk writes performed
    num_writes: AtomicU32,
    /// Number of pages deallocated
    num_deallocs: AtomicU32,
}

impl DiskManager {
    /// Creates a DiskManager for the given database file, creating the
    /// file if it does not exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let db_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        debug!("opened database file {}", db_path.display());

        Ok(Self {
            db_file: Mutex::new(db_file),
            db_path,
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
            num_deallocs: AtomicU32::new(0),
        })
    }

    /// Reads a page from disk into the provided buffer.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        let offset = Self::byte_offset(page_id)?;

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let bytes_read = file.read(data)?;
        if bytes_read < PAGE_SIZE {
            data[bytes_read..].fill(0);
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a page to disk from the provided buffer.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        let offset = Self::byte_offset(page_id)?;

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Retires a page id on the backing store. Space reclamation is
    /// deferred; the id simply stops being used.
    pub fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(BedrockError::InvalidPageId(page_id));
        }
        trace!("deallocated {page_id}");
        self.num_deallocs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Forces all file contents to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.db_file.lock().sync_all()?;
        Ok(())
    }

    /// Returns the number of disk reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of disk writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Returns the number of pages deallocated.
    pub fn num_deallocs(&self) -> u32 {
        self.num_deallocs.load(Ordering::Relaxed)
    }

    /// Returns the database file path.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn byte_offset(page_id: PageId) -> Result<u64> {
        if !page_id.is_valid() {
            return Err(BedrockError::InvalidPageId(page_id));
        }
        Ok(page_id.as_i32() as u64 * PAGE_SIZE as u64)
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let file = self.db_file.get_mut();
        let _ = file.sync_all();
    }
}
