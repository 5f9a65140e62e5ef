//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;

use bedrock::buffer::BufferPoolManager;
use bedrock::common::{BedrockError, PageId};
use bedrock::recovery::LogManager;
use bedrock::storage::disk::DiskManager;
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, Arc<DiskManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = BufferPoolManager::new(pool_size, 2, Arc::clone(&dm), None);
    (bpm, dm, temp_file)
}

#[test]
fn test_buffer_pool_basic_operations() {
    let (bpm, _dm, _temp) = create_bpm(10);

    let page_id = bpm.new_page().unwrap().page_id();
    assert_eq!(page_id, PageId::new(0));
    bpm.unpin_page(page_id, false);

    {
        let mut guard = bpm.fetch_page_write(page_id).unwrap();
        guard.data_mut()[0] = 0xDE;
        guard.data_mut()[1] = 0xAD;
        guard.data_mut()[2] = 0xBE;
        guard.data_mut()[3] = 0xEF;
    }

    {
        let guard = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(guard.data()[0], 0xDE);
        assert_eq!(guard.data()[1], 0xAD);
        assert_eq!(guard.data()[2], 0xBE);
        assert_eq!(guard.data()[3], 0xEF);
    }
}

#[test]
fn test_buffer_pool_capacity_and_unpin() {
    // pool_size=3: three pinned pages exhaust the pool; unpinning one frees
    // a slot; fetching the evicted page goes back to disk.
    let (bpm, dm, _temp) = create_bpm(3);

    let p0 = bpm.new_page().unwrap().page_id();
    let p1 = bpm.new_page().unwrap().page_id();
    let p2 = bpm.new_page().unwrap().page_id();

    assert!(matches!(bpm.new_page(), Err(BedrockError::BufferPoolFull)));

    assert!(bpm.unpin_page(p0, false));

    let p3 = bpm.new_page().unwrap().page_id();
    assert_eq!(p3, PageId::new(3));

    // p0 was evicted for p3; fetching it again must hit the disk.
    bpm.unpin_page(p3, false);
    let reads_before = dm.num_reads();
    let frame = bpm.fetch_page(p0).unwrap();
    assert_eq!(frame.page_id(), p0);
    assert_eq!(dm.num_reads(), reads_before + 1);

    bpm.unpin_page(p0, false);
    let _ = (p1, p2);
}

#[test]
fn test_buffer_pool_dirty_write_back_exactly_once() {
    let (bpm, dm, _temp) = create_bpm(2);

    // Dirty p0, then let it be evicted.
    let p0 = bpm.new_page().unwrap().page_id();
    bpm.unpin_page(p0, false);
    {
        let mut guard = bpm.fetch_page_write(p0).unwrap();
        guard.data_mut()[0] = 0x5A;
    }
    assert_eq!(bpm.is_dirty(p0), Some(true));

    let _p1 = bpm.new_page().unwrap();
    let writes_before = dm.num_writes();

    // p0 is the only evictable page; allocating p2 evicts it and writes it
    // back exactly once.
    let p2 = bpm.new_page().unwrap().page_id();
    assert_eq!(dm.num_writes(), writes_before + 1);

    // A clean eviction triggers no further write.
    bpm.unpin_page(p2, false);
    let _p3 = bpm.new_page().unwrap();
    assert_eq!(dm.num_writes(), writes_before + 1);

    // The written-back bytes are the ones p0 held.
    bpm.unpin_page(_p3.page_id(), false);
    let guard = bpm.fetch_page_read(p0).unwrap();
    assert_eq!(guard.data()[0], 0x5A);
}

#[test]
fn test_buffer_pool_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_id;
    let test_data = b"Persistence test data";

    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm, None);

        page_id = bpm.new_page().unwrap().page_id();
        bpm.unpin_page(page_id, false);

        {
            let mut guard = bpm.fetch_page_write(page_id).unwrap();
            guard.data_mut()[..test_data.len()].copy_from_slice(test_data);
        }

        assert!(bpm.flush_page(page_id).unwrap());
    }

    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm, None);

        let guard = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(&guard.data()[..test_data.len()], test_data);
    }
}

#[test]
fn test_buffer_pool_eviction_roundtrip() {
    let (bpm, _dm, _temp) = create_bpm(3);

    let mut page_ids = Vec::new();
    for i in 0..3u8 {
        let pid = bpm.new_page().unwrap().page_id();
        {
            let mut guard = bpm.fetch_page_write(pid).unwrap();
            guard.data_mut()[0] = i;
        }
        bpm.unpin_page(pid, false);
        page_ids.push(pid);
    }

    // Force evictions with more pages than frames.
    for _ in 0..3 {
        let pid = bpm.new_page().unwrap().page_id();
        bpm.unpin_page(pid, false);
    }

    // Every original page reads back its own byte.
    for (i, &pid) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.data()[0], i as u8);
    }
}

#[test]
fn test_buffer_pool_flush_all() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_ids;

    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm, None);

        page_ids = (0..5u8)
            .map(|i| {
                let pid = bpm.new_page().unwrap().page_id();
                bpm.unpin_page(pid, false);
                {
                    let mut guard = bpm.fetch_page_write(pid).unwrap();
                    guard.data_mut()[0] = i;
                }
                pid
            })
            .collect::<Vec<_>>();

        bpm.flush_all_pages().unwrap();

        for &pid in &page_ids {
            assert_eq!(bpm.is_dirty(pid), Some(false));
        }
    }

    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm, None);

        for (i, &pid) in page_ids.iter().enumerate() {
            let guard = bpm.fetch_page_read(pid).unwrap();
            assert_eq!(guard.data()[0], i as u8);
        }
    }
}

#[test]
fn test_buffer_pool_delete_page() {
    let (bpm, dm, _temp) = create_bpm(10);

    let page_id = bpm.new_page().unwrap().page_id();

    // Pinned pages cannot be deleted and nothing changes.
    assert!(!bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.get_pin_count(page_id), Some(1));
    assert_eq!(dm.num_deallocs(), 0);

    bpm.unpin_page(page_id, false);
    assert!(bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.get_pin_count(page_id), None);
    assert_eq!(dm.num_deallocs(), 1);

    // Deleting a page the pool does not hold is a no-op.
    assert!(!bpm.delete_page(page_id).unwrap());
    assert!(!bpm.delete_page(PageId::new(1000)).unwrap());
}

#[test]
fn test_buffer_pool_unpin_contract() {
    let (bpm, _dm, _temp) = create_bpm(10);

    assert!(!bpm.unpin_page(PageId::new(42), false));

    let page_id = bpm.new_page().unwrap().page_id();
    assert!(bpm.unpin_page(page_id, true));
    assert!(!bpm.unpin_page(page_id, false));

    // The dirty bit set by the earlier unpin sticks.
    assert_eq!(bpm.is_dirty(page_id), Some(true));
}

#[test]
fn test_buffer_pool_with_log_manager() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let log = Arc::new(LogManager::new());
    let bpm = BufferPoolManager::new(10, 2, dm, Some(Arc::clone(&log)));

    // The pool holds the handle but never writes through it.
    let page_id = bpm.new_page().unwrap().page_id();
    bpm.unpin_page(page_id, true);
    bpm.flush_page(page_id).unwrap();

    assert_eq!(bpm.log_manager().unwrap().next_lsn(), 0);
    assert_eq!(log.buffered_bytes(), 0);
}

#[test]
fn test_buffer_pool_concurrent_access() {
    let (bpm, _dm, _temp) = create_bpm(10);
    let bpm = Arc::new(bpm);

    let page_id = bpm.new_page().unwrap().page_id();
    bpm.unpin_page(page_id, false);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for _ in 0..100 {
                    let guard = bpm.fetch_page_read(page_id).unwrap();
                    let _ = guard.data()[0];
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(bpm.get_pin_count(page_id), Some(0));
}

#[test]
fn test_buffer_pool_concurrent_writers_distinct_pages() {
    let (bpm, _dm, _temp) = create_bpm(5);
    let bpm = Arc::new(bpm);

    // More pages than frames, hammered from several threads.
    let page_ids: Vec<PageId> = (0..20)
        .map(|_| {
            let pid = bpm.new_page().unwrap().page_id();
            bpm.unpin_page(pid, false);
            pid
        })
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let bpm = Arc::clone(&bpm);
            let page_ids = page_ids.clone();
            thread::spawn(move || {
                for round in 0..20 {
                    for &pid in page_ids.iter().skip(t).step_by(4) {
                        let mut guard = bpm.fetch_page_write(pid).unwrap();
                        let tag = pid.as_i32() as u8;
                        guard.data_mut()[0] = tag;
                        guard.data_mut()[1] = round as u8;
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for &pid in &page_ids {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.data()[0], pid.as_i32() as u8);
    }
}
