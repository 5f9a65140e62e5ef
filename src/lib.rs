//! Bedrock - the storage substrate of a teaching DBMS
//!
//! This crate provides the two load-bearing components any higher query or
//! execution layer would sit on: an in-memory persistent key-value trie and
//! a disk-backed buffer pool.
//!
//! # Architecture
//!
//! - **Trie** (`trie`): a copy-on-write map with structural sharing
//!   - `Trie`: persistent functional map; `get`/`put`/`remove` never mutate
//!   - `TrieStore`: thread-safe front-end with snapshot reads and
//!     serialized writers; `ValueGuard` pins a snapshot while a value is
//!     in use
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: fetches pages from disk and caches them in a
//!     fixed set of frames
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `FrameHeader`: per-frame metadata and data storage
//!   - `BasicPageGuard`/`ReadPageGuard`/`WritePageGuard`: RAII guards for
//!     pinned (and optionally latched) page access
//!
//! - **Storage** (`storage`): disk I/O
//!   - `DiskManager`: reads and writes pages to/from the database file
//!   - `DiskScheduler`: background disk I/O over a request queue
//!
//! - **Recovery** (`recovery`): `LogManager`, an opaque write-ahead-log
//!   sink the buffer pool holds a handle to
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bedrock::buffer::BufferPoolManager;
//! use bedrock::storage::disk::DiskManager;
//! use bedrock::trie::TrieStore;
//!
//! // A buffer pool with 100 frames and LRU-2 replacement.
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = BufferPoolManager::new(100, 2, disk_manager, None);
//!
//! let page_id = {
//!     let mut guard = bpm.new_page_guarded().unwrap().upgrade_write();
//!     guard.data_mut()[0] = 42;
//!     guard.page_id()
//! };
//! bpm.flush_page(page_id).unwrap();
//!
//! // A versioned key-value store, independent of the pool.
//! let store = TrieStore::new();
//! store.put(b"answer", 42u32);
//! assert_eq!(*store.get::<u32>(b"answer").unwrap(), 42);
//! ```

pub mod buffer;
pub mod common;
pub mod recovery;
pub mod storage;
pub mod trie;

// Re-export commonly used types at the crate root
pub use common::{BedrockError, FrameId, PageId, Result};
