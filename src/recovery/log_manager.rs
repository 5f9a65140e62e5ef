use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::Lsn;

/// An opaque write-ahead-log sink.
///
/// The buffer pool takes a handle to a LogManager for future integration
/// but never calls into it; for now records are staged in memory until a
/// recovery component exists to drain them.
#[derive(Default)]
pub struct LogManager {
    /// Next log sequence number to hand out
    next_lsn: AtomicU64,
    /// Staged log records
    buffer: Mutex<Vec<u8>>,
}

impl LogManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to the log and returns its LSN.
    pub fn append(&self, record: &[u8]) -> Lsn {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        self.buffer.lock().extend_from_slice(record);
        lsn
    }

    /// Returns the next LSN that will be handed out.
    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn.load(Ordering::SeqCst)
    }

    /// Total bytes currently staged.
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.lock().len()
    }
}
