use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::common::{BedrockError, PageId, Result, PAGE_SIZE};

use super::DiskManager;

/// A page-sized owned buffer moved through the request queue.
pub type PageBuffer = Box<[u8; PAGE_SIZE]>;

/// A disk I/O request. Buffers are owned by the request, so completion is
/// signalled by sending the result (and, for reads, the filled buffer)
/// back over the completion channel.
pub enum DiskRequest {
    Read {
        page_id: PageId,
        completion: Sender<Result<PageBuffer>>,
    },
    Write {
        page_id: PageId,
        data: PageBuffer,
        completion: Sender<Result<()>>,
    },
}

/// DiskScheduler runs a background worker thread that processes disk I/O
/// requests from a bounded queue. Dropping the scheduler closes the queue;
/// the worker drains what is left and exits.
pub struct DiskScheduler {
    /// The disk manager for actual I/O operations
    disk_manager: Arc<DiskManager>,
    /// Request queue; None once shutdown has begun
    request_tx: Option<Sender<DiskRequest>>,
    /// Handle to the background worker thread
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler and spawns its worker thread.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (request_tx, request_rx) = bounded::<DiskRequest>(128);

        let dm = Arc::clone(&disk_manager);
        let worker = thread::spawn(move || {
            Self::run_worker(dm, request_rx);
        });

        Self {
            disk_manager,
            request_tx: Some(request_tx),
            worker: Some(worker),
        }
    }

    /// Queues a disk request for the worker.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        match &self.request_tx {
            Some(tx) => tx
                .send(request)
                .map_err(|e| BedrockError::DiskScheduler(format!("failed to schedule: {e}"))),
            None => Err(BedrockError::DiskScheduler("scheduler shut down".into())),
        }
    }

    /// Schedules a read and waits for the filled page buffer.
    pub fn read_page_sync(&self, page_id: PageId) -> Result<PageBuffer> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Read {
            page_id,
            completion: tx,
        })?;
        rx.recv()
            .map_err(|e| BedrockError::DiskScheduler(format!("no completion: {e}")))?
    }

    /// Schedules a write of `data` and waits for it to finish.
    pub fn write_page_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);
        let mut buffer: PageBuffer = Box::new([0u8; PAGE_SIZE]);
        buffer.copy_from_slice(data);

        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Write {
            page_id,
            data: buffer,
            completion: tx,
        })?;
        rx.recv()
            .map_err(|e| BedrockError::DiskScheduler(format!("no completion: {e}")))?
    }

    /// Returns a reference to the underlying DiskManager.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    /// Worker loop: runs until every sender is gone, then drains out.
    fn run_worker(disk_manager: Arc<DiskManager>, requests: Receiver<DiskRequest>) {
        for request in requests {
            match request {
                DiskRequest::Read {
                    page_id,
                    completion,
                } => {
                    let mut buffer: PageBuffer = Box::new([0u8; PAGE_SIZE]);
                    let result = disk_manager
                        .read_page(page_id, &mut buffer[..])
                        .map(|_| buffer);
                    let _ = completion.send(result);
                }
                DiskRequest::Write {
                    page_id,
                    data,
                    completion,
                } => {
                    let _ = completion.send(disk_manager.write_page(page_id, &data[..]));
                }
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the channel stops the worker after it drains the queue.
        self.request_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
