//! WAL Batcher / Flusher
//!
//! Group commit: callers enqueue operations and block, a single worker
//! thread accumulates them and flushes the whole batch with one write and
//! one fsync.
//!
//! ## Flush Triggers
//! - the batch reaches `flushing_batch_size` records
//! - the recurring `flushing_batch_timeout` ticker fires
//!
//! Whichever comes first flushes everything accumulated so far.
//!
//! ```text
//!  caller ─┐
//!  caller ─┼─► bounded queue ─► worker ─► encode ─► write ─► fsync ─► rotate?
//!  caller ─┘                      │                                    │
//!     ▲                           └──────── completion (per caller) ◄──┘
//!     └──────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, select, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::config::WalConfig;
use crate::error::{FlushFailure, FlushStage, KvError, Result};

use super::record::{Operation, Record};
use super::segment::SegmentManager;
use super::Wal;

/// Outcome delivered to every waiter of a batch
type FlushOutcome = std::result::Result<(), FlushFailure>;

/// A queued, not-yet-durable operation and its completion signal
struct WriteRequest {
    operation: Operation,
    done: Sender<FlushOutcome>,
}

/// Counters published by the flush worker
#[derive(Debug, Default)]
pub struct WalStats {
    batches_flushed: AtomicU64,
    records_flushed: AtomicU64,
    failed_batches: AtomicU64,
    last_lsn: AtomicU64,
    segments_created: AtomicU64,
}

impl WalStats {
    /// Batches written and synced successfully
    pub fn batches_flushed(&self) -> u64 {
        self.batches_flushed.load(Ordering::Acquire)
    }

    /// Records contained in successful batches
    pub fn records_flushed(&self) -> u64 {
        self.records_flushed.load(Ordering::Acquire)
    }

    pub fn failed_batches(&self) -> u64 {
        self.failed_batches.load(Ordering::Acquire)
    }

    /// Last LSN handed out (including LSNs of failed batches)
    pub fn last_lsn(&self) -> u64 {
        self.last_lsn.load(Ordering::Acquire)
    }

    /// Segments opened by this WAL instance, the initial one included
    pub fn segments_created(&self) -> u64 {
        self.segments_created.load(Ordering::Acquire)
    }
}

/// File-backed write-ahead log with group commit
///
/// ## Concurrency:
/// - Any number of threads may call `append_and_wait` concurrently
/// - Only the worker thread touches segment files
/// - `sender` is `None` once closed; in-flight callers hold their own clone,
///   so the worker keeps draining until the last of them is done
pub struct FileWal {
    sender: RwLock<Option<Sender<WriteRequest>>>,
    worker: Mutex<Option<JoinHandle<Result<()>>>>,
    stats: Arc<WalStats>,
}

impl FileWal {
    /// Open a new segment in `config.data_directory` and start the flush
    /// worker. LSNs continue after `last_lsn` (0 for a fresh log).
    pub fn open(config: &WalConfig, last_lsn: u64) -> Result<Self> {
        if config.flushing_batch_size == 0 {
            return Err(KvError::Config("wal.flushing_batch_size must be positive".into()));
        }
        if config.flushing_batch_timeout.is_zero() {
            return Err(KvError::Config("wal.flushing_batch_timeout must be positive".into()));
        }

        let segments = SegmentManager::open(&config.data_directory)?;

        let stats = Arc::new(WalStats::default());
        stats.segments_created.store(1, Ordering::Release);
        stats.last_lsn.store(last_lsn, Ordering::Release);

        let (sender, receiver) = channel::bounded(config.flushing_batch_size);

        let flusher = Flusher {
            segments,
            last_lsn,
            batch_size: config.flushing_batch_size,
            batch_timeout: config.flushing_batch_timeout,
            max_segment_size: config.max_segment_size,
            stats: Arc::clone(&stats),
        };

        let worker = thread::Builder::new()
            .name("walkv-wal-flusher".to_string())
            .spawn(move || flusher.run(receiver))?;

        tracing::info!(
            "WAL opened in {} (batch size {}, batch timeout {:?}, max segment {} bytes)",
            config.data_directory.display(),
            config.flushing_batch_size,
            config.flushing_batch_timeout,
            config.max_segment_size
        );

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            stats,
        })
    }

    /// Live counters from the flush worker
    pub fn stats(&self) -> &WalStats {
        &self.stats
    }
}

impl Wal for FileWal {
    fn append_and_wait(&self, operation: Operation) -> Result<()> {
        // Rejected before it can take an LSN
        operation.validate()?;

        let sender = self
            .sender
            .read()
            .as_ref()
            .cloned()
            .ok_or(KvError::WalClosed)?;

        let (done, completion) = channel::bounded(1);
        sender
            .send(WriteRequest { operation, done })
            .map_err(|_| KvError::WalWorker("request queue disconnected".to_string()))?;
        drop(sender);

        match completion.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(failure)) => Err(KvError::Flush(failure)),
            Err(_) => Err(KvError::WalWorker(
                "request dropped without an outcome".to_string(),
            )),
        }
    }

    fn close(&self) -> Result<()> {
        // Dropping our sender lets the worker drain the queue and exit
        self.sender.write().take();

        let worker = self.worker.lock().take();
        match worker {
            Some(handle) => {
                let result = handle
                    .join()
                    .map_err(|_| KvError::WalWorker("flush worker panicked".to_string()))?;
                tracing::info!("WAL closed after {} batches", self.stats.batches_flushed());
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for FileWal {
    fn drop(&mut self) {
        if let Err(e) = Wal::close(self) {
            tracing::error!("Failed to close WAL: {}", e);
        }
    }
}

// =============================================================================
// Flush Worker
// =============================================================================

/// State owned by the flush worker thread
struct Flusher {
    segments: SegmentManager,
    last_lsn: u64,
    batch_size: usize,
    batch_timeout: Duration,
    max_segment_size: u64,
    stats: Arc<WalStats>,
}

impl Flusher {
    fn run(mut self, requests: Receiver<WriteRequest>) -> Result<()> {
        let ticker = channel::tick(self.batch_timeout);
        let mut batch: Vec<WriteRequest> = Vec::with_capacity(self.batch_size);

        loop {
            select! {
                recv(requests) -> msg => match msg {
                    Ok(request) => {
                        batch.push(request);
                        if batch.len() >= self.batch_size {
                            self.flush(&mut batch);
                        }
                    }
                    // Closed and fully drained
                    Err(_) => {
                        self.flush(&mut batch);
                        break;
                    }
                },
                recv(ticker) -> _ => self.flush(&mut batch),
            }
        }

        tracing::debug!("WAL flush worker stopping at LSN {}", self.last_lsn);
        self.segments.close()
    }

    /// Flush the whole batch and signal every waiter with the same outcome.
    /// The batch is empty afterwards, success or not.
    fn flush(&mut self, batch: &mut Vec<WriteRequest>) {
        if batch.is_empty() {
            return;
        }

        let count = batch.len();
        if self.last_lsn.checked_add(count as u64).is_none() {
            let failure = FlushFailure::new(
                FlushStage::Write,
                format!("LSN space exhausted after {}", self.last_lsn),
            );
            self.stats.failed_batches.fetch_add(1, Ordering::AcqRel);
            tracing::error!(records = count, "WAL batch failed: {}", failure);
            for request in batch.drain(..) {
                let _ = request.done.send(Err(failure.clone()));
            }
            return;
        }

        let first_lsn = self.last_lsn + 1;
        let mut bytes = Vec::with_capacity(64 * count);
        let mut waiters = Vec::with_capacity(count);

        for request in batch.drain(..) {
            self.last_lsn += 1;
            Record::new(self.last_lsn, request.operation).encode_into(&mut bytes);
            waiters.push(request.done);
        }
        // LSNs are consumed even if the batch fails
        self.stats.last_lsn.store(self.last_lsn, Ordering::Release);

        let outcome = self.persist(&bytes);
        match &outcome {
            Ok(()) => {
                self.stats.batches_flushed.fetch_add(1, Ordering::AcqRel);
                self.stats
                    .records_flushed
                    .fetch_add(count as u64, Ordering::AcqRel);
                tracing::debug!(
                    records = count,
                    bytes = bytes.len(),
                    first_lsn,
                    last_lsn = self.last_lsn,
                    "Flushed WAL batch"
                );
            }
            Err(failure) => {
                self.stats.failed_batches.fetch_add(1, Ordering::AcqRel);
                tracing::error!(
                    records = count,
                    first_lsn,
                    last_lsn = self.last_lsn,
                    "WAL batch failed: {}",
                    failure
                );
            }
        }

        for done in waiters {
            // A caller that gave up still gets its slot's outcome computed
            let _ = done.send(outcome.clone());
        }
    }

    fn persist(&mut self, bytes: &[u8]) -> FlushOutcome {
        if !self.segments.is_open() {
            self.rotate()?;
        }

        self.segments.write_and_sync(bytes)?;

        if self.segments.size() >= self.max_segment_size {
            self.rotate()?;
        }

        Ok(())
    }

    fn rotate(&mut self) -> FlushOutcome {
        self.segments
            .rotate()
            .map_err(|e| FlushFailure::new(FlushStage::Rotate, e))?;
        self.stats.segments_created.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
