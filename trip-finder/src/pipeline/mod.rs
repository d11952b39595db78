//! Streaming persistence for trips.
//!
//! A producer submits trips through a [`PipelineHandle`]; submission never
//! blocks, and trips arriving while the queue is full are dropped and
//! counted. Every drop is logged at debug level; warnings are issued at
//! doubling drop counts so an overloaded run does not flood the log. Each
//! storage worker owns one [`TripStore`], pulls trips off the
//! shared queue and writes them in batches. A batch is flushed when it
//! reaches the configured size, or when the queue stays empty for the drain
//! timeout with a partial batch pending.
//!
//! Shutdown sets the stop flag, which the producer also polls. Workers keep
//! draining until the flag is set and the queue is empty, flush what they
//! hold, and exit.

mod error;
mod queue;
mod store;

pub use error::{PipelineError, StoreError};
pub use store::{SqliteStore, StoredPath, TripStore};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::domain::Trip;
use queue::{Pop, PushError, QueueReceiver, QueueSender};

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 2_000_000;

/// Default trips per write transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default number of storage workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Pipeline tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum queued trips before submissions are dropped.
    pub capacity: usize,
    pub batch_size: usize,
    /// How long a worker waits on an empty queue before flushing a partial
    /// batch and checking for shutdown.
    pub drain_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            drain_timeout: Duration::from_secs(1),
        }
    }
}

impl PipelineConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.capacity == 0 {
            return Err(PipelineError::ZeroCapacity);
        }
        if self.batch_size == 0 {
            return Err(PipelineError::ZeroBatchSize);
        }
        if self.drain_timeout.is_zero() {
            return Err(PipelineError::ZeroDrainTimeout);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Stats {
    submitted: AtomicU64,
    dropped: AtomicU64,
    saved: AtomicU64,
    lost: AtomicU64,
    batches: AtomicU64,
}

/// Final pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Trips accepted into the queue.
    pub submitted: u64,
    /// Trips rejected by a full or stopping queue, or left unconsumed.
    pub dropped: u64,
    /// Trips in committed batches.
    pub saved: u64,
    /// Trips in batches whose write failed.
    pub lost: u64,
    pub batches: u64,
    pub elapsed: Duration,
}

/// Producer side of a running pipeline.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    queue: QueueSender<Trip>,
    stats: Arc<Stats>,
    stop: Arc<AtomicBool>,
}

impl PipelineHandle {
    /// Queue a trip without blocking. Returns false if it was dropped.
    pub fn submit(&self, trip: Trip) -> bool {
        if self.stop.load(Ordering::Acquire) {
            self.record_drop("pipeline stopping");
            return false;
        }

        match self.queue.try_push(trip) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(PushError::Full(_)) => {
                self.record_drop("queue full");
                false
            }
            Err(PushError::Closed(_)) => {
                self.record_drop("queue closed");
                false
            }
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn record_drop(&self, reason: &'static str) {
        let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(reason, dropped, "dropping trip");
        if dropped.is_power_of_two() {
            warn!(reason, dropped, capacity = self.queue.capacity(), "dropping trip");
        }
    }
}

/// A running set of storage workers.
#[derive(Debug)]
pub struct TripPipeline {
    handle: PipelineHandle,
    queue: Arc<QueueReceiver<Trip>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<Stats>,
    stop: Arc<AtomicBool>,
    started: Instant,
}

impl TripPipeline {
    /// Spawn one storage worker per store.
    pub fn start<S>(config: PipelineConfig, stores: Vec<S>) -> Result<Self, PipelineError>
    where
        S: TripStore + Send + 'static,
    {
        config.validate()?;
        if stores.is_empty() {
            return Err(PipelineError::NoWorkers);
        }

        let (sender, receiver) = queue::bounded(config.capacity);
        let queue = Arc::new(receiver);
        let stats = Arc::new(Stats::default());
        let stop = Arc::new(AtomicBool::new(false));
        let started = Instant::now();

        let mut workers = Vec::with_capacity(stores.len());
        for (id, store) in stores.into_iter().enumerate() {
            let worker = Worker {
                id,
                store,
                queue: Arc::clone(&queue),
                stats: Arc::clone(&stats),
                stop: Arc::clone(&stop),
                batch_size: config.batch_size,
                drain_timeout: config.drain_timeout,
                started,
            };
            let spawned = thread::Builder::new()
                .name(format!("store-{id}"))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    stop.store(true, Ordering::Release);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            }
        }

        info!(
            workers = workers.len(),
            capacity = config.capacity,
            batch_size = config.batch_size,
            "trip pipeline started"
        );

        Ok(Self {
            handle: PipelineHandle {
                queue: sender,
                stats: Arc::clone(&stats),
                stop: Arc::clone(&stop),
            },
            queue,
            workers,
            stats,
            stop,
            started,
        })
    }

    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// The flag producers poll; setting it begins shutdown.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Stop accepting trips, drain the queue, and wait for every worker.
    pub fn shutdown(mut self) -> PipelineReport {
        self.stop.store(true, Ordering::Release);
        info!(queued = self.queue.len(), "stopping trip pipeline");

        for handle in std::mem::take(&mut self.workers) {
            let name = handle.thread().name().unwrap_or("store").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "storage worker panicked");
            }
        }

        let stranded = self.queue.drain();
        if !stranded.is_empty() {
            warn!(count = stranded.len(), "trips left in queue after workers exited");
            self.stats
                .dropped
                .fetch_add(stranded.len() as u64, Ordering::Relaxed);
        }

        let report = PipelineReport {
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            saved: self.stats.saved.load(Ordering::Relaxed),
            lost: self.stats.lost.load(Ordering::Relaxed),
            batches: self.stats.batches.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        };
        info!(
            submitted = report.submitted,
            dropped = report.dropped,
            saved = report.saved,
            lost = report.lost,
            batches = report.batches,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "trip pipeline finished"
        );
        report
    }
}

impl Drop for TripPipeline {
    fn drop(&mut self) {
        // Workers drain and exit on their own; nobody waits for them.
        self.stop.store(true, Ordering::Release);
    }
}

struct Worker<S> {
    id: usize,
    store: S,
    queue: Arc<QueueReceiver<Trip>>,
    stats: Arc<Stats>,
    stop: Arc<AtomicBool>,
    batch_size: usize,
    drain_timeout: Duration,
    started: Instant,
}

impl<S: TripStore> Worker<S> {
    fn run(mut self) {
        info!(worker = self.id, "storage worker started");
        let mut batch = Vec::with_capacity(self.batch_size);

        loop {
            if self.stop.load(Ordering::Acquire) && self.queue.is_empty() {
                break;
            }

            match self.queue.pop_timeout(self.drain_timeout) {
                Pop::Item(trip) => {
                    batch.push(trip);
                    if batch.len() >= self.batch_size {
                        self.flush(&mut batch);
                    }
                }
                Pop::Empty => {
                    if !batch.is_empty() {
                        self.flush(&mut batch);
                    }
                }
                Pop::Closed => break,
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch);
        }
        info!(worker = self.id, "storage worker finished");
    }

    fn flush(&mut self, batch: &mut Vec<Trip>) {
        let size = batch.len() as u64;
        match self.store.write_batch(batch) {
            Ok(written) => {
                let saved = self.stats.saved.fetch_add(written as u64, Ordering::Relaxed)
                    + written as u64;
                self.stats.batches.fetch_add(1, Ordering::Relaxed);
                let secs = self.started.elapsed().as_secs_f64();
                let rate = if secs > 0.0 { saved as f64 / secs } else { 0.0 };
                info!(
                    worker = self.id,
                    batch = written,
                    total_saved = saved,
                    rate = format!("{rate:.0}/s"),
                    "saved batch"
                );
            }
            Err(e) => {
                self.stats.lost.fetch_add(size, Ordering::Relaxed);
                error!(worker = self.id, error = %e, lost = size, "batch write failed");
            }
        }
        debug!(worker = self.id, queued = self.queue.len(), "flushed");
        batch.clear();
    }
}
