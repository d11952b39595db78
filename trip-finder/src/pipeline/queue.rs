//! Bounded multi-consumer queue with a non-blocking push.
//!
//! The channel itself is unbounded; capacity is enforced by a shared length
//! counter reserved before each send. Allocation grows with the queued items
//! rather than with the configured capacity, which matters at millions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

/// How long a consumer sleeps between attempts on a busy receiver.
const LOCK_RETRY: Duration = Duration::from_millis(1);

/// Why a push was refused. The item is handed back.
#[derive(Debug)]
pub enum PushError<T> {
    Full(T),
    Closed(T),
}

/// Result of waiting for an item.
#[derive(Debug)]
pub enum Pop<T> {
    Item(T),
    /// Nothing arrived within the timeout.
    Empty,
    /// Every sender is gone and the queue is drained.
    Closed,
}

pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel();
    let len = Arc::new(AtomicUsize::new(0));
    (
        QueueSender {
            tx,
            len: Arc::clone(&len),
            capacity,
        },
        QueueReceiver {
            rx: Mutex::new(rx),
            len,
        },
    )
}

#[derive(Debug)]
pub struct QueueSender<T> {
    tx: Sender<T>,
    len: Arc<AtomicUsize>,
    capacity: usize,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            len: Arc::clone(&self.len),
            capacity: self.capacity,
        }
    }
}

impl<T> QueueSender<T> {
    /// Enqueue without blocking.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let reserved = self
            .len
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |len| {
                (len < self.capacity).then_some(len + 1)
            });
        if reserved.is_err() {
            return Err(PushError::Full(item));
        }

        self.tx.send(item).map_err(|mpsc::SendError(item)| {
            self.len.fetch_sub(1, Ordering::AcqRel);
            PushError::Closed(item)
        })
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Receiving half, shared by all consumers.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: Mutex<Receiver<T>>,
    len: Arc<AtomicUsize>,
}

impl<T> QueueReceiver<T> {
    /// Wait up to `timeout` for the next item.
    ///
    /// The timeout covers waiting for other consumers as well as for items,
    /// so idle consumers do not queue up behind each other's waits.
    pub fn pop_timeout(&self, timeout: Duration) -> Pop<T> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.rx.try_lock() {
                Ok(rx) => return self.recv_until(&rx, deadline),
                // A consumer that panicked mid-pop leaves the receiver intact.
                Err(TryLockError::Poisoned(poisoned)) => {
                    return self.recv_until(&poisoned.into_inner(), deadline);
                }
                Err(TryLockError::WouldBlock) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Pop::Empty;
                    }
                    thread::sleep(LOCK_RETRY.min(deadline - now));
                }
            }
        }
    }

    fn recv_until(&self, rx: &Receiver<T>, deadline: Instant) -> Pop<T> {
        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(item) => {
                self.len.fetch_sub(1, Ordering::AcqRel);
                Pop::Item(item)
            }
            Err(RecvTimeoutError::Timeout) => Pop::Empty,
            Err(RecvTimeoutError::Disconnected) => Pop::Closed,
        }
    }

    /// Take everything currently queued without waiting.
    pub fn drain(&self) -> Vec<T> {
        let rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let items: Vec<T> = rx.try_iter().collect();
        self.len.fetch_sub(items.len(), Ordering::AcqRel);
        items
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
