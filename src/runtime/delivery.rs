//! Ordered hand-off of completed blocks to a single renderer.
//!
//! The producer (whatever thread the backend streams on) only sends on an
//! unbounded channel. One dedicated consumer thread receives and renders, so
//! render work never blocks the stream callback and blocks are rendered in
//! exactly the order they were enqueued.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedSender};

use crate::core::block::Block;

/// Consumer of delivered blocks. Runs on the delivery thread and must not
/// block indefinitely.
pub trait BlockRenderer: Send + 'static {
    fn render(&mut self, block: Block);
}

impl<F> BlockRenderer for F
where
    F: FnMut(Block) + Send + 'static,
{
    fn render(&mut self, block: Block) {
        self(block)
    }
}

#[derive(Debug, Default)]
struct Backlog {
    pending: Mutex<usize>,
    drained: Condvar,
}

impl Backlog {
    fn increment(&self) {
        *lock_unpoisoned(&self.pending) += 1;
    }

    fn decrement(&self) {
        let mut pending = lock_unpoisoned(&self.pending);
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    fn clear(&self) {
        *lock_unpoisoned(&self.pending) = 0;
        self.drained.notify_all();
    }

    fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = lock_unpoisoned(&self.pending);

        while *pending > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            pending = match self.drained.wait_timeout(pending, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }

        true
    }
}

/// Waits on a queue's backlog without borrowing the queue itself.
#[derive(Debug, Clone)]
pub struct DrainHandle {
    backlog: Arc<Backlog>,
}

impl DrainHandle {
    /// Blocks until every block enqueued so far has been rendered or
    /// discarded. Returns false if `timeout` elapsed first.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        self.backlog.wait_until_drained(timeout)
    }
}

pub struct DeliveryQueue {
    sender: Option<UnboundedSender<Block>>,
    worker: Option<JoinHandle<()>>,
    stopped: Arc<AtomicBool>,
    backlog: Arc<Backlog>,
}

impl DeliveryQueue {
    /// Starts the delivery thread for `renderer`.
    pub fn spawn(renderer: impl BlockRenderer) -> std::io::Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Block>();
        let stopped = Arc::new(AtomicBool::new(false));
        let backlog = Arc::new(Backlog::default());

        let worker_stopped = Arc::clone(&stopped);
        let worker_backlog = Arc::clone(&backlog);
        let mut renderer = renderer;
        let worker = thread::Builder::new()
            .name("answer-stream-delivery".to_string())
            .spawn(move || {
                while let Some(block) = receiver.blocking_recv() {
                    if worker_stopped.load(Ordering::SeqCst) {
                        break;
                    }

                    let rendered = catch_unwind(AssertUnwindSafe(|| renderer.render(block)));
                    if rendered.is_err() {
                        tracing::error!("block renderer panicked; continuing with next block");
                    }
                    worker_backlog.decrement();
                }

                worker_backlog.clear();
                tracing::debug!("delivery worker exited");
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            stopped,
            backlog,
        })
    }

    /// Queues `block` for delivery without blocking.
    ///
    /// Returns false once the queue has been shut down; the block is dropped.
    pub fn enqueue(&self, block: Block) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }

        let Some(sender) = self.sender.as_ref() else {
            return false;
        };

        self.backlog.increment();
        if sender.send(block).is_err() {
            self.backlog.decrement();
            return false;
        }

        true
    }

    /// Number of blocks enqueued but not yet rendered.
    #[must_use]
    pub fn pending(&self) -> usize {
        *lock_unpoisoned(&self.backlog.pending)
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Blocks the caller until every enqueued block has been rendered.
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        self.backlog.wait_until_drained(timeout)
    }

    #[must_use]
    pub fn drain_handle(&self) -> DrainHandle {
        DrainHandle {
            backlog: Arc::clone(&self.backlog),
        }
    }

    /// Stops accepting and rendering blocks without waiting for the worker.
    ///
    /// A block already being rendered finishes; everything queued behind it
    /// is discarded.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            tracing::debug!(discarded = self.pending(), "delivery queue stopped");
        }
    }

    /// Stops delivery and joins the worker. Undelivered blocks are discarded.
    pub fn shutdown(&mut self) {
        self.stop();
        self.sender.take();

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
            tracing::debug!("delivery worker joined");
        }
        self.backlog.clear();
    }
}

impl Drop for DeliveryQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("pending", &self.pending())
            .field("stopped", &self.is_shut_down())
            .finish()
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
