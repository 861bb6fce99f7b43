//! Bounded-concurrency task pool with error aggregation
//!
//! A [`Pool`] owns a bounded queue of [`Task`]s and a fixed number of
//! workers. Tasks are admitted without blocking, the pool is run exactly
//! once, and the run returns a [`RunReport`] that accounts for every
//! admitted task: succeeded, errored, panicked, or dropped on cancellation.

mod error;
mod report;
mod task;

pub use error::PoolError;
pub use report::RunReport;
pub use task::Task;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Default number of workers when none is configured
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Lifecycle of a pool: `Open → Closed → Draining → Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Open,
    Closed,
    Draining,
    Done,
}

type Queue<E> = Arc<tokio::sync::Mutex<mpsc::Receiver<Task<E>>>>;

/// Per-run outcome counters shared by all workers
struct Tally<E> {
    errors: Arc<Mutex<Vec<E>>>,
    succeeded: AtomicUsize,
    panicked: AtomicUsize,
}

/// Bounded task pool.
///
/// `add_task` and `close` take `&self`, so a pool can be shared between
/// producers behind an `Arc` while the owner awaits `run`.
pub struct Pool<E> {
    max_concurrency: usize,
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<Task<E>>>>,
    receiver: Mutex<Option<mpsc::Receiver<Task<E>>>>,
    errors: Arc<Mutex<Vec<E>>>,
    admitted: AtomicUsize,
    state: Mutex<PoolState>,
}

impl<E: Send + 'static> Pool<E> {
    /// Create an open pool. Zero values for either limit are raised to one.
    pub fn new(max_concurrency: usize, queue_capacity: usize) -> Self {
        let capacity = queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            max_concurrency: max_concurrency.max(1),
            capacity,
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            errors: Arc::new(Mutex::new(Vec::new())),
            admitted: AtomicUsize::new(0),
            state: Mutex::new(PoolState::Open),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    /// Number of tasks accepted so far
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::SeqCst)
    }

    /// Enqueue a task without blocking.
    ///
    /// Fails with [`PoolError::Closed`] once the pool is closed and with
    /// [`PoolError::QueueFull`] when the bounded queue has no free slot.
    pub fn add_task(&self, task: Task<E>) -> Result<(), PoolError> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::Closed);
        };

        match sender.try_send(task) {
            Ok(()) => {
                self.admitted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(PoolError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Closed(_)) => Err(PoolError::Closed),
        }
    }

    /// Stop admitting tasks. Calling this more than once is a no-op.
    pub fn close(&self) {
        if self.sender.lock().take().is_some() {
            let mut state = self.state.lock();
            if *state == PoolState::Open {
                *state = PoolState::Closed;
            }
        }
    }

    /// Close admission and drain the queue with `max_concurrency` workers.
    ///
    /// Returns once every worker has exited. When `cancel` fires, idle
    /// workers stop immediately; tasks already running are expected to
    /// observe the same token. Tasks never dequeued are counted as dropped
    /// and produce no error entry.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport<E>, PoolError> {
        let receiver = self.receiver.lock().take().ok_or(PoolError::AlreadyRun)?;
        self.close();
        *self.state.lock() = PoolState::Draining;

        let queue: Queue<E> = Arc::new(tokio::sync::Mutex::new(receiver));
        let tally = Arc::new(Tally {
            errors: self.errors.clone(),
            succeeded: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        });

        tracing::debug!(
            workers = self.max_concurrency,
            queued = self.admitted(),
            "Starting pool run"
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.max_concurrency {
            workers.spawn(worker_loop(
                worker_id,
                queue.clone(),
                cancel.clone(),
                tally.clone(),
            ));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Pool worker terminated abnormally");
            }
        }

        let mut dropped = 0;
        {
            let mut rx = queue.lock().await;
            while rx.try_recv().is_ok() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(dropped, "Run cancelled before all queued tasks started");
        }

        *self.state.lock() = PoolState::Done;

        Ok(RunReport {
            admitted: self.admitted(),
            succeeded: tally.succeeded.load(Ordering::SeqCst),
            errors: std::mem::take(&mut *self.errors.lock()),
            panicked: tally.panicked.load(Ordering::SeqCst),
            dropped,
        })
    }
}

async fn worker_loop<E: Send + 'static>(
    worker_id: usize,
    queue: Queue<E>,
    cancel: CancellationToken,
    tally: Arc<Tally<E>>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(worker = worker_id, "Worker observed cancellation");
                break;
            }
            task = async { queue.lock().await.recv().await } => task,
        };

        // Queue closed and empty
        let Some(task) = next else {
            break;
        };

        let label = task.label().to_string();
        match AssertUnwindSafe(task.execute(cancel.clone()))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {
                tally.succeeded.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Err(e)) => {
                tally.errors.lock().push(e);
            }
            Err(_) => {
                tally.panicked.fetch_add(1, Ordering::SeqCst);
                tracing::error!(worker = worker_id, task = %label, "Task panicked");
            }
        }
    }
}
