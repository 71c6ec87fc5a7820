//! Fixed-size worker pool.
//!
//! Workers pull boxed jobs from a shared crossbeam channel. Each submitted job
//! reports back through its own one-slot channel, which the caller holds as a
//! [`TaskHandle`]. Panics are caught at the job boundary so a faulty job never
//! takes a worker down with it.
//!
//! Shutdown is two-phase: close the queue and wait, then raise the cancel flag
//! (queued jobs are discarded, running jobs can poll
//! [`PoolHandle::is_cancelled`]) and wait once more. Workers that still have
//! not exited are detached.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::SearchError;

/// Second shutdown interval used when none is configured.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(60);

/// Worker thread name prefix used when none is configured.
pub const DEFAULT_THREAD_NAME: &str = "fsearch-worker";

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a submitted job produced no value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task cancelled before it could run")]
    Cancelled,
}

/// How a [`WorkerPool::shutdown`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStatus {
    /// All queued and running work finished within the timeout.
    Graceful,

    /// Work had to be cancelled, after which every worker exited.
    Cancelled,

    /// Some workers were still busy after cancellation and were detached.
    Abandoned,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Shared {
    /// `None` once the pool stopped accepting work.
    sender: RwLock<Option<Sender<Job>>>,
    cancelled: AtomicBool,
}

/// Cloneable submission handle.
///
/// Running jobs use this to dispatch further jobs onto the same pool.
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<Shared>,
}

impl PoolHandle {
    /// Queue `work` for execution. Never blocks.
    ///
    /// # Errors
    ///
    /// [`SearchError::PoolShutdown`] once shutdown has begun.
    pub fn submit<F, T>(&self, work: F) -> Result<TaskHandle<T>, SearchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work))
                .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
            // Nobody is waiting if the handle was dropped.
            let _ = tx.send(outcome);
        });

        let sender = self.shared.sender.read().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender.send(job).map_err(|_| SearchError::PoolShutdown)?,
            None => return Err(SearchError::PoolShutdown),
        }

        Ok(TaskHandle { rx })
    }

    /// True once shutdown escalated to forced cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// True once the pool stopped accepting work.
    pub fn is_shut_down(&self) -> bool {
        self.shared
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn close(&self) {
        self.shared
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// The eventual result of one submitted job.
pub struct TaskHandle<T> {
    rx: Receiver<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    /// Block until the job finished.
    ///
    /// A job discarded by forced cancellation reports [`TaskError::Cancelled`].
    pub fn join(self) -> Result<T, TaskError> {
        self.rx.recv().unwrap_or(Err(TaskError::Cancelled))
    }
}

/// Wait for every handle and collect one result per handle.
///
/// A failed job does not affect the others.
pub fn await_all<T, I>(handles: I) -> Vec<Result<T, TaskError>>
where
    I: IntoIterator<Item = TaskHandle<T>>,
{
    handles.into_iter().map(TaskHandle::join).collect()
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// A bounded set of worker threads with an unbounded job queue.
pub struct WorkerPool {
    handle: PoolHandle,
    size: usize,
    cancel_grace: Duration,
    lifecycle: Mutex<Lifecycle>,
}

struct Lifecycle {
    workers: Vec<JoinHandle<()>>,
    exited: Receiver<usize>,
    running: usize,
}

impl WorkerPool {
    /// Create a pool of `size` workers with default naming and cancel grace.
    pub fn new(size: usize) -> Result<Self, SearchError> {
        Self::with_options(size, DEFAULT_THREAD_NAME, DEFAULT_CANCEL_GRACE)
    }

    pub(crate) fn with_options(
        size: usize,
        thread_name: &str,
        cancel_grace: Duration,
    ) -> Result<Self, SearchError> {
        if size == 0 {
            return Err(SearchError::InvalidThreadCount(size));
        }

        let (job_tx, job_rx) = unbounded::<Job>();
        let (exit_tx, exit_rx) = unbounded::<usize>();
        let handle = PoolHandle {
            shared: Arc::new(Shared {
                sender: RwLock::new(Some(job_tx)),
                cancelled: AtomicBool::new(false),
            }),
        };

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let jobs = job_rx.clone();
            let shared = Arc::clone(&handle.shared);
            let exited = exit_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", thread_name, id))
                .spawn(move || worker_loop(id, jobs, shared, exited));

            match spawned {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    // Workers already started drain and exit on their own.
                    handle.close();
                    return Err(SearchError::ThreadPool(e.to_string()));
                }
            }
        }

        info!(workers = size, "Worker pool started");

        Ok(Self {
            handle,
            size,
            cancel_grace,
            lifecycle: Mutex::new(Lifecycle {
                workers,
                exited: exit_rx,
                running: size,
            }),
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// A cloneable handle for submitting work.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// See [`PoolHandle::submit`].
    pub fn submit<F, T>(&self, work: F) -> Result<TaskHandle<T>, SearchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.handle.submit(work)
    }

    /// True once [`shutdown`](WorkerPool::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.handle.is_shut_down()
    }

    /// Stop accepting work and wind the workers down.
    ///
    /// Waits up to `timeout` for queued and running jobs. If workers remain,
    /// cancellation is forced and the pool waits up to the configured cancel
    /// grace. Workers still busy after that are detached and a warning is
    /// logged. Calling this again is harmless.
    pub fn shutdown(&self, timeout: Duration) -> ShutdownStatus {
        self.handle.close();

        let mut life = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

        debug!(timeout_ms = timeout.as_millis() as u64, "Waiting for workers to drain");
        if life.wait_until(deadline_after(timeout)) {
            life.join_all();
            info!("Worker pool shut down");
            return ShutdownStatus::Graceful;
        }

        warn!(
            running = life.running,
            timeout_ms = timeout.as_millis() as u64,
            "Worker pool did not drain in time, cancelling remaining work"
        );
        self.handle.shared.cancelled.store(true, Ordering::Release);

        if life.wait_until(deadline_after(self.cancel_grace)) {
            life.join_all();
            info!("Worker pool shut down after cancellation");
            return ShutdownStatus::Cancelled;
        }

        let err = SearchError::ShutdownTimeout(timeout.saturating_add(self.cancel_grace));
        warn!(running = life.running, error = %err, "Abandoning unresponsive workers");
        life.workers.clear();
        ShutdownStatus::Abandoned
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers finish whatever is queued, then exit detached.
        self.handle.close();
    }
}

impl Lifecycle {
    /// Count worker exits until none are running or `deadline` passes.
    fn wait_until(&mut self, deadline: Instant) -> bool {
        while self.running > 0 {
            match self.exited.recv_deadline(deadline) {
                Ok(_) => self.running -= 1,
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => self.running = 0,
            }
        }
        true
    }

    fn join_all(&mut self) {
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Worker thread panicked outside of a job");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker loop
// ---------------------------------------------------------------------------

/// Reports the worker's exit even if the loop unwinds.
struct ExitGuard {
    id: usize,
    exited: Sender<usize>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let _ = self.exited.send(self.id);
    }
}

fn worker_loop(id: usize, jobs: Receiver<Job>, shared: Arc<Shared>, exited: Sender<usize>) {
    let _guard = ExitGuard { id, exited };

    // Ends once the queue is closed and drained.
    for job in jobs.iter() {
        if shared.cancelled.load(Ordering::Acquire) {
            drop(job);
            continue;
        }
        job();
    }

    debug!(worker = id, "Worker exiting");
}

fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait)
        .unwrap_or_else(|| now + Duration::from_secs(u64::from(u32::MAX)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
