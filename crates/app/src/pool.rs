//! Fixed-size worker pool with non-blocking dispatch.
//!
//! Each worker owns an `mpsc` channel. A dispatch claims an idle worker by
//! popping its index from a mutex-guarded idle list, so two concurrent
//! dispatches can never claim the same worker. When no worker is idle the
//! job is dropped, not queued.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Unit of work run on a worker thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    idle: Arc<Mutex<Vec<usize>>>,
    senders: Vec<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers named `action-worker-<n>`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a thread cannot be spawned.
    pub fn new(size: usize) -> std::io::Result<Self> {
        let idle = Arc::new(Mutex::new(Vec::with_capacity(size)));
        let mut senders = Vec::with_capacity(size);
        let mut handles = Vec::with_capacity(size);
        for index in 0..size {
            let (sender, receiver) = mpsc::channel::<Job>();
            let worker_idle = Arc::clone(&idle);
            let handle = thread::Builder::new()
                .name(format!("action-worker-{index}"))
                .spawn(move || {
                    for job in receiver {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::error!(worker = index, "action job panicked");
                        }
                        worker_idle
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(index);
                    }
                })?;
            senders.push(sender);
            handles.push(handle);
        }
        // workers become claimable in index order
        idle.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend((0..size).rev());
        Ok(Self {
            idle,
            senders,
            handles,
        })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.senders.len()
    }

    #[must_use]
    pub fn idle_workers(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Hand `job` to an idle worker. Returns `false`, dropping the job,
    /// when every worker is busy.
    pub fn try_dispatch(&self, job: Job) -> bool {
        let claimed = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let Some(index) = claimed else {
            return false;
        };
        if self.senders[index].send(job).is_err() {
            tracing::error!(worker = index, "worker is gone");
            return false;
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.senders.clear();
        let current = thread::current().id();
        for handle in self.handles.drain(..) {
            // the last owner may be a job running on this very worker
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}
