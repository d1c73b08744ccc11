//! The scheduler pool: worker threads, queues, and the scheduling entry
//! point.
//!
//! Each worker owns a local deque popped LIFO for cache locality; peers
//! steal FIFO from the far end. A global injector receives work from
//! non-worker threads. A runnable actor resides in exactly one queue: the
//! idle -> scheduled CAS in the control block elects a single producer, and
//! only that producer inserts the actor.

// Layer 1: Standard library imports
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

// Layer 2: Third-party crate imports
use crossbeam_deque::{Injector, Stealer, Worker};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::worker::worker_loop;
use crate::actor::control::ControlBlock;

/// A schedulable unit of actor execution.
///
/// One call to [`resume`](Resumable::resume) is a *resumption*: it
/// dispatches up to the throughput bound of messages, then returns so other
/// actors on the same worker get their turn.
pub(crate) trait Resumable: Send + Sync {
    /// The control block carrying the run-state this job is scheduled
    /// through.
    fn control(&self) -> &Arc<ControlBlock>;

    /// Execute one resumption.
    fn resume(&self, throughput: usize);
}

/// How work is distributed across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerPolicy {
    /// Local deques with stealing (default).
    WorkStealing,
    /// A single shared queue all workers pop from.
    Sharing,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        SchedulerPolicy::WorkStealing
    }
}

pub(crate) enum Job {
    Resume(Arc<dyn Resumable>),
    /// Shutdown sentinel; the worker that pops it exits its loop.
    Terminate,
}

thread_local! {
    // (owning pool, local deque) of the worker running on this thread.
    // The deque pointer stays valid for the worker thread's lifetime and is
    // only dereferenced from that thread.
    static LOCAL_QUEUE: Cell<Option<(*const PoolInner, *const Worker<Job>)>> =
        const { Cell::new(None) };
}

pub(crate) struct PoolInner {
    pub(super) injector: Injector<Job>,
    pub(super) stealers: Vec<Stealer<Job>>,
    pub(super) policy: SchedulerPolicy,
    pub(super) throughput: usize,
    pub(super) shutdown: AtomicBool,
    pub(super) idle_lock: Mutex<()>,
    pub(super) idle_cv: Condvar,
}

impl PoolInner {
    pub(super) fn notify_one(&self) {
        let _guard = self.idle_lock.lock();
        self.idle_cv.notify_one();
    }

    pub(super) fn notify_all(&self) {
        let _guard = self.idle_lock.lock();
        self.idle_cv.notify_all();
    }

    /// Park an idle worker briefly; spurious wakeups are fine, the caller
    /// rescans its queues either way.
    pub(super) fn idle_wait(&self) {
        let mut guard = self.idle_lock.lock();
        if self.shutdown.load(Ordering::Acquire) || !self.injector.is_empty() {
            return;
        }
        self.idle_cv
            .wait_for(&mut guard, Duration::from_millis(50));
    }

    pub(super) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Re-insert a still-runnable actor at the shared end for fairness.
    pub(super) fn reinsert(&self, job: Arc<dyn Resumable>) {
        self.injector.push(Job::Resume(job));
        self.notify_one();
    }

    pub(super) fn install_local(&self, queue: &Worker<Job>) {
        LOCAL_QUEUE.with(|slot| {
            slot.set(Some((
                self as *const PoolInner,
                queue as *const Worker<Job>,
            )));
        });
    }

    pub(super) fn clear_local(&self) {
        LOCAL_QUEUE.with(|slot| slot.set(None));
    }
}

/// The fixed-size worker pool.
pub(crate) struct SchedulerPool {
    inner: Arc<PoolInner>,
    worker_count: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SchedulerPool {
    /// Spawn `worker_count` workers and return the running pool.
    pub(crate) fn start(
        worker_count: usize,
        throughput: usize,
        policy: SchedulerPolicy,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let mut locals = Vec::with_capacity(worker_count);
        let mut stealers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let local = Worker::new_lifo();
            stealers.push(local.stealer());
            locals.push(local);
        }

        let inner = Arc::new(PoolInner {
            injector: Injector::new(),
            stealers,
            policy,
            throughput: throughput.max(1),
            shutdown: AtomicBool::new(false),
            idle_lock: Mutex::new(()),
            idle_cv: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(worker_count);
        for (index, local) in locals.into_iter().enumerate() {
            let inner = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("skein-worker-{index}"))
                .spawn(move || worker_loop(index, local, &inner));
            if let Ok(handle) = handle {
                handles.push(handle);
            }
        }

        Self {
            inner,
            worker_count,
            workers: Mutex::new(handles),
        }
    }

    /// Insert a runnable actor.
    ///
    /// Under work-stealing, a producer that is itself a worker of this pool
    /// pushes to its local deque; everyone else goes through the injector.
    pub(crate) fn schedule(&self, job: Arc<dyn Resumable>) {
        if self.inner.is_shutdown() {
            // Late schedule during teardown: undo so termination proceeds.
            job.control().state().transition(
                crate::actor::lifecycle::RunState::Scheduled,
                crate::actor::lifecycle::RunState::Idle,
            );
            return;
        }
        let inner_ptr = Arc::as_ptr(&self.inner);
        let stealing = self.inner.policy == SchedulerPolicy::WorkStealing;
        let leftover = LOCAL_QUEUE.with(|slot| match slot.get() {
            Some((pool, queue)) if stealing && pool == inner_ptr => {
                // Same-thread push onto this worker's own deque.
                unsafe { (*queue).push(Job::Resume(job)) };
                None
            }
            _ => Some(job),
        });
        if let Some(job) = leftover {
            self.inner.injector.push(Job::Resume(job));
        }
        self.inner.notify_one();
    }

    /// Number of worker threads.
    pub(crate) fn workers(&self) -> usize {
        self.worker_count
    }

    /// Set the shutdown flag, inject one sentinel per worker, and join.
    pub(crate) fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        for _ in 0..self.worker_count {
            self.inner.injector.push(Job::Terminate);
        }
        self.inner.notify_all();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Drop for SchedulerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
