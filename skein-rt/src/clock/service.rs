//! Deadline-ordered action scheduling on a dedicated thread.
//!
//! A single background thread owns a min-heap keyed by absolute monotonic
//! deadline. Scheduling an entry earlier than the current head wakes the
//! thread. Cancelled entries are disposed in place and lazily removed; a
//! configurable cleanup interval periodically rebuilds the heap so
//! long-lived, heavily cancelled workloads stay bounded.

// Layer 1: Standard library imports
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use parking_lot::{Condvar, Mutex};

// Layer 3: Internal module imports
// (none)

type ActionFn = Box<dyn FnOnce() + Send>;

/// A run-once, disposable callable.
struct Action {
    f: Mutex<Option<ActionFn>>,
    disposed: AtomicBool,
}

impl Action {
    fn new(f: ActionFn) -> Self {
        Self {
            f: Mutex::new(Some(f)),
            disposed: AtomicBool::new(false),
        }
    }

    /// Run unless already disposed; running disposes.
    fn run(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(f) = self.f.lock().take() {
            f();
        }
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.f.lock().take();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Cancellation handle for a scheduled action.
///
/// Cancelling after the action fired is a no-op. Dropping the handle does
/// not cancel.
#[derive(Clone)]
pub struct TimerHandle {
    action: Arc<Action>,
}

impl TimerHandle {
    /// An already-disposed handle, for paths where no clock is available.
    pub(crate) fn detached() -> Self {
        let action = Arc::new(Action::new(Box::new(|| {})));
        action.dispose();
        Self { action }
    }

    /// Mark the underlying action disposed; the heap entry is removed
    /// lazily.
    pub fn cancel(&self) {
        self.action.dispose();
    }

    /// Whether the action already ran or was cancelled.
    pub fn is_disposed(&self) -> bool {
        self.action.is_disposed()
    }
}

struct Entry {
    deadline: Instant,
    action: Arc<Action>,
}

// Min-heap on deadline; entries with equal deadlines have unspecified
// relative order.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.deadline.cmp(&self.deadline)
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl Eq for Entry {}

struct ClockState {
    queue: BinaryHeap<Entry>,
    stopped: bool,
}

struct ClockInner {
    state: Mutex<ClockState>,
    cv: Condvar,
    cleanup_removed: AtomicUsize,
}

/// The timer service.
pub struct Clock {
    inner: Arc<ClockInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Clock {
    /// Start the clock thread.
    ///
    /// `cleanup_interval` of zero disables periodic heap rebuilds.
    pub fn start(cleanup_interval: Duration) -> Self {
        let inner = Arc::new(ClockInner {
            state: Mutex::new(ClockState {
                queue: BinaryHeap::new(),
                stopped: false,
            }),
            cv: Condvar::new(),
            cleanup_removed: AtomicUsize::new(0),
        });
        let thread_inner = Arc::clone(&inner);
        let worker = std::thread::Builder::new()
            .name("skein-clock".into())
            .spawn(move || run(&thread_inner, cleanup_interval))
            .ok();
        Self {
            inner,
            worker: Mutex::new(worker),
        }
    }

    /// Schedule `f` to run at `deadline`.
    ///
    /// Scheduling on a stopped clock disposes the action immediately and
    /// returns an already-disposed handle.
    pub fn schedule(&self, deadline: Instant, f: impl FnOnce() + Send + 'static) -> TimerHandle {
        let action = Arc::new(Action::new(Box::new(f)));
        let handle = TimerHandle {
            action: Arc::clone(&action),
        };
        let wake = {
            let mut state = self.inner.state.lock();
            if state.stopped {
                drop(state);
                action.dispose();
                return handle;
            }
            let wake = state
                .queue
                .peek()
                .is_none_or(|head| deadline < head.deadline);
            state.queue.push(Entry { deadline, action });
            wake
        };
        if wake {
            self.inner.cv.notify_one();
        }
        handle
    }

    /// Schedule `f` to run after `delay`.
    pub fn schedule_in(&self, delay: Duration, f: impl FnOnce() + Send + 'static) -> TimerHandle {
        self.schedule(Instant::now() + delay, f)
    }

    /// Number of entries currently in the heap, disposed ones included.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Total entries removed by cleanup passes.
    pub fn cleaned_up(&self) -> usize {
        self.inner.cleanup_removed.load(Ordering::Acquire)
    }

    /// Stop the thread, disposing every remaining entry.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.inner.cv.notify_all();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
        let drained = {
            let mut state = self.inner.state.lock();
            std::mem::take(&mut state.queue)
        };
        for entry in drained {
            entry.action.dispose();
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(inner: &ClockInner, cleanup_interval: Duration) {
    let mut guard = inner.state.lock();
    let mut next_cleanup = if cleanup_interval.is_zero() {
        None
    } else {
        Some(Instant::now() + cleanup_interval)
    };
    loop {
        if guard.stopped {
            return;
        }
        let now = Instant::now();
        if let Some(at) = next_cleanup {
            if now >= at {
                let before = guard.queue.len();
                let entries: Vec<Entry> = std::mem::take(&mut guard.queue)
                    .into_vec()
                    .into_iter()
                    .filter(|e| !e.action.is_disposed())
                    .collect();
                // Partition-then-rebuild keeps the pass linear even when
                // most entries are cancelled.
                guard.queue = BinaryHeap::from(entries);
                inner
                    .cleanup_removed
                    .fetch_add(before - guard.queue.len(), Ordering::AcqRel);
                next_cleanup = Some(now + cleanup_interval);
            }
        }
        match guard.queue.peek() {
            None => match next_cleanup {
                Some(at) => {
                    inner.cv.wait_until(&mut guard, at);
                }
                None => inner.cv.wait(&mut guard),
            },
            Some(head) if head.action.is_disposed() => {
                guard.queue.pop();
            }
            Some(head) => {
                let deadline = head.deadline;
                if now >= deadline {
                    if let Some(entry) = guard.queue.pop() {
                        // Run outside the lock so actions may schedule.
                        drop(guard);
                        entry.action.run();
                        guard = inner.state.lock();
                    }
                } else {
                    let wake_at = match next_cleanup {
                        Some(at) => deadline.min(at),
                        None => deadline,
                    };
                    inner.cv.wait_until(&mut guard, wake_at);
                }
            }
        }
    }
}
