//! The per-actor multi-queue.
//!
//! Three FIFO sub-queues selected by message-id bits: *urgent*, *normal* and
//! *response*. Enqueue is safe from any thread; dequeue is performed only by
//! the actor's own activation. Dequeue policy:
//!
//! 1. if the consumer awaits responses and a matching response is present,
//!    return it first;
//! 2. otherwise the head of *urgent*, then *normal*;
//! 3. finally stale responses nobody awaits, so they can be discarded.
//!
//! An optional capacity caps the normal and request traffic; urgent traffic
//! and responses bypass the cap so exit notifications and pending
//! request/response pairs cannot be lost to backpressure.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

// Layer 2: Third-party crate imports
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

// Layer 3: Internal module imports
use crate::message::Envelope;

/// Failure modes of [`Mailbox::push`].
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    /// Capacity reached; the message was dropped.
    #[error("mailbox is full (capacity: {capacity})")]
    Full {
        /// The configured cap.
        capacity: usize,
    },

    /// The owning actor has terminated.
    #[error("mailbox is closed")]
    Closed,
}

/// Outcome of a successful push, as seen by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    /// The mailbox already held mail.
    NonEmpty,
    /// This push took the mailbox from empty to non-empty; the producer is
    /// responsible for publishing a schedule signal.
    WasEmpty,
}

pub(crate) struct Mailbox {
    urgent_tx: Sender<Envelope>,
    urgent_rx: Receiver<Envelope>,
    normal_tx: Sender<Envelope>,
    normal_rx: Receiver<Envelope>,
    response_tx: Sender<Envelope>,
    response_rx: Receiver<Envelope>,
    /// Responses pulled off the channel but not yet wanted by the consumer.
    stash: Mutex<VecDeque<Envelope>>,
    len: AtomicUsize,
    capacity: usize,
    closed: AtomicBool,
    park_lock: Mutex<()>,
    park_cv: Condvar,
}

impl Mailbox {
    /// Create a mailbox; `capacity` 0 means unbounded.
    pub(crate) fn new(capacity: usize) -> Self {
        let (urgent_tx, urgent_rx) = unbounded();
        let (normal_tx, normal_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();
        Self {
            urgent_tx,
            urgent_rx,
            normal_tx,
            normal_rx,
            response_tx,
            response_rx,
            stash: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
            capacity,
            closed: AtomicBool::new(false),
            park_lock: Mutex::new(()),
            park_cv: Condvar::new(),
        }
    }

    /// Enqueue from any thread, routing by the message-id header bits.
    pub(crate) fn push(&self, envelope: Envelope) -> Result<PushOutcome, EnqueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EnqueueError::Closed);
        }
        let bypasses_cap = envelope.mid.is_response() || envelope.mid.is_urgent();
        if self.capacity > 0 && !bypasses_cap && self.len.load(Ordering::Acquire) >= self.capacity {
            return Err(EnqueueError::Full {
                capacity: self.capacity,
            });
        }
        let queue = if envelope.mid.is_response() {
            &self.response_tx
        } else if envelope.mid.is_urgent() {
            &self.urgent_tx
        } else {
            &self.normal_tx
        };
        queue.send(envelope).map_err(|_| EnqueueError::Closed)?;
        let was_empty = self.len.fetch_add(1, Ordering::AcqRel) == 0;
        self.notify();
        if was_empty {
            Ok(PushOutcome::WasEmpty)
        } else {
            Ok(PushOutcome::NonEmpty)
        }
    }

    /// Pop the next deliverable element honoring priority and
    /// awaited-response precedence. Consumer-side only.
    pub(crate) fn dequeue(&self, awaited: impl Fn(u64) -> bool) -> Option<Envelope> {
        let mut stash = self.stash.lock();
        while let Ok(env) = self.response_rx.try_recv() {
            stash.push_back(env);
        }
        if let Some(pos) = stash.iter().position(|e| awaited(e.mid.sequence())) {
            let env = stash.remove(pos)?;
            drop(stash);
            self.len.fetch_sub(1, Ordering::AcqRel);
            return Some(env);
        }
        drop(stash);

        if let Ok(env) = self.urgent_rx.try_recv() {
            self.len.fetch_sub(1, Ordering::AcqRel);
            return Some(env);
        }
        if let Ok(env) = self.normal_rx.try_recv() {
            self.len.fetch_sub(1, Ordering::AcqRel);
            return Some(env);
        }

        // Stale responses: deliver last so the dispatcher can discard them.
        let env = self.stash.lock().pop_front()?;
        self.len.fetch_sub(1, Ordering::AcqRel);
        Some(env)
    }

    /// Take the response with the given sequence if it has arrived, leaving
    /// all other mail queued.
    pub(crate) fn try_take_response(&self, sequence: u64) -> Option<Envelope> {
        let mut stash = self.stash.lock();
        while let Ok(env) = self.response_rx.try_recv() {
            stash.push_back(env);
        }
        let pos = stash.iter().position(|e| e.mid.sequence() == sequence)?;
        let env = stash.remove(pos)?;
        drop(stash);
        self.len.fetch_sub(1, Ordering::AcqRel);
        Some(env)
    }

    /// Wait for a response with the given sequence, leaving all other mail
    /// queued. Used by blocking synchronous requests.
    pub(crate) fn dequeue_response(&self, sequence: u64, deadline: Instant) -> Option<Envelope> {
        loop {
            if let Some(env) = self.try_take_response(sequence) {
                return Some(env);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            let mut guard = self.park_lock.lock();
            // Re-check under the lock so a racing push cannot be missed.
            if !self.response_rx.is_empty() || self.closed.load(Ordering::Acquire) {
                continue;
            }
            if self.park_cv.wait_until(&mut guard, deadline).timed_out() {
                return None;
            }
        }
    }

    /// Pop any remaining element during termination, ignoring policy.
    pub(crate) fn drain_next(&self) -> Option<Envelope> {
        let from_stash = self.stash.lock().pop_front();
        let env = from_stash
            .or_else(|| self.response_rx.try_recv().ok())
            .or_else(|| self.urgent_rx.try_recv().ok())
            .or_else(|| self.normal_rx.try_recv().ok())?;
        self.len.fetch_sub(1, Ordering::AcqRel);
        Some(env)
    }

    /// Approximate number of queued messages.
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject all further pushes and wake any parked consumer.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _guard = self.park_lock.lock();
        self.park_cv.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Park the consumer until mail arrives, the deadline passes, or the
    /// mailbox closes. Returns `false` on timeout.
    pub(crate) fn park(&self, deadline: Option<Instant>) -> bool {
        let mut guard = self.park_lock.lock();
        if self.len() > 0 || self.is_closed() {
            return true;
        }
        match deadline {
            Some(at) => !self.park_cv.wait_until(&mut guard, at).timed_out(),
            None => {
                self.park_cv.wait(&mut guard);
                true
            }
        }
    }

    fn notify(&self) {
        let _guard = self.park_lock.lock();
        self.park_cv.notify_all();
    }
}
