//! Actor run-states and their atomic transition protocol.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU8, Ordering};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
// (none)

/// Scheduler-visible execution state of an actor.
///
/// Transitions are CAS-only so that at most one scheduler worker ever runs a
/// given actor:
///
/// ```text
/// Idle -> Scheduled -> Running -> Idle
///                         \-> Terminated (final)
/// ```
///
/// `Blocked` marks blocking actors parked inside `receive`; they never enter
/// the scheduler queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Not runnable and not enqueued anywhere.
    Idle = 0,
    /// Enqueued in exactly one scheduler queue.
    Scheduled = 1,
    /// Currently executing on a worker or a dedicated thread.
    Running = 2,
    /// Parked inside a blocking receive.
    Blocked = 3,
    /// Terminated; no further dispatch happens.
    Terminated = 4,
}

impl RunState {
    fn from_u8(raw: u8) -> RunState {
        match raw {
            1 => RunState::Scheduled,
            2 => RunState::Running,
            3 => RunState::Blocked,
            4 => RunState::Terminated,
            _ => RunState::Idle,
        }
    }
}

/// Atomic cell holding a [`RunState`].
#[derive(Debug)]
pub(crate) struct AtomicRunState(AtomicU8);

impl AtomicRunState {
    pub(crate) fn new(initial: RunState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub(crate) fn load(&self) -> RunState {
        RunState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// CAS `from -> to`; returns whether this caller won the transition.
    pub(crate) fn transition(&self, from: RunState, to: RunState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unconditionally enter `Terminated`, returning the previous state.
    pub(crate) fn terminate(&self) -> RunState {
        RunState::from_u8(self.0.swap(RunState::Terminated as u8, Ordering::AcqRel))
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.load() == RunState::Terminated
    }
}
