//! Event taxonomy and the monitor trait.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::actor::{Address, ExitReason};

/// Something the runtime wants observed.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// The system started with this many scheduler workers.
    SystemStarted {
        /// Worker thread count.
        workers: usize,
    },

    /// Graceful shutdown completed.
    SystemShutdown,

    /// An actor came to life.
    ActorSpawned {
        /// Its address.
        address: Address,
        /// Whether it is a hidden system actor.
        hidden: bool,
    },

    /// An actor terminated.
    ActorTerminated {
        /// Its address.
        address: Address,
        /// Why it ended.
        reason: ExitReason,
    },

    /// A message was dropped by a capped mailbox.
    MessageDropped {
        /// The destination whose mailbox was full.
        target: Address,
    },

    /// A group delivered a message to its subscriber snapshot.
    GroupBroadcast {
        /// Module name, e.g. `local`.
        module: String,
        /// Group identifier.
        identifier: String,
        /// Snapshot size at delivery time.
        subscribers: usize,
    },
}

/// Sink for runtime events.
///
/// Implementations must be cheap and non-blocking; they run on scheduler
/// workers and producer threads.
pub trait Monitor: Send + Sync + 'static {
    /// Observe one event.
    fn record(&self, event: &RuntimeEvent);
}
