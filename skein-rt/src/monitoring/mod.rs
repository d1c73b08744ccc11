//! In-process runtime observability.
//!
//! The runtime reports noteworthy events through a [`Monitor`] injected at
//! system construction. The default monitor discards everything; the
//! in-memory monitor records events for tests and diagnostics.

pub mod events;
pub mod in_memory;
pub mod noop;

pub use events::{Monitor, RuntimeEvent};
pub use in_memory::InMemoryMonitor;
pub use noop::NoopMonitor;
