//! Per-actor mailboxes with priority and response sub-queues.

pub mod queue;

pub use queue::EnqueueError;
pub(crate) use queue::Mailbox;
