//! The timer service: a monotonic priority queue of scheduled actions.

pub mod service;

pub use service::{Clock, TimerHandle};
