//! Shared identity types for nodes and actors.

pub mod ids;

pub use ids::{ActorId, HostId, NodeId};
