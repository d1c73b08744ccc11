//! Named multicast groups and their subscriber sets.

pub mod local;
pub mod registry;

pub use local::{ForwardMsg, Group, JoinMsg, LeaveMsg};
pub use registry::{GroupError, GroupModule, GroupRegistry};
