//! Convenience re-exports for the common surface.
//!
//! ```rust
//! use skein_rt::prelude::*;
//! ```

pub use crate::actor::{
    ActorHandle, Address, Behavior, BlockingContext, Context, DownMsg, ExitMsg, ExitReason,
    Protocol, ScopedActor, SendError, TypedHandle, Unmatched,
};
pub use crate::error::ErrorCode;
pub use crate::group::Group;
pub use crate::message::{Envelope, MessageId, Payload, Shape};
pub use crate::payload;
pub use crate::request::RequestError;
pub use crate::scheduler::SchedulerPolicy;
pub use crate::system::{ActorSystem, SpawnError, SystemConfig, SystemError};
pub use crate::util::{ActorId, NodeId};
