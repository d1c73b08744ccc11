//! Actors: addresses, handles, control blocks, behaviors, and the two
//! execution variants (event-based and blocking).

pub mod address;
pub mod behavior;
pub mod blocking;
pub(crate) mod control;
pub mod context;
pub(crate) mod dispatch;
pub(crate) mod event;
pub mod exit;
pub mod handle;
pub mod lifecycle;

pub use address::Address;
pub use behavior::{Behavior, IntoReply, Unmatched};
pub use blocking::{BlockingContext, DoReceive, ReceiveError, ScopedActor};
pub use context::Context;
pub use exit::{DownMsg, ExitMsg, ExitReason};
pub use handle::{Accepts, ActorHandle, HandleError, Protocol, SendError, TypedHandle};
pub use lifecycle::RunState;
