//! # skein-rt - Cooperative Actor Runtime
//!
//! Location-transparent, message-passing concurrency with typed handles,
//! synchronous request/response, group multicast, and cooperative
//! fibre-based execution.
//!
//! # Quick Start
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use skein_rt::prelude::*;
//! use std::time::Duration;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
//! struct Plus;
//!
//! let system = ActorSystem::new(SystemConfig::default()).unwrap();
//!
//! // An adder: answers (Plus, x, y) requests with (x + y,).
//! let adder = system
//!     .spawn(|_| Behavior::new().on(|_, (_, x, y): (Plus, i64, i64)| (x + y,)))
//!     .unwrap();
//!
//! // Drive it synchronously from a scoped actor.
//! let mut driver = system.scoped();
//! let sum = driver
//!     .request(&adder, payload!(Plus, 3i64, 4i64), Duration::from_secs(1))
//!     .unwrap();
//! assert_eq!(sum.get::<i64>(0), Some(&7));
//!
//! drop(driver);
//! system.shutdown().unwrap();
//! ```
//!
//! # Core Concepts
//!
//! - **Actors** are independently scheduled units of execution identified
//!   by an [`Address`](actor::Address) and reachable only through messages.
//! - **Payloads** ([`message::Payload`]) are type-erased, copy-on-write
//!   tuples; the [`payload!`] macro builds statically typed ones with O(1)
//!   shape checks.
//! - **Behaviors** ([`actor::Behavior`]) are ordered pattern arms matched
//!   against received payloads, with optional guards, a timeout arm, and a
//!   composable become/unbecome stack.
//! - **Requests** correlate a response to each request id exactly once:
//!   success, error response, or timeout.
//! - **Links and monitors** propagate exits (symmetric) or deliver down
//!   notifications (asymmetric).
//! - **Groups** ([`group::Group`]) are named multicast destinations with
//!   snapshot delivery.
//!
//! # Execution Model
//!
//! Event-based actors run as behavior state machines on a fixed
//! work-stealing worker pool; within one actor execution is strictly
//! serial. Blocking actors own a dedicated OS thread and receive on
//! demand, their bodies hosted on a cooperative fibre ([`fibre`]). A
//! dedicated clock thread ([`clock`]) serves delayed sends, request
//! timeouts and receive-timeout arms.
//!
//! # Module Organization
//!
//! - [`actor`] - addresses, handles, control blocks, behaviors, contexts
//! - [`message`] - message ids, payload tuples, envelopes
//! - [`mailbox`] - the per-actor priority multi-queue
//! - [`request`] - the synchronous request ledger
//! - [`scheduler`] - the work-stealing worker pool
//! - [`clock`] - the timer service
//! - [`group`] - multicast groups and their registry
//! - [`system`] - system construction, spawning, shutdown
//! - [`fibre`] - the cooperative stack-switching primitive
//! - [`inspect`] - per-slot payload visitation for boundary serializers
//! - [`monitoring`] - in-process runtime event observation

pub mod actor;
pub mod clock;
pub mod error;
pub mod fibre;
pub mod group;
pub mod inspect;
pub mod mailbox;
pub mod message;
pub mod monitoring;
pub mod prelude;
pub mod request;
pub mod scheduler;
pub mod system;
pub mod util;

// Re-export commonly used types
pub use actor::{
    Accepts, ActorHandle, Address, Behavior, BlockingContext, Context, DownMsg, ExitMsg,
    ExitReason, HandleError, IntoReply, Protocol, ReceiveError, ScopedActor, SendError,
    TypedHandle, Unmatched,
};
pub use clock::{Clock, TimerHandle};
pub use error::ErrorCode;
pub use group::{Group, GroupError, GroupRegistry};
pub use mailbox::EnqueueError;
pub use message::{Envelope, MessageId, MessageKind, MessageTuple, Payload, Shape};
pub use monitoring::{InMemoryMonitor, Monitor, NoopMonitor, RuntimeEvent};
pub use request::RequestError;
pub use scheduler::SchedulerPolicy;
pub use system::{ActorSystem, SpawnError, SystemConfig, SystemError};
pub use util::{ActorId, HostId, NodeId};
