//! Synchronous request/response correlation.

pub mod ledger;

pub use ledger::{ErrorResponseMsg, PeerDownMsg, RequestError, RequestTimeoutMsg};
pub(crate) use ledger::{Continuation, Ledger};
