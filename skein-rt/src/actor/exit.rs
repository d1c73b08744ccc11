//! Exit reasons and the system messages that carry them.

// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::address::Address;
use crate::error::ErrorCode;

/// Why an actor terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// The actor finished on its own terms.
    Normal,
    /// System shutdown requested by the user.
    UserShutdown,
    /// Explicitly killed; ignores the trap-exit flag.
    Kill,
    /// The remote node hosting a peer went away.
    RemoteDisconnect,
    /// A fault, classified by code with a human-readable message.
    Error(ErrorCode, String),
}

impl ExitReason {
    /// Whether linked peers should terminate when they see this reason.
    ///
    /// Only `Normal` exits are silent; every other reason propagates through
    /// links unless the peer traps exits.
    pub fn propagates(&self) -> bool {
        !matches!(self, ExitReason::Normal)
    }

    /// Build a fault reason from a code and message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ExitReason::Error(code, message.into())
    }
}

impl Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => f.write_str("normal"),
            ExitReason::UserShutdown => f.write_str("user_shutdown"),
            ExitReason::Kill => f.write_str("kill"),
            ExitReason::RemoteDisconnect => f.write_str("remote_disconnect"),
            ExitReason::Error(code, msg) => write!(f, "{code}: {msg}"),
        }
    }
}

/// Exit notification delivered through link edges.
///
/// Travels urgent. Actors with the trap-exit flag receive it like ordinary
/// mail; everyone else terminates with the carried reason (unless it is
/// `Normal`, which is dropped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitMsg {
    /// The terminated peer.
    pub source: Address,
    /// Its exit reason.
    pub reason: ExitReason,
}

/// Down notification delivered to monitors.
///
/// Travels urgent and is always delivered to the behavior; monitoring never
/// propagates termination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownMsg {
    /// The terminated target.
    pub source: Address,
    /// Its exit reason.
    pub reason: ExitReason,
}
