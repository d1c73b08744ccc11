//! Runtime-wide error codes.
//!
//! Module-level operations carry their own structured error enums; this
//! module holds the shared [`ErrorCode`] taxonomy that crosses module
//! boundaries inside exit reasons and error responses.

// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Classification of runtime failures.
///
/// The codes travel inside error responses and exit reasons, so they are
/// serializable and cheap to copy. Termination reasons that are not faults
/// (`normal`, `user_shutdown`, `kill`) live in
/// [`ExitReason`](crate::actor::ExitReason) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Address does not resolve to a live actor.
    NoSuchActor,

    /// Unknown module name in a group lookup.
    NoSuchGroupModule,

    /// Request sent through an invalid handle.
    BadFunctionCall,

    /// Deadline elapsed before a response arrived.
    RequestTimeout,

    /// Malformed message or unmatched shape under a strict handler.
    InvalidArgument,

    /// Catch-all for unexpected internal failure.
    RuntimeError,
}

impl ErrorCode {
    /// Stable lowercase name used in error responses and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoSuchActor => "no_such_actor",
            ErrorCode::NoSuchGroupModule => "no_such_group_module",
            ErrorCode::BadFunctionCall => "bad_function_call",
            ErrorCode::RequestTimeout => "request_timeout",
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::RuntimeError => "runtime_error",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_names() {
        assert_eq!(ErrorCode::NoSuchActor.as_str(), "no_such_actor");
        assert_eq!(ErrorCode::RequestTimeout.as_str(), "request_timeout");
        assert_eq!(ErrorCode::InvalidArgument.as_str(), "invalid_argument");
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::RuntimeError.to_string(), "runtime_error");
    }

    #[test]
    fn test_error_code_roundtrip_serde() {
        let json = serde_json::to_string(&ErrorCode::NoSuchGroupModule).unwrap();
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::NoSuchGroupModule);
    }

    #[test]
    fn test_error_code_equality() {
        assert_eq!(ErrorCode::BadFunctionCall, ErrorCode::BadFunctionCall);
        assert_ne!(ErrorCode::BadFunctionCall, ErrorCode::RuntimeError);
    }
}
