//! The per-actor request ledger.
//!
//! Allocates request sequence numbers and correlates responses back to their
//! continuations. Every request id resolves exactly once: with the response
//! payload, with a timeout, or with a peer-down error; whichever arrives
//! first consumes the ledger entry and later arrivals are discarded as
//! stale.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::actor::context::Context;
use crate::actor::ExitReason;
use crate::clock::TimerHandle;
use crate::error::ErrorCode;
use crate::message::Payload;

/// Why a request failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// The deadline elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The target terminated before answering.
    #[error("peer terminated: {0}")]
    PeerDown(ExitReason),

    /// The target answered with an error response.
    #[error("{code}: {message}")]
    Rejected {
        /// Error classification.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },

    /// The target address did not resolve to a live actor at send time.
    #[error("no such actor")]
    NoSuchActor,

    /// The target's mailbox dropped the request under its cap.
    #[error("target mailbox full")]
    MailboxFull,
}

/// Internal response payload marking a timed-out request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTimeoutMsg;

/// Internal response payload synthesized when the target terminates with
/// the request still queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerDownMsg {
    /// The target's exit reason.
    pub reason: ExitReason,
}

/// Error response payload, e.g. for an unmatched request shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponseMsg {
    /// Error classification.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

/// Continuation invoked with the outcome of an event-actor request.
pub(crate) type Continuation =
    Box<dyn FnOnce(&mut Context, Result<Payload, RequestError>) + Send>;

struct Pending {
    continuation: Continuation,
    timeout: Option<TimerHandle>,
}

/// Outstanding-request bookkeeping for one actor.
pub(crate) struct Ledger {
    next_seq: u64,
    pending: HashMap<u64, Pending>,
}

const SEQ_MASK: u64 = (1 << 61) - 1;

impl Ledger {
    pub(crate) fn new() -> Self {
        Self {
            next_seq: 0,
            pending: HashMap::new(),
        }
    }

    /// Allocate the next request sequence number (never zero).
    pub(crate) fn allocate(&mut self) -> u64 {
        self.next_seq = (self.next_seq + 1) & SEQ_MASK;
        if self.next_seq == 0 {
            self.next_seq = 1;
        }
        self.next_seq
    }

    /// Register the continuation and timeout entry for a sequence number.
    pub(crate) fn register(
        &mut self,
        sequence: u64,
        continuation: Continuation,
        timeout: Option<TimerHandle>,
    ) {
        self.pending.insert(
            sequence,
            Pending {
                continuation,
                timeout,
            },
        );
    }

    /// Whether the consumer currently awaits this sequence number.
    pub(crate) fn is_awaited(&self, sequence: u64) -> bool {
        self.pending.contains_key(&sequence)
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Consume the entry for `sequence`, cancelling its timeout.
    ///
    /// Returns `None` for stale sequences that already resolved.
    pub(crate) fn take(&mut self, sequence: u64) -> Option<Continuation> {
        let entry = self.pending.remove(&sequence)?;
        if let Some(timeout) = entry.timeout {
            timeout.cancel();
        }
        Some(entry.continuation)
    }

    /// Dispose every outstanding entry without resolving.
    pub(crate) fn clear(&mut self) {
        for (_, entry) in self.pending.drain() {
            if let Some(timeout) = entry.timeout {
                timeout.cancel();
            }
        }
    }

    /// Interpret a response payload: internal markers map to errors, any
    /// other payload is the success value.
    pub(crate) fn classify(payload: Payload) -> Result<Payload, RequestError> {
        if payload.len() == 1 {
            if payload.is::<RequestTimeoutMsg>(0) {
                return Err(RequestError::Timeout);
            }
            if let Some(down) = payload.get::<PeerDownMsg>(0) {
                return Err(RequestError::PeerDown(down.reason.clone()));
            }
            if let Some(err) = payload.get::<ErrorResponseMsg>(0) {
                return Err(RequestError::Rejected {
                    code: err.code,
                    message: err.message.clone(),
                });
            }
        }
        Ok(payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::payload;

    fn noop_continuation() -> Continuation {
        Box::new(|_, _| {})
    }

    #[test]
    fn test_allocate_is_monotone_and_nonzero() {
        let mut ledger = Ledger::new();
        let a = ledger.allocate();
        let b = ledger.allocate();
        assert!(a > 0);
        assert_eq!(b, a + 1);
    }

    #[test]
    fn test_register_take_exactly_once() {
        let mut ledger = Ledger::new();
        let seq = ledger.allocate();
        ledger.register(seq, noop_continuation(), None);
        assert!(ledger.is_awaited(seq));
        assert!(ledger.has_pending());

        assert!(ledger.take(seq).is_some());
        assert!(!ledger.is_awaited(seq));
        // Second resolution attempt finds nothing.
        assert!(ledger.take(seq).is_none());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut ledger = Ledger::new();
        for _ in 0..3 {
            let seq = ledger.allocate();
            ledger.register(seq, noop_continuation(), None);
        }
        ledger.clear();
        assert!(!ledger.has_pending());
    }

    #[test]
    fn test_classify_success() {
        let result = Ledger::classify(payload!(7i64));
        assert_eq!(result.unwrap().get::<i64>(0), Some(&7));
    }

    #[test]
    fn test_classify_timeout_marker() {
        let result = Ledger::classify(payload!(RequestTimeoutMsg));
        assert_eq!(result.unwrap_err(), RequestError::Timeout);
    }

    #[test]
    fn test_classify_peer_down_marker() {
        let result = Ledger::classify(payload!(PeerDownMsg {
            reason: ExitReason::Kill,
        }));
        assert_eq!(result.unwrap_err(), RequestError::PeerDown(ExitReason::Kill));
    }

    #[test]
    fn test_classify_error_response() {
        let result = Ledger::classify(payload!(ErrorResponseMsg {
            code: ErrorCode::InvalidArgument,
            message: String::from("no arm matched"),
        }));
        match result.unwrap_err() {
            RequestError::Rejected { code, message } => {
                assert_eq!(code, ErrorCode::InvalidArgument);
                assert!(message.contains("no arm"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_classify_multislot_payload_is_success() {
        // Markers only occupy single-slot payloads; anything else is data.
        let result = Ledger::classify(payload!(RequestTimeoutMsg, 1i64));
        assert!(result.is_ok());
    }
}
