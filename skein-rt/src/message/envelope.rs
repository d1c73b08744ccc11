//! Message envelopes: payload plus delivery header.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::id::MessageId;
use super::payload::Payload;
use crate::actor::Address;

/// A payload together with the header fields carried on enqueue: sender
/// address (possibly invalid), message id, and a wall-clock timestamp for
/// diagnostics.
///
/// Response correlation rides inside the message id; there is no separate
/// correlation field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Who sent the message; may be the invalid address for anonymous sends.
    pub sender: Address,

    /// Structured message id (priority, kind, sequence).
    pub mid: MessageId,

    /// The type-erased payload tuple.
    pub payload: Payload,

    /// Wall-clock creation time, for tracing and dead-letter diagnostics.
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Wrap a payload as an anonymous asynchronous message.
    pub fn new(payload: Payload) -> Self {
        Self {
            sender: Address::invalid(),
            mid: MessageId::ASYNC,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Builder method: set the sender address.
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    /// Builder method: set the message id.
    pub fn with_mid(mut self, mid: MessageId) -> Self {
        self.mid = mid;
        self
    }

    /// Builder method: mark the message urgent.
    pub fn urgent(mut self) -> Self {
        self.mid = self.mid.with_urgent_priority();
        self
    }

    /// Whether the header tags a request.
    pub fn is_request(&self) -> bool {
        self.mid.is_request()
    }

    /// Whether the header tags a response.
    pub fn is_response(&self) -> bool {
        self.mid.is_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload;

    #[test]
    fn test_new_defaults() {
        let env = Envelope::new(payload!(1i64));
        assert!(env.sender.is_invalid());
        assert_eq!(env.mid, MessageId::ASYNC);
        assert!(!env.is_request());
        assert!(!env.is_response());
    }

    #[test]
    fn test_builder_chaining() {
        let env = Envelope::new(payload!(1i64))
            .with_mid(MessageId::request(5))
            .urgent();
        assert!(env.is_request());
        assert!(env.mid.is_urgent());
        assert_eq!(env.mid.sequence(), 5);
    }

    #[test]
    fn test_request_response_flags() {
        let req = Envelope::new(Payload::unit()).with_mid(MessageId::request(1));
        assert!(req.is_request());
        let resp = Envelope::new(Payload::unit()).with_mid(req.mid.respond_to());
        assert!(resp.is_response());
    }

    #[test]
    fn test_clone_shares_payload() {
        let env = Envelope::new(payload!(41i64));
        let copy = env.clone();
        assert!(copy.payload.is_shared());
        assert_eq!(copy.payload, env.payload);
    }
}
