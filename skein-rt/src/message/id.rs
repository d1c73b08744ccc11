//! Structured 64-bit message identifiers.
//!
//! Layout, most significant bit first:
//!
//! ```text
//! [ 1 bit priority | 2 bits kind | 61 bits sequence ]
//! ```
//!
//! Kind is one of asynchronous (`0b00`), request (`0b01`) or response
//! (`0b10`). The response id for a request is derived by flipping both kind
//! bits, so `0b01 ^ 0b11 == 0b10`. The priority bit dominates ordering.

// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

const PRIORITY_BIT: u64 = 1 << 63;
const KIND_SHIFT: u32 = 61;
const KIND_MASK: u64 = 0b11 << KIND_SHIFT;
const SEQ_MASK: u64 = (1 << KIND_SHIFT) - 1;

/// The kind of traffic a message id tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Fire-and-forget delivery.
    Asynchronous,
    /// One half of a synchronous exchange, expecting a response.
    Request,
    /// The paired answer to a request.
    Response,
}

/// A 64-bit message identifier with bit-encoded priority, kind and sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct MessageId(u64);

impl MessageId {
    /// The default id for asynchronous sends: normal priority, sequence 0.
    pub const ASYNC: MessageId = MessageId(0);

    /// An asynchronous id carrying the urgent priority bit.
    pub const URGENT_ASYNC: MessageId = MessageId(PRIORITY_BIT);

    /// Build a request id for the given sequence number.
    ///
    /// The sequence is truncated to 61 bits.
    pub fn request(sequence: u64) -> Self {
        Self((0b01 << KIND_SHIFT) | (sequence & SEQ_MASK))
    }

    /// Build a response id for the given sequence number.
    pub fn response(sequence: u64) -> Self {
        Self((0b10 << KIND_SHIFT) | (sequence & SEQ_MASK))
    }

    /// The paired id: requests map to responses and vice versa.
    ///
    /// Flips both kind bits and preserves priority and sequence. Calling
    /// this on an asynchronous id produces an unused kind encoding; callers
    /// check [`is_request`](Self::is_request) first.
    pub fn respond_to(&self) -> Self {
        Self(self.0 ^ KIND_MASK)
    }

    /// Mark this id urgent.
    pub fn with_urgent_priority(&self) -> Self {
        Self(self.0 | PRIORITY_BIT)
    }

    /// The priority bit.
    pub fn is_urgent(&self) -> bool {
        self.0 & PRIORITY_BIT != 0
    }

    /// Decode the kind bits.
    ///
    /// The unused encoding `0b11` decodes as [`MessageKind::Asynchronous`].
    pub fn kind(&self) -> MessageKind {
        match (self.0 & KIND_MASK) >> KIND_SHIFT {
            0b01 => MessageKind::Request,
            0b10 => MessageKind::Response,
            _ => MessageKind::Asynchronous,
        }
    }

    /// Whether this id tags a request.
    pub fn is_request(&self) -> bool {
        self.kind() == MessageKind::Request
    }

    /// Whether this id tags a response.
    pub fn is_response(&self) -> bool {
        self.kind() == MessageKind::Response
    }

    /// Whether this id tags asynchronous traffic.
    pub fn is_async(&self) -> bool {
        self.kind() == MessageKind::Asynchronous
    }

    /// The 61-bit sequence number.
    pub fn sequence(&self) -> u64 {
        self.0 & SEQ_MASK
    }

    /// Raw bit pattern.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Rebuild an id from its raw bit pattern.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind() {
            MessageKind::Asynchronous => "async",
            MessageKind::Request => "req",
            MessageKind::Response => "resp",
        };
        let prio = if self.is_urgent() { "urgent/" } else { "" };
        write!(f, "{prio}{kind}:{}", self.sequence())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_default() {
        let id = MessageId::ASYNC;
        assert!(id.is_async());
        assert!(!id.is_urgent());
        assert_eq!(id.sequence(), 0);
    }

    #[test]
    fn test_request_response_pairing() {
        let req = MessageId::request(42);
        assert!(req.is_request());
        assert_eq!(req.sequence(), 42);

        let resp = req.respond_to();
        assert!(resp.is_response());
        assert_eq!(resp.sequence(), 42);
        assert_eq!(resp, MessageId::response(42));

        // Flipping twice restores the request.
        assert_eq!(resp.respond_to(), req);
    }

    #[test]
    fn test_priority_bit_dominates_ordering() {
        let urgent = MessageId::ASYNC.with_urgent_priority();
        let normal_with_big_seq = MessageId::request(SEQ_MASK);
        assert!(urgent > normal_with_big_seq);
    }

    #[test]
    fn test_priority_preserved_by_respond_to() {
        let req = MessageId::request(7).with_urgent_priority();
        let resp = req.respond_to();
        assert!(resp.is_urgent());
        assert_eq!(resp.sequence(), 7);
        assert!(resp.is_response());
    }

    #[test]
    fn test_sequence_truncated_to_61_bits() {
        let id = MessageId::request(u64::MAX);
        assert_eq!(id.sequence(), SEQ_MASK);
        assert!(id.is_request());
        assert!(!id.is_urgent());
    }

    #[test]
    fn test_kind_decoding() {
        assert_eq!(MessageId::ASYNC.kind(), MessageKind::Asynchronous);
        assert_eq!(MessageId::request(1).kind(), MessageKind::Request);
        assert_eq!(MessageId::response(1).kind(), MessageKind::Response);
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageId::request(3).to_string(), "req:3");
        assert_eq!(
            MessageId::response(3).with_urgent_priority().to_string(),
            "urgent/resp:3"
        );
    }

    #[test]
    fn test_raw_roundtrip() {
        let id = MessageId::request(12345).with_urgent_priority();
        assert_eq!(MessageId::from_raw(id.as_u64()), id);
    }
}
