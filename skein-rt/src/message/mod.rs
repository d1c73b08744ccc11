//! Messages: identifiers, type-erased payload tuples, and envelopes.

pub mod envelope;
pub mod id;
pub mod payload;
pub mod tuple;
pub mod value;

pub use envelope::Envelope;
pub use id::{MessageId, MessageKind};
pub use payload::Payload;
pub use tuple::{MessageTuple, Shape};
pub use value::PayloadValue;
