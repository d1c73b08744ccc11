//! Strong actor handles, typed and untyped.
//!
//! An [`ActorHandle`] shares ownership of a control block and keeps the
//! actor alive. A [`TypedHandle`] adds a phantom protocol parameter listing
//! the accepted message shapes; sends are checked at compile time, and the
//! reverse cast from untyped to typed is checked against the runtime
//! protocol token recorded at spawn.

// Layer 1: Standard library imports
use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::address::Address;
use super::control::ControlBlock;
use super::exit::{ExitMsg, ExitReason};
use crate::mailbox::EnqueueError;
use crate::message::{MessageId, MessageTuple, Payload, Shape};
use crate::util::{ActorId, NodeId};

/// Failure modes of asynchronous sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The target has terminated.
    #[error("target actor terminated")]
    Terminated,

    /// The target mailbox dropped the message under its cap.
    #[error("target mailbox full (capacity: {capacity})")]
    MailboxFull {
        /// The configured cap.
        capacity: usize,
    },
}

impl From<EnqueueError> for SendError {
    fn from(err: EnqueueError) -> Self {
        match err {
            EnqueueError::Closed => SendError::Terminated,
            EnqueueError::Full { capacity } => SendError::MailboxFull { capacity },
        }
    }
}

/// Failure modes of checked handle casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    /// The actor was not spawned with the requested protocol.
    #[error("actor does not implement the requested protocol")]
    ProtocolMismatch,
}

/// Shared ownership of an actor's control block.
pub struct ActorHandle {
    block: Arc<ControlBlock>,
}

impl ActorHandle {
    pub(crate) fn from_block(block: Arc<ControlBlock>) -> Self {
        Self { block }
    }

    pub(crate) fn block(&self) -> &Arc<ControlBlock> {
        &self.block
    }

    /// The stable address of this actor.
    pub fn address(&self) -> Address {
        self.block.address()
    }

    /// The actor id component of the address.
    pub fn id(&self) -> ActorId {
        self.block.id()
    }

    /// The node component of the address.
    pub fn node(&self) -> NodeId {
        self.block.node()
    }

    /// The registered name, if any.
    pub fn name(&self) -> Option<String> {
        self.block.name()
    }

    /// Whether the actor has terminated.
    pub fn is_terminated(&self) -> bool {
        self.block.is_terminated()
    }

    /// The exit reason, once terminated.
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.block.exit_reason()
    }

    /// Snapshot of the actor's link set.
    pub fn links(&self) -> Vec<Address> {
        self.block.links()
    }

    /// Full-header enqueue: the entry point messaging transports use to
    /// deliver traffic arriving on a channel.
    pub fn deliver(
        &self,
        sender: Address,
        mid: MessageId,
        payload: Payload,
    ) -> Result<(), SendError> {
        self.block
            .enqueue(sender, mid, payload)
            .map_err(SendError::from)
    }

    /// Anonymous asynchronous send.
    pub fn send(&self, payload: Payload) -> Result<(), SendError> {
        self.block
            .enqueue(Address::invalid(), MessageId::ASYNC, payload)
            .map_err(SendError::from)
    }

    /// Anonymous urgent send.
    pub fn send_urgent(&self, payload: Payload) -> Result<(), SendError> {
        self.block
            .enqueue(Address::invalid(), MessageId::URGENT_ASYNC, payload)
            .map_err(SendError::from)
    }

    /// Deliver an unconditional exit notification with reason `kill`.
    ///
    /// Kill ignores the trap-exit flag.
    pub fn kill(&self) {
        let _ = self.block.enqueue(
            Address::invalid(),
            MessageId::URGENT_ASYNC,
            Payload::from_tuple((ExitMsg {
                source: Address::invalid(),
                reason: ExitReason::Kill,
            },)),
        );
    }

    /// Attach a cleanup hook running when the actor terminates.
    pub fn attach(&self, hook: impl FnOnce(&ExitReason) + Send + 'static) {
        self.block.attach(Box::new(hook));
    }

    /// Checked cast to a typed handle.
    ///
    /// Succeeds only when the actor was spawned with protocol `P`.
    pub fn downcast<P: Protocol>(&self) -> Result<TypedHandle<P>, HandleError> {
        if self.block.protocol() == Some(TypeId::of::<P>()) {
            Ok(TypedHandle {
                inner: self.clone(),
                _marker: PhantomData,
            })
        } else {
            Err(HandleError::ProtocolMismatch)
        }
    }
}

impl Clone for ActorHandle {
    fn clone(&self) -> Self {
        Self {
            block: Arc::clone(&self.block),
        }
    }
}

impl PartialEq for ActorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for ActorHandle {}

impl PartialOrd for ActorHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address().cmp(&other.address())
    }
}

impl Hash for ActorHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("address", &self.address())
            .finish()
    }
}

/// The ordered list of message shapes a typed actor accepts.
pub trait Protocol: Send + Sync + 'static {
    /// The accepted input shapes, in declaration order.
    fn accepts() -> Vec<Shape>;
}

/// Compile-time marker: protocol `Self` accepts messages of tuple shape `T`.
pub trait Accepts<T: MessageTuple>: Protocol {}

/// A handle whose send surface is restricted to the shapes of protocol `P`.
///
/// Typing is compile-time only and erased at the control-block boundary;
/// receive-site pattern matching still validates shapes at runtime.
pub struct TypedHandle<P: Protocol> {
    inner: ActorHandle,
    _marker: PhantomData<fn(P)>,
}

impl<P: Protocol> TypedHandle<P> {
    /// Statically checked asynchronous send.
    pub fn send<T>(&self, message: T) -> Result<(), SendError>
    where
        T: MessageTuple + Clone,
        P: Accepts<T>,
    {
        self.inner.send(Payload::from_tuple(message))
    }

    /// Statically checked urgent send.
    pub fn send_urgent<T>(&self, message: T) -> Result<(), SendError>
    where
        T: MessageTuple + Clone,
        P: Accepts<T>,
    {
        self.inner.send_urgent(Payload::from_tuple(message))
    }

    /// Widen to the untyped handle; always allowed.
    pub fn untyped(&self) -> ActorHandle {
        self.inner.clone()
    }

    /// The stable address of this actor.
    pub fn address(&self) -> Address {
        self.inner.address()
    }
}

impl<P: Protocol> Clone for TypedHandle<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<P: Protocol> From<TypedHandle<P>> for ActorHandle {
    fn from(handle: TypedHandle<P>) -> Self {
        handle.inner
    }
}

impl<P: Protocol> fmt::Debug for TypedHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedHandle")
            .field("address", &self.inner.address())
            .field("protocol", &std::any::type_name::<P>())
            .finish()
    }
}

/// Declare a protocol type and its accepted message shapes.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use skein_rt::protocol;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// pub struct Plus;
/// #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// pub struct Minus;
///
/// protocol! {
///     pub CalculatorProtocol accepts {
///         (Plus, i64, i64),
///         (Minus, i64, i64),
///     }
/// }
/// ```
#[macro_export]
macro_rules! protocol {
    ($vis:vis $name:ident accepts { $(($($slot:ty),+ $(,)?)),+ $(,)? }) => {
        $vis enum $name {}

        impl $crate::actor::Protocol for $name {
            fn accepts() -> Vec<$crate::message::Shape> {
                vec![$($crate::message::Shape::of::<($($slot,)+)>()),+]
            }
        }

        $(impl $crate::actor::Accepts<($($slot,)+)> for $name {})+
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::actor::control::ActorKind;
    use crate::payload;
    use serde::{Deserialize, Serialize};
    use std::sync::Weak;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Ping;

    protocol! {
        PingProtocol accepts {
            (Ping,),
            (Ping, i64),
        }
    }

    fn block_with_protocol(aid: u64, protocol: Option<TypeId>) -> Arc<ControlBlock> {
        ControlBlock::new(
            NodeId::local(),
            ActorId::from_raw(aid),
            ActorKind::Event,
            false,
            protocol,
            0,
            None,
            Weak::new(),
        )
    }

    #[test]
    fn test_send_enqueues() {
        let handle = ActorHandle::from_block(block_with_protocol(1, None));
        handle.send(payload!(1i64)).unwrap();
        assert!(!handle.is_terminated());
    }

    #[test]
    fn test_send_to_terminated_fails() {
        let handle = ActorHandle::from_block(block_with_protocol(1, None));
        handle.block().trigger_exit(ExitReason::Normal);
        assert_eq!(handle.send(payload!(1i64)), Err(SendError::Terminated));
    }

    #[test]
    fn test_handle_equality_by_address() {
        let block = block_with_protocol(1, None);
        let a = ActorHandle::from_block(Arc::clone(&block));
        let b = ActorHandle::from_block(block);
        assert_eq!(a, b);

        let c = ActorHandle::from_block(block_with_protocol(2, None));
        assert_ne!(a, c);
    }

    #[test]
    fn test_protocol_shapes_declared_in_order() {
        let shapes = PingProtocol::accepts();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0], Shape::of::<(Ping,)>());
        assert_eq!(shapes[1], Shape::of::<(Ping, i64)>());
    }

    #[test]
    fn test_downcast_checked_by_token() {
        let typed_block = block_with_protocol(1, Some(TypeId::of::<PingProtocol>()));
        let handle = ActorHandle::from_block(typed_block);
        let typed = handle.downcast::<PingProtocol>().unwrap();
        typed.send((Ping,)).unwrap();
        typed.send((Ping, 5i64)).unwrap();

        let untyped_block = block_with_protocol(2, None);
        let other = ActorHandle::from_block(untyped_block);
        assert_eq!(
            other.downcast::<PingProtocol>().unwrap_err(),
            HandleError::ProtocolMismatch
        );
    }

    #[test]
    fn test_typed_widens_freely() {
        let block = block_with_protocol(1, Some(TypeId::of::<PingProtocol>()));
        let handle = ActorHandle::from_block(block);
        let typed = handle.downcast::<PingProtocol>().unwrap();
        let widened: ActorHandle = typed.clone().into();
        assert_eq!(widened, typed.untyped());
    }

    #[test]
    fn test_kill_enqueues_urgent_exit() {
        let block = block_with_protocol(1, None);
        let handle = ActorHandle::from_block(Arc::clone(&block));
        handle.kill();
        let env = block.mailbox.drain_next().unwrap();
        assert!(env.mid.is_urgent());
        let exit: &ExitMsg = env.payload.get(0).unwrap();
        assert_eq!(exit.reason, ExitReason::Kill);
    }
}
