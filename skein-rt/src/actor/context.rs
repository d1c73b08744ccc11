//! The execution context handed to behavior handlers.
//!
//! Wraps the actor's own control block, its request ledger, and the header
//! of the message currently being dispatched. Behavior-stack changes are
//! recorded as deferred actions and applied after the handler returns, so a
//! handler never mutates the stack it is running from.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::address::Address;
use super::behavior::Behavior;
use super::control::ControlBlock;
use super::exit::ExitReason;
use super::handle::{ActorHandle, SendError};
use crate::clock::TimerHandle;
use crate::error::ErrorCode;
use crate::mailbox::EnqueueError;
use crate::message::{Envelope, MessageId, Payload};
use crate::request::{Ledger, RequestError, RequestTimeoutMsg};
use crate::system::{ActorSystem, SpawnError};
use crate::util::NodeId;

/// Deferred behavior-stack operation, applied between dispatches.
pub(crate) enum BehaviorAction {
    Become { behavior: Behavior, keep: bool },
    Unbecome,
    Quit(ExitReason),
}

/// Handler-facing view of the running actor.
pub struct Context {
    pub(crate) ctrl: Arc<ControlBlock>,
    pub(crate) ledger: Ledger,
    pub(crate) sender: Address,
    pub(crate) current_mid: MessageId,
    pub(crate) actions: Vec<BehaviorAction>,
}

impl Context {
    pub(crate) fn new(ctrl: Arc<ControlBlock>) -> Self {
        Self {
            ctrl,
            ledger: Ledger::new(),
            sender: Address::invalid(),
            current_mid: MessageId::ASYNC,
            actions: Vec::new(),
        }
    }

    /// This actor's address.
    pub fn address(&self) -> Address {
        self.ctrl.address()
    }

    /// A strong handle to this actor.
    pub fn self_handle(&self) -> ActorHandle {
        ActorHandle::from_block(Arc::clone(&self.ctrl))
    }

    /// The local node id.
    pub fn node(&self) -> NodeId {
        self.ctrl.node()
    }

    /// Sender of the message currently being dispatched; may be invalid.
    pub fn sender(&self) -> &Address {
        &self.sender
    }

    /// The owning actor system, while it is alive.
    pub fn system(&self) -> Option<ActorSystem> {
        self.ctrl.system().map(ActorSystem::from_core)
    }

    /// Asynchronous send carrying this actor as the sender.
    pub fn send(&self, target: &ActorHandle, payload: Payload) -> Result<(), SendError> {
        target
            .block()
            .enqueue(self.address(), MessageId::ASYNC, payload)
            .map_err(SendError::from)
    }

    /// Urgent send carrying this actor as the sender.
    pub fn send_urgent(&self, target: &ActorHandle, payload: Payload) -> Result<(), SendError> {
        target
            .block()
            .enqueue(self.address(), MessageId::URGENT_ASYNC, payload)
            .map_err(SendError::from)
    }

    /// Send through an address; fails silently when the target is gone.
    pub fn send_to(&self, target: &Address, payload: Payload) -> Result<(), SendError> {
        match target.upgrade_block() {
            Some(block) => block
                .enqueue(self.address(), MessageId::ASYNC, payload)
                .map_err(SendError::from),
            None => Err(SendError::Terminated),
        }
    }

    /// Schedule an asynchronous send to fire after `delay`.
    ///
    /// The returned handle cancels the pending delivery.
    pub fn delayed_send(
        &self,
        target: &ActorHandle,
        delay: Duration,
        payload: Payload,
    ) -> TimerHandle {
        let Some(sys) = self.ctrl.system() else {
            return TimerHandle::detached();
        };
        let target_weak = Arc::downgrade(target.block());
        let sender = self.address();
        sys.clock.schedule_in(delay, move || {
            if let Some(block) = target_weak.upgrade() {
                let _ = block.enqueue(sender, MessageId::ASYNC, payload);
            }
        })
    }

    /// Synchronous request with a deadline.
    ///
    /// Exactly one of the continuation's outcomes fires: the response
    /// payload, a timeout, or a peer-down/delivery error. The continuation
    /// runs inside a later resumption of this actor.
    pub fn request<F>(&mut self, target: &ActorHandle, payload: Payload, timeout: Duration, then: F)
    where
        F: FnOnce(&mut Context, Result<Payload, RequestError>) + Send + 'static,
    {
        let sequence = self.ledger.allocate();
        let mid = MessageId::request(sequence);
        match target.block().enqueue(self.address(), mid, payload) {
            Err(EnqueueError::Closed) => {
                then(self, Err(RequestError::NoSuchActor));
                return;
            }
            Err(EnqueueError::Full { .. }) => {
                then(self, Err(RequestError::MailboxFull));
                return;
            }
            Ok(()) => {}
        }
        let timeout_handle = self.ctrl.system().map(|sys| {
            let me = Arc::downgrade(&self.ctrl);
            sys.clock.schedule_in(timeout, move || {
                if let Some(block) = me.upgrade() {
                    let _ = block.enqueue_envelope(
                        Envelope::new(Payload::from_tuple((RequestTimeoutMsg,)))
                            .with_mid(MessageId::response(sequence)),
                    );
                }
            })
        });
        self.ledger.register(sequence, Box::new(then), timeout_handle);
    }

    /// Request through an address.
    ///
    /// An invalid or dangling address resolves the continuation immediately
    /// with a `bad_function_call` rejection.
    pub fn request_to<F>(&mut self, target: &Address, payload: Payload, timeout: Duration, then: F)
    where
        F: FnOnce(&mut Context, Result<Payload, RequestError>) + Send + 'static,
    {
        match target.upgrade() {
            Some(handle) => self.request(&handle, payload, timeout, then),
            None => then(
                self,
                Err(RequestError::Rejected {
                    code: ErrorCode::BadFunctionCall,
                    message: String::from("request through an invalid handle"),
                }),
            ),
        }
    }

    /// Replace the top of the behavior stack after this dispatch.
    pub fn become_(&mut self, behavior: Behavior) {
        self.actions.push(BehaviorAction::Become {
            behavior,
            keep: false,
        });
    }

    /// Push a behavior, keeping the current one underneath.
    pub fn become_keep(&mut self, behavior: Behavior) {
        self.actions.push(BehaviorAction::Become {
            behavior,
            keep: true,
        });
    }

    /// Pop the top of the behavior stack. Popping the last behavior
    /// terminates the actor normally.
    pub fn unbecome(&mut self) {
        self.actions.push(BehaviorAction::Unbecome);
    }

    /// Terminate this actor after the current dispatch completes.
    pub fn quit(&mut self, reason: ExitReason) {
        self.actions.push(BehaviorAction::Quit(reason));
    }

    /// Set the trap-exit flag: exit notifications become ordinary messages
    /// instead of terminating this actor.
    pub fn set_trap_exit(&self, trap: bool) {
        self.ctrl.set_trap_exit(trap);
    }

    /// Current trap-exit flag.
    pub fn trap_exit(&self) -> bool {
        self.ctrl.trap_exit()
    }

    /// Link this actor with `other` (symmetric, idempotent).
    pub fn link_to(&self, other: &ActorHandle) {
        self.ctrl.link_to(other.block());
    }

    /// Remove the link with `other` in both directions.
    pub fn unlink_from(&self, other: &ActorHandle) {
        self.ctrl.unlink_from(other.block());
    }

    /// Monitor `other`: receive a down message when it terminates.
    pub fn monitor(&self, other: &ActorHandle) {
        other.block().add_monitor(self.address());
    }

    /// Stop monitoring `other`.
    pub fn demonitor(&self, other: &ActorHandle) {
        other.block().remove_monitor(&self.address());
    }

    /// Attach a cleanup hook to this actor.
    pub fn attach(&self, hook: impl FnOnce(&ExitReason) + Send + 'static) {
        self.ctrl.attach(Box::new(hook));
    }

    /// Spawn a new event-based actor.
    pub fn spawn<F>(&self, factory: F) -> Result<ActorHandle, SpawnError>
    where
        F: FnOnce(&mut Context) -> Behavior + Send + 'static,
    {
        match self.ctrl.system() {
            Some(sys) => sys.spawn_event(crate::system::SpawnOptions::default(), factory),
            None => Err(SpawnError::ShuttingDown),
        }
    }

    /// Spawn a new event-based actor linked to this one.
    pub fn spawn_linked<F>(&self, factory: F) -> Result<ActorHandle, SpawnError>
    where
        F: FnOnce(&mut Context) -> Behavior + Send + 'static,
    {
        let handle = self.spawn(factory)?;
        self.link_to(&handle);
        Ok(handle)
    }

    #[cfg(test)]
    pub(crate) fn detached_for_tests() -> Context {
        use super::control::ActorKind;
        use crate::util::ActorId;
        let ctrl = ControlBlock::new(
            NodeId::local(),
            ActorId::from_raw(u64::MAX),
            ActorKind::Event,
            true,
            None,
            0,
            None,
            std::sync::Weak::new(),
        );
        Context::new(ctrl)
    }
}
