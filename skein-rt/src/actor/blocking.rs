//! Blocking actors: bound to a dedicated OS thread, receiving on demand.
//!
//! The actor body runs inside a fibre; whenever a receive finds the mailbox
//! empty it yields a park request, and the host loop waits on the mailbox
//! condition variable before switching back in. A scoped variant runs on
//! the caller's own thread for test drivers and ad-hoc synchronous work.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::behavior::Behavior;
use super::context::{BehaviorAction, Context};
use super::control::ControlBlock;
use super::dispatch::{dispatch_envelope, panic_message, DispatchOutcome};
use super::exit::ExitReason;
use super::handle::ActorHandle;
use super::lifecycle::RunState;
use super::Address;
use crate::error::ErrorCode;
use crate::fibre::{self, Fibre, Park, Switch};
use crate::mailbox::EnqueueError;
use crate::message::{MessageId, Payload};
use crate::request::{Ledger, RequestError};

/// Failure modes of blocking receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReceiveError {
    /// The actor has terminated; no further receives are possible.
    #[error("actor terminated")]
    Terminated,
}

/// The object handed to a blocking actor's body.
///
/// Dereferences to [`Context`] for sending, linking and monitoring; adds
/// the blocking receive family and synchronous requests.
pub struct BlockingContext {
    pub(crate) ctx: Context,
    stash: VecDeque<crate::message::Envelope>,
    pub(crate) quit_reason: Option<ExitReason>,
}

impl BlockingContext {
    pub(crate) fn new(ctrl: Arc<ControlBlock>) -> Self {
        Self {
            ctx: Context::new(ctrl),
            stash: VecDeque::new(),
            quit_reason: None,
        }
    }

    fn terminated(&self) -> bool {
        self.quit_reason.is_some() || self.ctx.ctrl.is_terminated()
    }

    /// Fold queued context actions into blocking semantics: `quit` is
    /// honored, behavior-stack changes have no stack to apply to.
    fn absorb_actions(&mut self) {
        for action in self.ctx.actions.drain(..) {
            if let BehaviorAction::Quit(reason) = action {
                self.quit_reason.get_or_insert(reason);
            }
        }
    }

    fn park_for(&self, deadline: Option<Instant>) {
        // Inside the fibre the host loop does the waiting; outside (scoped
        // actors) we park directly on the mailbox condition.
        if !fibre::yield_value(Park { deadline }) {
            self.ctx.ctrl.mailbox.park(deadline);
        }
    }

    /// Receive and dispatch one message through `behavior`.
    ///
    /// Blocks until a message matches, the behavior's timeout arm fires, or
    /// the actor terminates. Messages no arm matches are set aside and
    /// retried on the next receive.
    pub fn receive(&mut self, behavior: &mut Behavior) -> Result<(), ReceiveError> {
        self.receive_step(behavior, None).map(|_| ())
    }

    /// Keep receiving while `pred` holds.
    pub fn receive_while(
        &mut self,
        mut pred: impl FnMut() -> bool,
        behavior: &mut Behavior,
    ) -> Result<(), ReceiveError> {
        while pred() {
            self.receive(behavior)?;
        }
        Ok(())
    }

    /// Receive for at most `window`, dispatching as many messages as
    /// arrive in that span.
    pub fn receive_for(
        &mut self,
        behavior: &mut Behavior,
        window: Duration,
    ) -> Result<(), ReceiveError> {
        let deadline = Instant::now() + window;
        while self.receive_step(behavior, Some(deadline))? {}
        Ok(())
    }

    /// Receive repeatedly until a condition holds; see [`DoReceive::until`].
    pub fn do_receive<'a>(&'a mut self, behavior: &'a mut Behavior) -> DoReceive<'a> {
        DoReceive {
            actor: self,
            behavior,
        }
    }

    /// Synchronous request with a deadline; blocks until resolution.
    ///
    /// While waiting, only the paired response is consumed; all other mail
    /// stays queued for later receives.
    pub fn request(
        &mut self,
        target: &ActorHandle,
        payload: Payload,
        timeout: Duration,
    ) -> Result<Payload, RequestError> {
        let sequence = self.ctx.ledger.allocate();
        let mid = MessageId::request(sequence);
        match target.block().enqueue(self.ctx.address(), mid, payload) {
            Err(EnqueueError::Closed) => return Err(RequestError::NoSuchActor),
            Err(EnqueueError::Full { .. }) => return Err(RequestError::MailboxFull),
            Ok(()) => {}
        }
        let deadline = Instant::now() + timeout;
        match self.ctx.ctrl.mailbox.dequeue_response(sequence, deadline) {
            Some(env) => Ledger::classify(env.payload),
            None if self.ctx.ctrl.mailbox.is_closed() => Err(RequestError::Rejected {
                code: ErrorCode::RuntimeError,
                message: String::from("requester terminated while awaiting response"),
            }),
            None => Err(RequestError::Timeout),
        }
    }

    /// Synchronous request through an address.
    pub fn request_to(
        &mut self,
        target: &Address,
        payload: Payload,
        timeout: Duration,
    ) -> Result<Payload, RequestError> {
        match target.upgrade() {
            Some(handle) => self.request(&handle, payload, timeout),
            None => Err(RequestError::Rejected {
                code: ErrorCode::BadFunctionCall,
                message: String::from("request through an invalid handle"),
            }),
        }
    }

    /// One receive step bounded by an optional overall deadline.
    ///
    /// Returns `Ok(true)` when a message or timeout arm was dispatched and
    /// `Ok(false)` when the overall deadline passed first.
    fn receive_step(
        &mut self,
        behavior: &mut Behavior,
        overall_deadline: Option<Instant>,
    ) -> Result<bool, ReceiveError> {
        if self.terminated() {
            return Err(ReceiveError::Terminated);
        }

        // First retry messages set aside by earlier receives; a new
        // behavior may understand them.
        let mut retained = VecDeque::new();
        let mut outcome = None;
        while let Some(env) = self.stash.pop_front() {
            match dispatch_envelope(&mut self.ctx, behavior, env) {
                DispatchOutcome::Handled => {
                    outcome = Some(Ok(true));
                    break;
                }
                DispatchOutcome::Unmatched(env) => retained.push_back(env),
                DispatchOutcome::Exit(reason) => {
                    self.quit_reason.get_or_insert(reason);
                    outcome = Some(Err(ReceiveError::Terminated));
                    break;
                }
            }
        }
        while let Some(env) = self.stash.pop_front() {
            retained.push_back(env);
        }
        self.stash = retained;
        if let Some(result) = outcome {
            self.absorb_actions();
            if self.terminated() {
                return result.and(Err(ReceiveError::Terminated));
            }
            return result;
        }

        let arm_deadline = behavior.timeout_duration().map(|d| Instant::now() + d);
        loop {
            if self.terminated() {
                return Err(ReceiveError::Terminated);
            }
            let ledger = &self.ctx.ledger;
            let next = self
                .ctx
                .ctrl
                .mailbox
                .dequeue(|seq| ledger.is_awaited(seq));
            if let Some(env) = next {
                match dispatch_envelope(&mut self.ctx, behavior, env) {
                    DispatchOutcome::Handled => {
                        self.absorb_actions();
                        if self.terminated() {
                            return Err(ReceiveError::Terminated);
                        }
                        return Ok(true);
                    }
                    DispatchOutcome::Unmatched(env) => {
                        self.stash.push_back(env);
                        continue;
                    }
                    DispatchOutcome::Exit(reason) => {
                        self.quit_reason.get_or_insert(reason);
                        return Err(ReceiveError::Terminated);
                    }
                }
            }

            let now = Instant::now();
            if let Some(at) = arm_deadline {
                if now >= at {
                    behavior.run_timeout(&mut self.ctx);
                    self.absorb_actions();
                    if self.terminated() {
                        return Err(ReceiveError::Terminated);
                    }
                    return Ok(true);
                }
            }
            if let Some(at) = overall_deadline {
                if now >= at {
                    return Ok(false);
                }
            }
            let wake_at = match (arm_deadline, overall_deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };
            self.park_for(wake_at);
        }
    }
}

impl Deref for BlockingContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl DerefMut for BlockingContext {
    fn deref_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}

/// Builder for receive-until loops: dispatches at least once, then keeps
/// receiving until the predicate holds.
pub struct DoReceive<'a> {
    actor: &'a mut BlockingContext,
    behavior: &'a mut Behavior,
}

impl DoReceive<'_> {
    /// Loop `receive` until `pred` returns true.
    pub fn until(self, mut pred: impl FnMut() -> bool) -> Result<(), ReceiveError> {
        loop {
            self.actor.receive(self.behavior)?;
            if pred() {
                return Ok(());
            }
        }
    }
}

/// A blocking actor bound to the caller's scope.
///
/// Used by test drivers and synchronous entry points; terminates with
/// reason `normal` when dropped.
pub struct ScopedActor {
    inner: BlockingContext,
}

impl ScopedActor {
    pub(crate) fn new(ctrl: Arc<ControlBlock>) -> Self {
        ctrl.state().transition(RunState::Idle, RunState::Running);
        Self {
            inner: BlockingContext::new(ctrl),
        }
    }

    /// A strong handle to the scoped actor itself.
    pub fn handle(&self) -> ActorHandle {
        self.inner.self_handle()
    }
}

impl Deref for ScopedActor {
    type Target = BlockingContext;

    fn deref(&self) -> &BlockingContext {
        &self.inner
    }
}

impl DerefMut for ScopedActor {
    fn deref_mut(&mut self) -> &mut BlockingContext {
        &mut self.inner
    }
}

impl Drop for ScopedActor {
    fn drop(&mut self) {
        let reason = self.inner.quit_reason.take().unwrap_or(ExitReason::Normal);
        self.inner.ctx.ctrl.trigger_exit(reason);
    }
}

pub(crate) type BlockingBody = Box<dyn FnOnce(&mut BlockingContext) + Send>;

/// Thread main for a spawned blocking actor: host the body inside a fibre
/// and service its park requests.
pub(crate) fn blocking_main(ctrl: Arc<ControlBlock>, body: BlockingBody) {
    ctrl.state().transition(RunState::Idle, RunState::Running);

    let reason_slot = Arc::new(Mutex::new(None));
    let fibre_ctrl = Arc::clone(&ctrl);
    let fibre_slot = Arc::clone(&reason_slot);
    let fibre = Fibre::<Park>::new(move || {
        let mut actor = BlockingContext::new(fibre_ctrl);
        body(&mut actor);
        *fibre_slot.lock() = Some(actor.quit_reason.take().unwrap_or(ExitReason::Normal));
    });

    let mut fibre = match fibre {
        Ok(fibre) => fibre,
        Err(err) => {
            ctrl.trigger_exit(ExitReason::error(ErrorCode::RuntimeError, err.to_string()));
            return;
        }
    };

    loop {
        match catch_unwind(AssertUnwindSafe(|| fibre.resume())) {
            Err(panic) => {
                ctrl.trigger_exit(ExitReason::error(
                    ErrorCode::RuntimeError,
                    panic_message(panic),
                ));
                return;
            }
            Ok(Switch::Completed) => break,
            Ok(Switch::Yielded(Park { deadline })) => {
                ctrl.state().transition(RunState::Running, RunState::Blocked);
                ctrl.mailbox.park(deadline);
                ctrl.state().transition(RunState::Blocked, RunState::Running);
            }
        }
    }

    let reason = reason_slot.lock().take().unwrap_or(ExitReason::Normal);
    ctrl.trigger_exit(reason);
}
