//! Event-based actors: behavior state machines driven by scheduler
//! resumptions.
//!
//! An event actor has no thread of its own. Each resumption dequeues up to
//! the configured throughput of messages, pushes them through the dispatch
//! core, applies deferred behavior changes, and re-arms the receive-timeout
//! entry when the mailbox runs dry.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::behavior::Behavior;
use super::context::Context;
use super::control::ControlBlock;
use super::dispatch::{apply_actions, dispatch_envelope, panic_message, DispatchOutcome};
use super::exit::ExitReason;
use crate::clock::TimerHandle;
use crate::error::ErrorCode;
use crate::message::{Envelope, MessageId, Payload};
use crate::scheduler::Resumable;

/// Internal payload produced by the receive-timeout entry.
///
/// The epoch stamps out stale entries: any dispatch bumps the epoch, so a
/// timeout that lost the race is recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ReceiveTimeoutMsg {
    epoch: u64,
}

type Factory = Box<dyn FnOnce(&mut Context) -> Behavior + Send>;

struct EventState {
    ctx: Context,
    behaviors: Vec<Behavior>,
    /// Messages set aside by the skip policy, replayed on behavior change.
    stash: VecDeque<Envelope>,
    replaying: bool,
    pending_timeout: Option<TimerHandle>,
    timeout_epoch: u64,
    factory: Option<Factory>,
}

pub(crate) struct EventActor {
    ctrl: Arc<ControlBlock>,
    state: Mutex<Option<EventState>>,
}

impl EventActor {
    pub(crate) fn new(ctrl: Arc<ControlBlock>, factory: Factory) -> Arc<Self> {
        let ctx = Context::new(Arc::clone(&ctrl));
        Arc::new(Self {
            ctrl,
            state: Mutex::new(Some(EventState {
                ctx,
                behaviors: Vec::new(),
                stash: VecDeque::new(),
                replaying: false,
                pending_timeout: None,
                timeout_epoch: 0,
                factory: Some(factory),
            })),
        })
    }

    fn finish(&self, slot: &mut Option<EventState>, reason: ExitReason) {
        if let Some(state) = slot.as_mut() {
            if let Some(timeout) = state.pending_timeout.take() {
                timeout.cancel();
            }
            state.ctx.ledger.clear();
        }
        *slot = None;
        self.ctrl.trigger_exit(reason);
    }

    fn cancel_timeout(state: &mut EventState) {
        state.timeout_epoch += 1;
        if let Some(timeout) = state.pending_timeout.take() {
            timeout.cancel();
        }
    }

    /// Arm the top behavior's timeout entry when the actor goes idle with an
    /// empty mailbox.
    fn arm_timeout(&self, state: &mut EventState) {
        if state.pending_timeout.is_some() || !self.ctrl.mailbox.is_empty() {
            return;
        }
        let Some(duration) = state.behaviors.last().and_then(Behavior::timeout_duration) else {
            return;
        };
        let Some(sys) = self.ctrl.system() else {
            return;
        };
        state.timeout_epoch += 1;
        let epoch = state.timeout_epoch;
        let me = Arc::downgrade(&self.ctrl);
        state.pending_timeout = Some(sys.clock.schedule_in(duration, move || {
            if let Some(block) = me.upgrade() {
                let _ = block.enqueue_envelope(
                    Envelope::new(Payload::from_tuple((ReceiveTimeoutMsg { epoch },)))
                        .with_mid(MessageId::URGENT_ASYNC),
                );
            }
        }));
    }

    /// Pull the next envelope: replayed stash entries first after a
    /// behavior change, then the mailbox.
    fn next_envelope(&self, state: &mut EventState) -> Option<Envelope> {
        if state.replaying {
            if let Some(env) = state.stash.pop_front() {
                return Some(env);
            }
            state.replaying = false;
        }
        let ledger = &state.ctx.ledger;
        self.ctrl.mailbox.dequeue(|seq| ledger.is_awaited(seq))
    }
}

impl EventActor {
    /// One activation: returns the exit reason when the actor must
    /// terminate, `None` to stay alive.
    fn run_activation(&self, state: &mut EventState, throughput: usize) -> Option<ExitReason> {
        // Launch: run the factory to install the initial behavior.
        if let Some(factory) = state.factory.take() {
            let ctx = &mut state.ctx;
            match catch_unwind(AssertUnwindSafe(|| factory(ctx))) {
                Ok(behavior) => state.behaviors.push(behavior),
                Err(panic) => {
                    return Some(ExitReason::error(
                        ErrorCode::RuntimeError,
                        panic_message(panic),
                    ));
                }
            }
            let (_, exit) = apply_actions(&mut state.ctx, &mut state.behaviors);
            if exit.is_some() {
                return exit;
            }
        }

        let mut processed = 0;
        while processed < throughput.max(1) {
            if self.ctrl.is_terminated() {
                return Some(self.ctrl.exit_reason().unwrap_or(ExitReason::Normal));
            }
            let Some(env) = self.next_envelope(state) else {
                break;
            };
            processed += 1;

            // Receive-timeout entries: the current epoch fires the timeout
            // arm, stale ones are discarded.
            if env.payload.len() == 1 && env.payload.is::<ReceiveTimeoutMsg>(0) {
                let epoch = env
                    .payload
                    .get::<ReceiveTimeoutMsg>(0)
                    .map(|m| m.epoch)
                    .unwrap_or(0);
                if epoch != state.timeout_epoch {
                    continue;
                }
                state.pending_timeout = None;
                if let Some(top) = state.behaviors.last_mut() {
                    let ctx = &mut state.ctx;
                    let outcome = catch_unwind(AssertUnwindSafe(|| top.run_timeout(ctx)));
                    if let Err(panic) = outcome {
                        return Some(ExitReason::error(
                            ErrorCode::RuntimeError,
                            panic_message(panic),
                        ));
                    }
                }
                let (changed, exit) = apply_actions(&mut state.ctx, &mut state.behaviors);
                if exit.is_some() {
                    return exit;
                }
                if changed {
                    state.replaying = true;
                }
                continue;
            }

            // Any real message cancels the pending receive timeout.
            Self::cancel_timeout(state);

            let Some(mut top) = state.behaviors.pop() else {
                return Some(ExitReason::Normal);
            };
            let outcome = dispatch_envelope(&mut state.ctx, &mut top, env);
            state.behaviors.push(top);

            match outcome {
                DispatchOutcome::Handled => {}
                DispatchOutcome::Unmatched(env) => {
                    let skips = state
                        .behaviors
                        .last()
                        .map(Behavior::skips_unmatched)
                        .unwrap_or(false);
                    if skips {
                        state.stash.push_back(env);
                    }
                }
                DispatchOutcome::Exit(reason) => return Some(reason),
            }

            let (changed, exit) = apply_actions(&mut state.ctx, &mut state.behaviors);
            if exit.is_some() {
                return exit;
            }
            if changed {
                state.replaying = true;
            }
        }

        self.arm_timeout(state);
        None
    }
}

impl Resumable for EventActor {
    fn control(&self) -> &Arc<ControlBlock> {
        &self.ctrl
    }

    fn resume(&self, throughput: usize) {
        let mut slot = self.state.lock();
        let exit = match slot.as_mut() {
            Some(state) => self.run_activation(state, throughput),
            None => return,
        };
        if let Some(reason) = exit {
            self.finish(&mut slot, reason);
        }
    }
}
