//! The dispatch core shared by event-based and blocking actors.
//!
//! One envelope goes through three gates: response correlation (the ledger
//! consumes responses before the behavior ever sees them), system-message
//! handling (exit notifications honor the trap-exit flag, kill does not),
//! and finally behavior pattern matching with automatic reply emission for
//! requests.

// Layer 1: Standard library imports
use std::panic::{catch_unwind, AssertUnwindSafe};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::behavior::{Behavior, Matched};
use super::context::{BehaviorAction, Context};
use super::exit::{DownMsg, ExitMsg, ExitReason};
use crate::error::ErrorCode;
use crate::message::{Envelope, Payload};
use crate::request::{ErrorResponseMsg, Ledger};

/// Result of pushing one envelope through the dispatch core.
pub(crate) enum DispatchOutcome {
    /// Consumed: dispatched, replied to, or deliberately discarded.
    Handled,
    /// No arm matched an asynchronous message; the caller applies the
    /// behavior's skip/drop policy.
    Unmatched(Envelope),
    /// The actor must terminate with this reason.
    Exit(ExitReason),
}

/// Extract a printable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("handler panicked")
    }
}

/// Answer a request envelope on behalf of `ctx`'s actor.
pub(crate) fn send_reply(ctx: &Context, request: &Envelope, payload: Payload) {
    if let Some(peer) = request.sender.upgrade_block() {
        let _ = peer.enqueue_envelope(
            Envelope::new(payload)
                .with_sender(ctx.address())
                .with_mid(request.mid.respond_to()),
        );
    }
}

/// Answer a request envelope with an error response.
pub(crate) fn send_error_reply(
    ctx: &Context,
    request: &Envelope,
    code: ErrorCode,
    message: impl Into<String>,
) {
    send_reply(
        ctx,
        request,
        Payload::from_tuple((ErrorResponseMsg {
            code,
            message: message.into(),
        },)),
    );
}

fn is_system_payload(payload: &Payload) -> bool {
    payload.len() == 1 && (payload.is::<ExitMsg>(0) || payload.is::<DownMsg>(0))
}

/// Dispatch one envelope through `behavior`.
pub(crate) fn dispatch_envelope(
    ctx: &mut Context,
    behavior: &mut Behavior,
    env: Envelope,
) -> DispatchOutcome {
    // Gate 1: response correlation.
    if env.mid.is_response() {
        let sequence = env.mid.sequence();
        let Some(continuation) = ctx.ledger.take(sequence) else {
            // Stale response; its request already resolved.
            return DispatchOutcome::Handled;
        };
        ctx.sender = env.sender;
        ctx.current_mid = env.mid;
        let result = Ledger::classify(env.payload);
        let outcome = catch_unwind(AssertUnwindSafe(|| continuation(ctx, result)));
        return match outcome {
            Ok(()) => DispatchOutcome::Handled,
            Err(panic) => DispatchOutcome::Exit(ExitReason::error(
                ErrorCode::RuntimeError,
                panic_message(panic),
            )),
        };
    }

    // Gate 2: exit notifications.
    if env.payload.len() == 1 {
        if let Some(exit) = env.payload.get::<ExitMsg>(0) {
            // A direct kill (no source peer) is unconditional; a kill
            // propagated through a link behaves like any other reason.
            if exit.reason == ExitReason::Kill && exit.source.is_invalid() {
                return DispatchOutcome::Exit(ExitReason::Kill);
            }
            if !ctx.ctrl.trap_exit() {
                return if exit.reason.propagates() {
                    DispatchOutcome::Exit(exit.reason.clone())
                } else {
                    DispatchOutcome::Handled
                };
            }
            // Trapped: the exit message reaches the behavior like any other.
        }
    }

    // Gate 3: behavior pattern matching.
    ctx.sender = env.sender.clone();
    ctx.current_mid = env.mid;
    let matched = catch_unwind(AssertUnwindSafe(|| behavior.try_dispatch(ctx, &env.payload)));
    match matched {
        Err(panic) => {
            let message = panic_message(panic);
            if env.is_request() {
                send_error_reply(ctx, &env, ErrorCode::RuntimeError, message.clone());
            }
            DispatchOutcome::Exit(ExitReason::error(ErrorCode::RuntimeError, message))
        }
        Ok(Matched::Reply(reply)) => {
            if env.is_request() {
                send_reply(ctx, &env, reply.unwrap_or_else(Payload::unit));
            }
            DispatchOutcome::Handled
        }
        Ok(Matched::NoMatch) => {
            if env.is_request() {
                // Requests never hang on an unmatched shape.
                send_error_reply(
                    ctx,
                    &env,
                    ErrorCode::InvalidArgument,
                    format!("no arm matched a {}-slot request", env.payload.len()),
                );
                DispatchOutcome::Handled
            } else if is_system_payload(&env.payload) {
                // Unhandled notifications are dropped, never stashed.
                DispatchOutcome::Handled
            } else {
                DispatchOutcome::Unmatched(env)
            }
        }
    }
}

/// Apply the behavior-stack actions a handler queued on its context.
///
/// Returns the exit reason when the actor should terminate, either because
/// a handler quit or because the stack emptied out.
pub(crate) fn apply_actions(
    ctx: &mut Context,
    behaviors: &mut Vec<Behavior>,
) -> (bool, Option<ExitReason>) {
    let mut changed = false;
    for action in ctx.actions.drain(..).collect::<Vec<_>>() {
        match action {
            BehaviorAction::Become { behavior, keep } => {
                if !keep {
                    behaviors.pop();
                }
                behaviors.push(behavior);
                changed = true;
            }
            BehaviorAction::Unbecome => {
                behaviors.pop();
                changed = true;
            }
            BehaviorAction::Quit(reason) => return (changed, Some(reason)),
        }
    }
    if behaviors.is_empty() {
        (changed, Some(ExitReason::Normal))
    } else {
        (changed, None)
    }
}
