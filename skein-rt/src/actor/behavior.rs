//! Behaviors: ordered pattern arms matched against received payloads.
//!
//! Each arm pairs a shape descriptor (slot type ids plus the static tuple
//! token for O(1) checks) with a handler closure. Arms are tried in order;
//! an optional guard can reject a shape match on values. A behavior may
//! carry an `after` timeout arm and an unmatched-message policy.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::context::Context;
use crate::message::{MessageTuple, Payload, PayloadValue, Shape};

type ArmHandler = Box<dyn FnMut(&mut Context, &Payload) -> Option<Payload> + Send>;
type ArmGuard = Box<dyn Fn(&Payload) -> bool + Send>;
type TimeoutHandler = Box<dyn FnMut(&mut Context) + Send>;

/// What a handler hands back to the dispatcher.
///
/// For requests the reply payload becomes the response; for asynchronous
/// messages it is discarded. Implemented for message tuples (including the
/// empty tuple), [`Payload`], and `Option<Payload>` (where `None` suppresses
/// the reply).
pub trait IntoReply {
    /// Convert into an optional reply payload.
    fn into_reply(self) -> Option<Payload>;
}

impl IntoReply for Payload {
    fn into_reply(self) -> Option<Payload> {
        Some(self)
    }
}

impl IntoReply for Option<Payload> {
    fn into_reply(self) -> Option<Payload> {
        self
    }
}

macro_rules! impl_into_reply {
    ($($name:ident),*) => {
        impl<$($name),*> IntoReply for ($($name,)*)
        where
            $($name: PayloadValue + Clone,)*
        {
            fn into_reply(self) -> Option<Payload> {
                Some(Payload::from_tuple(self))
            }
        }
    };
}

impl_into_reply!();
impl_into_reply!(A);
impl_into_reply!(A, B);
impl_into_reply!(A, B, C);
impl_into_reply!(A, B, C, D);
impl_into_reply!(A, B, C, D, E);
impl_into_reply!(A, B, C, D, E, F);
impl_into_reply!(A, B, C, D, E, F, G);
impl_into_reply!(A, B, C, D, E, F, G, H);

struct Arm {
    shape: Shape,
    guard: Option<ArmGuard>,
    handler: ArmHandler,
}

/// Policy for messages no arm matches.
pub enum Unmatched {
    /// Discard the message.
    Drop,
    /// Leave the message aside until the behavior changes.
    Skip,
    /// Try a fallback behavior's arms.
    Defer(Box<Behavior>),
}

/// Outcome of a dispatch attempt.
pub(crate) enum Matched {
    /// An arm ran; the reply payload, if any.
    Reply(Option<Payload>),
    /// No arm (including fallbacks) accepted the message.
    NoMatch,
}

/// An ordered sequence of pattern arms plus an optional timeout arm.
pub struct Behavior {
    arms: Vec<Arm>,
    timeout: Option<(Duration, TimeoutHandler)>,
    unmatched: Unmatched,
}

impl Behavior {
    /// An empty behavior; add arms with the builder methods.
    pub fn new() -> Self {
        Self {
            arms: Vec::new(),
            timeout: None,
            unmatched: Unmatched::Drop,
        }
    }

    /// Add an arm matching the statically typed tuple `T`.
    ///
    /// The handler receives the matched tuple by value (slots are cloned
    /// out of the shared payload) and its return value becomes the reply.
    pub fn on<T, R, F>(mut self, mut handler: F) -> Self
    where
        T: MessageTuple + Clone,
        R: IntoReply,
        F: FnMut(&mut Context, T) -> R + Send + 'static,
    {
        self.arms.push(Arm {
            shape: Shape::of::<T>(),
            guard: None,
            handler: Box::new(move |ctx, payload| match T::from_payload(payload) {
                Some(tuple) => handler(ctx, tuple).into_reply(),
                None => None,
            }),
        });
        self
    }

    /// Add a guarded arm: the shape must match and the guard must accept
    /// the values.
    pub fn on_when<T, R, F, G>(mut self, guard: G, mut handler: F) -> Self
    where
        T: MessageTuple + Clone,
        R: IntoReply,
        F: FnMut(&mut Context, T) -> R + Send + 'static,
        G: Fn(&T) -> bool + Send + 'static,
    {
        self.arms.push(Arm {
            shape: Shape::of::<T>(),
            guard: Some(Box::new(move |payload| {
                T::from_payload(payload).is_some_and(|t| guard(&t))
            })),
            handler: Box::new(move |ctx, payload| match T::from_payload(payload) {
                Some(tuple) => handler(ctx, tuple).into_reply(),
                None => None,
            }),
        });
        self
    }

    /// Add a raw arm over the type-erased payload, for dynamic shapes.
    pub fn on_payload<F>(mut self, shape: Shape, mut handler: F) -> Self
    where
        F: FnMut(&mut Context, &Payload) -> Option<Payload> + Send + 'static,
    {
        self.arms.push(Arm {
            shape,
            guard: None,
            handler: Box::new(move |ctx, payload| handler(ctx, payload)),
        });
        self
    }

    /// Install the timeout arm: fires when the receive waits longer than
    /// `duration`. Any non-timeout match cancels the pending entry.
    pub fn after<F>(mut self, duration: Duration, handler: F) -> Self
    where
        F: FnMut(&mut Context) + Send + 'static,
    {
        self.timeout = Some((duration, Box::new(handler)));
        self
    }

    /// Set the unmatched-message policy (default: drop).
    pub fn unmatched(mut self, policy: Unmatched) -> Self {
        self.unmatched = policy;
        self
    }

    /// Number of direct arms.
    pub fn arity(&self) -> usize {
        self.arms.len()
    }

    /// The timeout arm's duration, if installed.
    pub(crate) fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.as_ref().map(|(d, _)| *d)
    }

    /// Run the timeout arm.
    pub(crate) fn run_timeout(&mut self, ctx: &mut Context) {
        if let Some((_, handler)) = self.timeout.as_mut() {
            handler(ctx);
        }
    }

    /// Whether unmatched messages should be set aside rather than dropped.
    pub(crate) fn skips_unmatched(&self) -> bool {
        match &self.unmatched {
            Unmatched::Skip => true,
            Unmatched::Drop => false,
            Unmatched::Defer(inner) => inner.skips_unmatched(),
        }
    }

    /// Try the arms in order against `payload`.
    pub(crate) fn try_dispatch(&mut self, ctx: &mut Context, payload: &Payload) -> Matched {
        for arm in &mut self.arms {
            if !arm.shape.matches(payload) {
                continue;
            }
            if let Some(guard) = &arm.guard {
                if !guard(payload) {
                    continue;
                }
            }
            return Matched::Reply((arm.handler)(ctx, payload));
        }
        if let Unmatched::Defer(inner) = &mut self.unmatched {
            return inner.try_dispatch(ctx, payload);
        }
        Matched::NoMatch
    }
}

impl Default for Behavior {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Behavior")
            .field("arms", &self.arms.len())
            .field("has_timeout", &self.timeout.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::payload;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Inc;
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Dec;

    fn dispatch(behavior: &mut Behavior, payload: Payload) -> Option<Option<Payload>> {
        let mut ctx = Context::detached_for_tests();
        match behavior.try_dispatch(&mut ctx, &payload) {
            Matched::Reply(reply) => Some(reply),
            Matched::NoMatch => None,
        }
    }

    #[test]
    fn test_arms_match_by_tuple_type() {
        let mut behavior = Behavior::new()
            .on(|_, (_, n): (Inc, i64)| (n + 1,))
            .on(|_, (_, n): (Dec, i64)| (n - 1,));

        let reply = dispatch(&mut behavior, payload!(Inc, 4i64)).unwrap().unwrap();
        assert_eq!(reply.get::<i64>(0), Some(&5));

        let reply = dispatch(&mut behavior, payload!(Dec, 4i64)).unwrap().unwrap();
        assert_eq!(reply.get::<i64>(0), Some(&3));
    }

    #[test]
    fn test_arm_order_decides() {
        let mut behavior = Behavior::new()
            .on(|_, (n,): (i64,)| (n,))
            .on(|_, (_n,): (i64,)| (-1i64,));
        let reply = dispatch(&mut behavior, payload!(7i64)).unwrap().unwrap();
        assert_eq!(reply.get::<i64>(0), Some(&7));
    }

    #[test]
    fn test_no_match_reported() {
        let mut behavior = Behavior::new().on(|_, (_,): (Inc,)| ());
        assert!(dispatch(&mut behavior, payload!(5i64)).is_none());
    }

    #[test]
    fn test_guard_rejects_values() {
        let mut behavior = Behavior::new()
            .on_when(|(n,): &(i64,)| *n > 0, |_, (n,): (i64,)| (n,))
            .on(|_, (_n,): (i64,)| (0i64,));

        let reply = dispatch(&mut behavior, payload!(5i64)).unwrap().unwrap();
        assert_eq!(reply.get::<i64>(0), Some(&5));

        // Guard fails, next arm catches.
        let reply = dispatch(&mut behavior, payload!(-5i64)).unwrap().unwrap();
        assert_eq!(reply.get::<i64>(0), Some(&0));
    }

    #[test]
    fn test_unit_reply_is_empty_payload() {
        let mut behavior = Behavior::new().on(|_, (_,): (Inc,)| ());
        let reply = dispatch(&mut behavior, payload!(Inc)).unwrap().unwrap();
        assert!(reply.is_empty());
    }

    #[test]
    fn test_none_suppresses_reply() {
        let mut behavior = Behavior::new().on(|_, (_,): (Inc,)| None::<Payload>);
        let reply = dispatch(&mut behavior, payload!(Inc)).unwrap();
        assert!(reply.is_none());
    }

    #[test]
    fn test_raw_arm_sees_payload() {
        let shape = Shape::of::<(i64, i64)>();
        let mut behavior = Behavior::new().on_payload(shape, |_, p| {
            let sum = p.get::<i64>(0).copied().unwrap_or(0) + p.get::<i64>(1).copied().unwrap_or(0);
            Some(payload!(sum))
        });
        let reply = dispatch(&mut behavior, payload!(3i64, 4i64)).unwrap().unwrap();
        assert_eq!(reply.get::<i64>(0), Some(&7));
    }

    #[test]
    fn test_dynamic_payload_matches_by_slot_types() {
        let mut behavior = Behavior::new().on(|_, (a, b): (i64, i64)| (a + b,));
        let dynamic = Payload::from_values(vec![Box::new(3i64), Box::new(4i64)]);
        let reply = dispatch(&mut behavior, dynamic).unwrap().unwrap();
        assert_eq!(reply.get::<i64>(0), Some(&7));
    }

    #[test]
    fn test_fallback_behavior_consulted() {
        let fallback = Behavior::new().on(|_, (n,): (i64,)| (n * 2,));
        let mut behavior = Behavior::new()
            .on(|_, (_,): (Inc,)| ())
            .unmatched(Unmatched::Defer(Box::new(fallback)));

        let reply = dispatch(&mut behavior, payload!(21i64)).unwrap().unwrap();
        assert_eq!(reply.get::<i64>(0), Some(&42));
    }

    #[test]
    fn test_timeout_arm_metadata() {
        let behavior = Behavior::new()
            .on(|_, (_,): (Inc,)| ())
            .after(Duration::from_millis(50), |_| {});
        assert_eq!(behavior.timeout_duration(), Some(Duration::from_millis(50)));
        assert_eq!(behavior.arity(), 1);
    }

    #[test]
    fn test_skip_policy_visible() {
        let behavior = Behavior::new().unmatched(Unmatched::Skip);
        assert!(behavior.skips_unmatched());
        assert!(!Behavior::new().skips_unmatched());
    }

    #[test]
    fn test_handler_mutates_captured_state() {
        let mut total = 0i64;
        let mut behavior = Behavior::new().on(move |_, (n,): (i64,)| {
            total += n;
            (total,)
        });
        dispatch(&mut behavior, payload!(3i64));
        let reply = dispatch(&mut behavior, payload!(4i64)).unwrap().unwrap();
        assert_eq!(reply.get::<i64>(0), Some(&7));
    }
}
