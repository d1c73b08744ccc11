//! Local groups: subscriber sets with snapshot broadcast and a hidden
//! intermediary actor.
//!
//! The subscriber set holds addresses (weak references); a broadcast takes
//! strong handles under a brief lock and delivers after releasing it, so
//! unsubscribing during delivery is safe. The intermediary actor exposes
//! `{join, leave, forward}` through the ordinary messaging interface and
//! monitors members so dead subscribers are pruned.

// Layer 1: Standard library imports
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::actor::control::ControlBlock;
use crate::actor::{ActorHandle, Address, Behavior, DownMsg, ExitMsg, ExitReason};
use crate::message::{Envelope, MessageId, Payload};
use crate::monitoring::RuntimeEvent;
use crate::system::SystemCore;
use crate::util::NodeId;

/// Ask a group's intermediary to subscribe `member`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    /// The joining actor.
    pub member: Address,
}

/// Ask a group's intermediary to unsubscribe `member`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveMsg {
    /// The leaving actor.
    pub member: Address,
}

/// Ask a group's intermediary to broadcast `payload` to all subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardMsg {
    /// The payload to fan out.
    pub payload: Payload,
}

struct GroupState {
    subscribers: HashSet<Address>,
    intermediary: Option<ActorHandle>,
    stopped: bool,
}

pub(crate) struct GroupCore {
    module: String,
    identifier: String,
    origin: NodeId,
    system: Weak<SystemCore>,
    state: Mutex<GroupState>,
}

/// A named multicast destination.
///
/// Cloning shares the group; groups live as long as their module, which the
/// group registry owns for the lifetime of the actor system.
#[derive(Clone)]
pub struct Group {
    inner: Arc<GroupCore>,
}

impl Group {
    pub(crate) fn new(
        module: impl Into<String>,
        identifier: impl Into<String>,
        origin: NodeId,
        system: Weak<SystemCore>,
    ) -> Self {
        Self {
            inner: Arc::new(GroupCore {
                module: module.into(),
                identifier: identifier.into(),
                origin,
                system,
                state: Mutex::new(GroupState {
                    subscribers: HashSet::new(),
                    intermediary: None,
                    stopped: false,
                }),
            }),
        }
    }

    /// The owning module's name.
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// The group identifier within its module.
    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    /// The node the group originated on.
    pub fn origin(&self) -> NodeId {
        self.inner.origin
    }

    /// Add a subscriber. Returns false when the group is stopped or the
    /// address was already subscribed.
    pub fn subscribe(&self, member: Address) -> bool {
        let mut state = self.inner.state.lock();
        if state.stopped {
            return false;
        }
        state.subscribers.insert(member)
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, member: &Address) {
        self.inner.state.lock().subscribers.remove(member);
    }

    /// Current subscriber count, dead entries included until pruned.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// The hidden `{join, leave, forward}` actor, while the group runs.
    pub fn intermediary(&self) -> Option<ActorHandle> {
        self.inner.state.lock().intermediary.clone()
    }

    /// Broadcast to every subscriber.
    ///
    /// Takes a strong snapshot under the lock, prunes entries whose actors
    /// are gone, and delivers outside the lock.
    pub fn enqueue(&self, sender: Address, mid: MessageId, payload: Payload) {
        let targets: Vec<Arc<ControlBlock>> = {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return;
            }
            let mut alive = Vec::with_capacity(state.subscribers.len());
            state.subscribers.retain(|addr| match addr.upgrade_block() {
                Some(block) => {
                    alive.push(block);
                    true
                }
                None => false,
            });
            alive
        };
        if let Some(sys) = self.inner.system.upgrade() {
            sys.monitor.record(&RuntimeEvent::GroupBroadcast {
                module: self.inner.module.clone(),
                identifier: self.inner.identifier.clone(),
                subscribers: targets.len(),
            });
        }
        for target in targets {
            let _ = target.enqueue_envelope(
                Envelope::new(payload.clone())
                    .with_sender(sender.clone())
                    .with_mid(mid),
            );
        }
    }

    /// Broadcast an anonymous asynchronous message.
    pub fn publish(&self, payload: Payload) {
        self.enqueue(Address::invalid(), MessageId::ASYNC, payload);
    }

    /// Stop the group: clear the subscriber set and shut the intermediary
    /// down with reason `user_shutdown`.
    pub fn stop(&self) {
        let intermediary = {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.subscribers.clear();
            state.intermediary.take()
        };
        if let Some(handle) = intermediary {
            let _ = handle.block().enqueue_envelope(
                Envelope::new(Payload::from_tuple((ExitMsg {
                    source: Address::invalid(),
                    reason: ExitReason::UserShutdown,
                },)))
                .urgent(),
            );
        }
    }

    pub(crate) fn install_intermediary(&self, handle: ActorHandle) {
        self.inner.state.lock().intermediary = Some(handle);
    }

    /// The behavior of the hidden intermediary actor.
    pub(crate) fn intermediary_behavior(&self) -> Behavior {
        let on_join = self.clone();
        let on_leave = self.clone();
        let on_forward = self.clone();
        let on_down = self.clone();
        Behavior::new()
            .on(move |ctx, (join,): (JoinMsg,)| {
                if let Some(member) = join.member.upgrade() {
                    on_join.subscribe(join.member);
                    ctx.monitor(&member);
                }
            })
            .on(move |ctx, (leave,): (LeaveMsg,)| {
                on_leave.unsubscribe(&leave.member);
                if let Some(member) = leave.member.upgrade() {
                    ctx.demonitor(&member);
                }
            })
            .on(move |ctx, (forward,): (ForwardMsg,)| {
                on_forward.enqueue(ctx.sender().clone(), MessageId::ASYNC, forward.payload);
            })
            .on(move |_ctx, (down,): (DownMsg,)| {
                on_down.unsubscribe(&down.source);
            })
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.inner.module == other.inner.module
            && self.inner.identifier == other.inner.identifier
            && self.inner.origin == other.inner.origin
    }
}

impl Eq for Group {}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("module", &self.inner.module)
            .field("identifier", &self.inner.identifier)
            .field("origin", &self.inner.origin)
            .finish()
    }
}
