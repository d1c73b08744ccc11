//! The per-actor control block.
//!
//! Holds the mailbox, the run-state atomics, and the mutex-guarded mutable
//! state: link and monitor sets, attachable cleanup hooks, the trap-exit
//! flag, and the exit-reason slot. A strong reference keeps the actor alive;
//! termination breaks the control-block/body cycle so the last handle drop
//! frees everything.

// Layer 1: Standard library imports
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::address::Address;
use super::exit::{DownMsg, ExitMsg, ExitReason};
use super::lifecycle::{AtomicRunState, RunState};
use crate::mailbox::{EnqueueError, Mailbox};
use crate::message::{Envelope, MessageId, Payload};
use crate::monitoring::RuntimeEvent;
use crate::request::PeerDownMsg;
use crate::scheduler::Resumable;
use crate::system::SystemCore;
use crate::util::{ActorId, NodeId};

/// How an actor is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActorKind {
    /// Runs on scheduler workers in cooperative resumptions.
    Event,
    /// Bound to a dedicated OS thread with blocking receive.
    Blocking,
}

/// Cleanup hook run during termination, in reverse registration order.
pub type ExitHook = Box<dyn FnOnce(&ExitReason) + Send>;

struct ControlInner {
    links: HashSet<Address>,
    monitors: Vec<Address>,
    hooks: Vec<ExitHook>,
    exit_reason: Option<ExitReason>,
    trap_exit: bool,
    name: Option<String>,
}

pub(crate) struct ControlBlock {
    node: NodeId,
    aid: ActorId,
    kind: ActorKind,
    hidden: bool,
    protocol: Option<TypeId>,
    pub(crate) mailbox: Mailbox,
    state: AtomicRunState,
    inner: Mutex<ControlInner>,
    /// The schedulable body; taken when termination completes.
    body: Mutex<Option<Arc<dyn Resumable>>>,
    system: Weak<SystemCore>,
    self_weak: Weak<ControlBlock>,
}

impl ControlBlock {
    pub(crate) fn new(
        node: NodeId,
        aid: ActorId,
        kind: ActorKind,
        hidden: bool,
        protocol: Option<TypeId>,
        mailbox_cap: usize,
        name: Option<String>,
        system: Weak<SystemCore>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Self {
            node,
            aid,
            kind,
            hidden,
            protocol,
            mailbox: Mailbox::new(mailbox_cap),
            state: AtomicRunState::new(RunState::Idle),
            inner: Mutex::new(ControlInner {
                links: HashSet::new(),
                monitors: Vec::new(),
                hooks: Vec::new(),
                exit_reason: None,
                trap_exit: false,
                name,
            }),
            body: Mutex::new(None),
            system: system.clone(),
            self_weak: self_weak.clone(),
        })
    }

    pub(crate) fn address(&self) -> Address {
        Address::new(self.node, self.aid, self.self_weak.clone())
    }

    pub(crate) fn id(&self) -> ActorId {
        self.aid
    }

    pub(crate) fn node(&self) -> NodeId {
        self.node
    }

    pub(crate) fn kind(&self) -> ActorKind {
        self.kind
    }

    pub(crate) fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub(crate) fn protocol(&self) -> Option<TypeId> {
        self.protocol
    }

    pub(crate) fn name(&self) -> Option<String> {
        self.inner.lock().name.clone()
    }

    pub(crate) fn state(&self) -> &AtomicRunState {
        &self.state
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    pub(crate) fn exit_reason(&self) -> Option<ExitReason> {
        self.inner.lock().exit_reason.clone()
    }

    pub(crate) fn trap_exit(&self) -> bool {
        self.inner.lock().trap_exit
    }

    pub(crate) fn set_trap_exit(&self, trap: bool) {
        self.inner.lock().trap_exit = trap;
    }

    pub(crate) fn system(&self) -> Option<Arc<SystemCore>> {
        self.system.upgrade()
    }

    pub(crate) fn install_body(&self, body: Arc<dyn Resumable>) {
        *self.body.lock() = Some(body);
    }

    /// Enqueue a message with full header control.
    ///
    /// For event actors, a push that finds the actor idle publishes a
    /// schedule signal; for blocking actors the mailbox condition variable
    /// is signalled by the push itself.
    pub(crate) fn enqueue(
        &self,
        sender: Address,
        mid: MessageId,
        payload: Payload,
    ) -> Result<(), EnqueueError> {
        self.enqueue_envelope(Envelope::new(payload).with_sender(sender).with_mid(mid))
    }

    pub(crate) fn enqueue_envelope(&self, envelope: Envelope) -> Result<(), EnqueueError> {
        if self.is_terminated() {
            return Err(EnqueueError::Closed);
        }
        match self.mailbox.push(envelope) {
            Ok(_) => {
                // The CAS inside try_schedule makes redundant signals free,
                // so every producer attempts one; only the producer that
                // finds the actor idle wins and inserts it into a queue.
                self.try_schedule();
                Ok(())
            }
            Err(err) => {
                if let (EnqueueError::Full { .. }, Some(sys)) = (&err, self.system()) {
                    sys.monitor.record(&RuntimeEvent::MessageDropped {
                        target: self.address(),
                    });
                }
                Err(err)
            }
        }
    }

    /// CAS idle -> scheduled and hand the body to the scheduler. Only the
    /// winning producer inserts into a worker queue.
    pub(crate) fn try_schedule(&self) {
        if self.kind != ActorKind::Event {
            return;
        }
        if !self.state.transition(RunState::Idle, RunState::Scheduled) {
            return;
        }
        let body = self.body.lock().clone();
        match (body, self.system()) {
            (Some(job), Some(sys)) => sys.scheduler.schedule(job),
            _ => {
                // No body or no system: undo so termination can proceed.
                self.state.transition(RunState::Scheduled, RunState::Idle);
            }
        }
    }

    /// Establish a symmetric link between `self` and `other`. Idempotent.
    ///
    /// Linking against a terminated peer immediately delivers the exit
    /// notification instead of creating an edge.
    pub(crate) fn link_to(self: &Arc<Self>, other: &Arc<ControlBlock>) {
        if Arc::ptr_eq(self, other) {
            return;
        }
        if other.is_terminated() {
            let reason = other.exit_reason().unwrap_or(ExitReason::Normal);
            self.deliver_exit_notification(other.address(), reason);
            return;
        }
        if self.is_terminated() {
            let reason = self.exit_reason().unwrap_or(ExitReason::Normal);
            other.deliver_exit_notification(self.address(), reason);
            return;
        }
        let (first, second) = order_pair(self, other);
        let mut a = first.inner.lock();
        let mut b = second.inner.lock();
        a.links.insert(second.address());
        b.links.insert(first.address());
    }

    /// Remove the link in both directions.
    pub(crate) fn unlink_from(self: &Arc<Self>, other: &Arc<ControlBlock>) {
        if Arc::ptr_eq(self, other) {
            return;
        }
        let (first, second) = order_pair(self, other);
        let mut a = first.inner.lock();
        let mut b = second.inner.lock();
        a.links.remove(&second.address());
        b.links.remove(&first.address());
    }

    /// Register `watcher` to receive a down notification when `self`
    /// terminates. Monitoring a terminated actor notifies immediately.
    pub(crate) fn add_monitor(&self, watcher: Address) {
        if self.is_terminated() {
            let reason = self.exit_reason().unwrap_or(ExitReason::Normal);
            if let Some(peer) = watcher.upgrade_block() {
                let _ = peer.enqueue_envelope(
                    Envelope::new(Payload::from_tuple((DownMsg {
                        source: self.address(),
                        reason,
                    },)))
                    .with_sender(self.address())
                    .urgent(),
                );
            }
            return;
        }
        let mut inner = self.inner.lock();
        if !inner.monitors.contains(&watcher) {
            inner.monitors.push(watcher);
        }
    }

    pub(crate) fn remove_monitor(&self, watcher: &Address) {
        self.inner.lock().monitors.retain(|m| m != watcher);
    }

    /// Attach a cleanup hook. Hooks attached after termination run
    /// immediately on the caller's thread.
    pub(crate) fn attach(&self, hook: ExitHook) {
        let run_now = {
            let mut inner = self.inner.lock();
            if self.is_terminated() {
                inner.exit_reason.clone()
            } else {
                inner.hooks.push(hook);
                return;
            }
        };
        if let Some(reason) = run_now {
            hook(&reason);
        } else {
            hook(&ExitReason::Normal);
        }
    }

    /// Snapshot of the link set, for introspection and tests.
    pub(crate) fn links(&self) -> Vec<Address> {
        self.inner.lock().links.iter().cloned().collect()
    }

    /// Terminate the actor.
    ///
    /// 1. flip the run-state to terminated (idempotent),
    /// 2. drain the mailbox without dispatch, answering pending requests
    ///    with synthesized error responses,
    /// 3. notify links, then monitors,
    /// 4. run attached hooks in reverse registration order,
    /// 5. release the behavior stack and deregister from the system.
    pub(crate) fn trigger_exit(&self, reason: ExitReason) {
        if self.state.terminate() == RunState::Terminated {
            return;
        }
        self.mailbox.close();

        let self_addr = self.address();
        while let Some(env) = self.mailbox.drain_next() {
            if env.mid.is_request() && !env.sender.is_invalid() {
                if let Some(peer) = env.sender.upgrade_block() {
                    let _ = peer.enqueue_envelope(
                        Envelope::new(Payload::from_tuple((PeerDownMsg {
                            reason: reason.clone(),
                        },)))
                        .with_sender(self_addr.clone())
                        .with_mid(env.mid.respond_to()),
                    );
                }
            }
        }

        let (links, monitors, hooks) = {
            let mut inner = self.inner.lock();
            inner.exit_reason = Some(reason.clone());
            (
                std::mem::take(&mut inner.links),
                std::mem::take(&mut inner.monitors),
                std::mem::take(&mut inner.hooks),
            )
        };

        for link in links {
            if let Some(peer) = link.upgrade_block() {
                peer.drop_link_edge(&self_addr);
                peer.deliver_exit_notification(self_addr.clone(), reason.clone());
            }
        }
        for watcher in monitors {
            if let Some(peer) = watcher.upgrade_block() {
                let _ = peer.enqueue_envelope(
                    Envelope::new(Payload::from_tuple((DownMsg {
                        source: self_addr.clone(),
                        reason: reason.clone(),
                    },)))
                    .with_sender(self_addr.clone())
                    .urgent(),
                );
            }
        }

        for hook in hooks.into_iter().rev() {
            hook(&reason);
        }

        *self.body.lock() = None;

        if let Some(sys) = self.system() {
            sys.on_actor_terminated(self, &reason);
        }
    }

    fn drop_link_edge(&self, peer: &Address) {
        self.inner.lock().links.remove(peer);
    }

    fn deliver_exit_notification(&self, source: Address, reason: ExitReason) {
        let _ = self.enqueue_envelope(
            Envelope::new(Payload::from_tuple((ExitMsg {
                source: source.clone(),
                reason,
            },)))
            .with_sender(source)
            .urgent(),
        );
    }
}

fn order_pair<'a>(
    a: &'a Arc<ControlBlock>,
    b: &'a Arc<ControlBlock>,
) -> (&'a Arc<ControlBlock>, &'a Arc<ControlBlock>) {
    if a.address() <= b.address() {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn block(aid: u64) -> Arc<ControlBlock> {
        ControlBlock::new(
            NodeId::local(),
            ActorId::from_raw(aid),
            ActorKind::Event,
            false,
            None,
            0,
            None,
            Weak::new(),
        )
    }

    #[test]
    fn test_address_roundtrip() {
        let cb = block(7);
        let addr = cb.address();
        assert_eq!(addr.id(), ActorId::from_raw(7));
        assert!(addr.upgrade_block().is_some());
    }

    #[test]
    fn test_enqueue_reaches_mailbox() {
        let cb = block(1);
        cb.enqueue(Address::invalid(), MessageId::ASYNC, crate::payload!(5i64))
            .unwrap();
        assert_eq!(cb.mailbox.len(), 1);
    }

    #[test]
    fn test_link_symmetry_and_unlink() {
        let a = block(1);
        let b = block(2);
        a.link_to(&b);
        assert!(a.links().contains(&b.address()));
        assert!(b.links().contains(&a.address()));

        // Idempotent.
        a.link_to(&b);
        assert_eq!(a.links().len(), 1);

        b.unlink_from(&a);
        assert!(a.links().is_empty());
        assert!(b.links().is_empty());
    }

    #[test]
    fn test_self_link_is_noop() {
        let a = block(1);
        a.link_to(&a);
        assert!(a.links().is_empty());
    }

    #[test]
    fn test_exit_notifies_links_and_clears_edges() {
        let a = block(1);
        let b = block(2);
        a.link_to(&b);
        a.trigger_exit(ExitReason::Kill);

        assert!(a.is_terminated());
        assert_eq!(a.exit_reason(), Some(ExitReason::Kill));
        assert!(b.links().is_empty());

        let env = b.mailbox.drain_next().unwrap();
        let exit: &ExitMsg = env.payload.get(0).unwrap();
        assert_eq!(exit.reason, ExitReason::Kill);
        assert_eq!(exit.source, a.address());
    }

    #[test]
    fn test_link_to_terminated_peer_notifies_immediately() {
        let a = block(1);
        let b = block(2);
        b.trigger_exit(ExitReason::Normal);
        a.link_to(&b);
        let env = a.mailbox.drain_next().unwrap();
        let exit: &ExitMsg = env.payload.get(0).unwrap();
        assert_eq!(exit.reason, ExitReason::Normal);
    }

    #[test]
    fn test_monitor_receives_down() {
        let target = block(1);
        let watcher = block(2);
        target.add_monitor(watcher.address());
        target.trigger_exit(ExitReason::UserShutdown);

        let env = watcher.mailbox.drain_next().unwrap();
        let down: &DownMsg = env.payload.get(0).unwrap();
        assert_eq!(down.reason, ExitReason::UserShutdown);
        assert_eq!(down.source, target.address());

        // Watcher itself did not terminate.
        assert!(!watcher.is_terminated());
    }

    #[test]
    fn test_demonitor_suppresses_down() {
        let target = block(1);
        let watcher = block(2);
        target.add_monitor(watcher.address());
        target.remove_monitor(&watcher.address());
        target.trigger_exit(ExitReason::Kill);
        assert!(watcher.mailbox.drain_next().is_none());
    }

    #[test]
    fn test_hooks_run_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let cb = block(1);
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            cb.attach(Box::new(move |_| order.lock().push(tag)));
        }
        cb.trigger_exit(ExitReason::Normal);
        assert_eq!(*order.lock(), vec!["third", "second", "first"]);
    }

    #[test]
    fn test_attach_after_termination_runs_immediately() {
        let cb = block(1);
        cb.trigger_exit(ExitReason::Kill);
        let ran = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&ran);
        cb.attach(Box::new(move |reason| {
            *slot.lock() = Some(reason.clone());
        }));
        assert_eq!(*ran.lock(), Some(ExitReason::Kill));
    }

    #[test]
    fn test_trigger_exit_is_idempotent() {
        let cb = block(1);
        cb.trigger_exit(ExitReason::Kill);
        cb.trigger_exit(ExitReason::Normal);
        assert_eq!(cb.exit_reason(), Some(ExitReason::Kill));
    }

    #[test]
    fn test_enqueue_after_exit_fails() {
        let cb = block(1);
        cb.trigger_exit(ExitReason::Normal);
        let err = cb
            .enqueue(Address::invalid(), MessageId::ASYNC, crate::payload!(1i64))
            .unwrap_err();
        assert!(matches!(err, EnqueueError::Closed));
    }

    #[test]
    fn test_drain_answers_pending_requests() {
        let requester = block(1);
        let target = block(2);
        target
            .enqueue(
                requester.address(),
                MessageId::request(9),
                crate::payload!(1i64),
            )
            .unwrap();
        target.trigger_exit(ExitReason::Kill);

        let env = requester.mailbox.drain_next().unwrap();
        assert!(env.mid.is_response());
        assert_eq!(env.mid.sequence(), 9);
        let down: &PeerDownMsg = env.payload.get(0).unwrap();
        assert_eq!(down.reason, ExitReason::Kill);
    }

    #[test]
    fn test_address_upgrade_fails_after_termination() {
        let cb = block(1);
        let addr = cb.address();
        cb.trigger_exit(ExitReason::Normal);
        assert!(addr.upgrade_block().is_none());
        // Identity survives termination.
        assert_eq!(addr, cb.address());
    }
}
