//! Actor addresses: stable identifiers with weak local back-references.

// Layer 1: Standard library imports
use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::control::ControlBlock;
use super::handle::ActorHandle;
use crate::util::{ActorId, NodeId};

/// A `(node id, actor id)` pair identifying one actor, plus a weak
/// back-reference to the control block when the target is local.
///
/// Addresses do not keep the actor alive. Equality, ordering and hashing use
/// only the id pair, so a terminated actor's address keeps comparing equal
/// and hashing stably.
#[derive(Clone)]
pub struct Address {
    node: NodeId,
    aid: ActorId,
    link: Weak<ControlBlock>,
}

impl Address {
    pub(crate) fn new(node: NodeId, aid: ActorId, link: Weak<ControlBlock>) -> Self {
        Self { node, aid, link }
    }

    /// The invalid address: invalid node, actor id zero, no back-reference.
    pub fn invalid() -> Self {
        Self {
            node: NodeId::invalid(),
            aid: ActorId::INVALID,
            link: Weak::new(),
        }
    }

    /// Whether this is the invalid address.
    pub fn is_invalid(&self) -> bool {
        self.aid.is_invalid()
    }

    /// The node component.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The actor id component.
    pub fn id(&self) -> ActorId {
        self.aid
    }

    /// Upgrade to a strong handle.
    ///
    /// Fails once the actor has terminated, even while the control block is
    /// still reachable; the upgrade is linearized with termination through
    /// the run-state.
    pub fn upgrade(&self) -> Option<ActorHandle> {
        self.upgrade_block().map(ActorHandle::from_block)
    }

    /// Whether the target is known to have terminated (or never existed
    /// locally).
    pub fn is_terminated(&self) -> bool {
        match self.link.upgrade() {
            Some(block) => block.is_terminated(),
            None => true,
        }
    }

    pub(crate) fn upgrade_block(&self) -> Option<Arc<ControlBlock>> {
        let block = self.link.upgrade()?;
        if block.is_terminated() {
            None
        } else {
            Some(block)
        }
    }

    /// Reach the control block even after termination, e.g. to read the
    /// exit reason.
    pub(crate) fn block_unchecked(&self) -> Option<Arc<ControlBlock>> {
        self.link.upgrade()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.aid == other.aid
    }
}

impl Eq for Address {}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.node, self.aid).cmp(&(other.node, other.aid))
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
        self.aid.hash(state);
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address")
            .field("node", &self.node)
            .field("id", &self.aid)
            .finish()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            f.write_str("<invalid>")
        } else {
            write!(f, "<{}@{}>", self.aid, self.node)
        }
    }
}

// The weak back-reference is process-local state; only the id pair crosses
// the boundary.
#[derive(Serialize, Deserialize)]
struct AddressRepr {
    node: NodeId,
    aid: ActorId,
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AddressRepr {
            node: self.node,
            aid: self.aid,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = AddressRepr::deserialize(deserializer)?;
        Ok(Self {
            node: repr.node,
            aid: repr.aid,
            link: Weak::new(),
        })
    }
}
