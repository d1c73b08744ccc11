//! Node and actor identity.
//!
//! A node is identified by a fixed-width opaque host id plus the process id
//! assigned at startup. Actor ids are monotonically increasing 64-bit
//! counters, unique within one node. The distinguished *local* node id is
//! assigned exactly once per process, the first time an actor system starts.

// Layer 1: Standard library imports
use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::sync::OnceLock;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Fixed-width opaque identifier for a host.
///
/// Sixteen random bytes drawn once per process. Two hosts collide with
/// negligible probability; equality is bytewise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostId([u8; 16]);

impl HostId {
    /// The all-zero host id, used only by [`NodeId::invalid`].
    pub const ZERO: HostId = HostId([0u8; 16]);

    /// Generate a fresh random host id.
    pub fn generate() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Identity of one runtime node: host id plus process id.
///
/// Two node ids are equal iff both fields are equal. The invalid node id
/// (all-zero host, process id 0) is representable and marks addresses that
/// do not resolve anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    host: HostId,
    process_id: u32,
}

static LOCAL_NODE: OnceLock<NodeId> = OnceLock::new();

impl NodeId {
    /// Construct a node id from its parts.
    pub fn new(host: HostId, process_id: u32) -> Self {
        Self { host, process_id }
    }

    /// The invalid node id.
    pub fn invalid() -> Self {
        Self {
            host: HostId::ZERO,
            process_id: 0,
        }
    }

    /// The node id of this process.
    ///
    /// Assigned on first use and stable for the lifetime of the process.
    /// This is the only piece of process-wide runtime state.
    pub fn local() -> Self {
        *LOCAL_NODE.get_or_init(|| Self {
            host: HostId::generate(),
            process_id: std::process::id().max(1),
        })
    }

    /// Whether this id denotes no node at all.
    pub fn is_invalid(&self) -> bool {
        self.process_id == 0 && self.host == HostId::ZERO
    }

    /// Whether this id denotes the local node.
    pub fn is_local(&self) -> bool {
        *self == Self::local()
    }

    /// The host component.
    pub fn host(&self) -> HostId {
        self.host
    }

    /// The process id component (positive for valid ids).
    pub fn process_id(&self) -> u32 {
        self.process_id
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.host, self.process_id).cmp(&(other.host, other.process_id))
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "invalid-node")
        } else {
            write!(f, "{}#{}", self.host, self.process_id)
        }
    }
}

/// Monotonically increasing actor id, unique within one node.
///
/// Id 0 is reserved for the invalid address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ActorId(u64);

impl ActorId {
    /// The reserved invalid id.
    pub const INVALID: ActorId = ActorId(0);

    /// Wrap a raw id value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Whether this is the reserved invalid id.
    pub fn is_invalid(&self) -> bool {
        self.0 == 0
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
