use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::time::Instant;

/// Opaque 64-bit peer identifier.
///
/// Derived from the peer's `host:port`, so every node computes the same id for
/// the same address without coordination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl PeerId {
    pub fn from_addr(addr: &SocketAddr) -> Self {
        let mut hasher = DefaultHasher::new();
        addr.to_string().hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemberState {
    Alive,
    Suspicious,
    Dead,
}

/// Local liveness record for one remote member.
///
/// Owned by the [`Tracker`](super::tracker::Tracker); callers only ever see
/// clones.
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub id: PeerId,
    pub address: SocketAddr,
    pub last_ack: Instant,
    pub state: MemberState,
    /// When `state` last changed.
    pub state_since: Instant,
}

impl MemberRecord {
    pub fn new(id: PeerId, address: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            address,
            last_ack: now,
            state: MemberState::Alive,
            state_since: now,
        }
    }

    pub fn view(&self) -> MemberView {
        MemberView {
            id: self.id,
            address: self.address,
            state: self.state,
            since_last_ack_ms: self.last_ack.elapsed().as_millis() as u64,
        }
    }
}

/// Serializable snapshot of a [`MemberRecord`], used for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberView {
    pub id: PeerId,
    pub address: SocketAddr,
    pub state: MemberState,
    pub since_last_ack_ms: u64,
}
