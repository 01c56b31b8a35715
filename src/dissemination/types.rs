use crate::membership::types::PeerId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Kind of membership change carried by an [`Update`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    Join,
    Failure,
    Leave,
}

/// A membership fact waiting to be gossiped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Update {
    pub kind: EventKind,
    pub member: PeerId,
    /// Listening address of the member, carried by `Join` events.
    pub address: Option<SocketAddr>,
    /// Number of times this event has been piggybacked so far.
    pub count: u32,
}

impl Update {
    pub fn new(kind: EventKind, member: PeerId) -> Self {
        Self {
            kind,
            member,
            address: None,
            count: 0,
        }
    }

    pub fn join(member: PeerId, address: SocketAddr) -> Self {
        Self {
            address: Some(address),
            ..Self::new(EventKind::Join, member)
        }
    }

    pub fn failure(member: PeerId) -> Self {
        Self::new(EventKind::Failure, member)
    }

    pub fn leave(member: PeerId) -> Self {
        Self::new(EventKind::Leave, member)
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }
}

#[derive(Debug, Clone)]
pub struct DisseminationConfig {
    /// Multiplier on `ln(N)` bounding how often an event is piggybacked.
    pub lambda: f64,
    /// Maximum events attached to one outgoing packet.
    pub max_updates_per_packet: usize,
}

impl Default for DisseminationConfig {
    fn default() -> Self {
        Self {
            lambda: 20.0,
            max_updates_per_packet: 5,
        }
    }
}
