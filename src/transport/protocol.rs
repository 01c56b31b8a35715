//! Wire Protocol Definitions
//!
//! Each UDP datagram carries exactly one bincode-encoded [`Packet`]. Packets
//! larger than [`MAX_PACKET_SIZE`] are rejected on both the send and the
//! receive side instead of being truncated.

use crate::dissemination::types::Update;
use crate::error::{Result, SwimError};
use crate::membership::types::PeerId;

use serde::{Deserialize, Serialize};
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::LazyLock;

pub const MAX_PACKET_SIZE: usize = 1024;

static UPDATE_CAPACITY: LazyLock<usize> = LazyLock::new(|| {
    let widest = SocketAddr::from((Ipv6Addr::UNSPECIFIED, u16::MAX));
    let id = PeerId(u64::MAX);
    let empty = Packet {
        header: Header {
            message_id: u64::MAX,
            from: id,
            update_count: 0,
            address: widest,
        },
        message: Message {
            from: id,
            kind: MessageType::PingRequest,
            forward: Some(id),
        },
        updates: Vec::new(),
    };
    let update = Update::join(id, widest).with_count(u32::MAX);

    match (bincode::serialized_size(&empty), bincode::serialized_size(&update)) {
        (Ok(base), Ok(each)) if each > 0 => {
            ((MAX_PACKET_SIZE as u64).saturating_sub(base) / each) as usize
        }
        _ => 0,
    }
});

/// Number of updates that fit in one packet whatever the addresses involved.
pub fn update_capacity() -> usize {
    *UPDATE_CAPACITY
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageType {
    Ping,
    PingRequest,
    Ack,
}

/// Application payload of a packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub from: PeerId,
    pub kind: MessageType,
    /// For `PingRequest`: the peer to probe on the sender's behalf.
    pub forward: Option<PeerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Header {
    /// Fresh id for requests; an `Ack` echoes the id of the request it answers.
    pub message_id: u64,
    pub from: PeerId,
    pub update_count: u32,
    /// Listening address of the sender.
    pub address: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub message: Message,
    pub updates: Vec<Update>,
}

pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>> {
    let encoded = bincode::serialize(packet).map_err(|e| SwimError::Encode(e.to_string()))?;

    if encoded.len() > MAX_PACKET_SIZE {
        return Err(SwimError::PacketTooLarge {
            size: encoded.len(),
            max: MAX_PACKET_SIZE,
        });
    }
    Ok(encoded)
}

pub fn decode_packet(bytes: &[u8]) -> Result<Packet> {
    if bytes.len() > MAX_PACKET_SIZE {
        return Err(SwimError::PacketTooLarge {
            size: bytes.len(),
            max: MAX_PACKET_SIZE,
        });
    }

    let packet: Packet =
        bincode::deserialize(bytes).map_err(|e| SwimError::Decode(e.to_string()))?;

    if packet.header.update_count as usize != packet.updates.len() {
        return Err(SwimError::Decode(format!(
            "header announces {} updates, packet carries {}",
            packet.header.update_count,
            packet.updates.len()
        )));
    }
    Ok(packet)
}
